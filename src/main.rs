use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pagefeed::app::AppContext;
use pagefeed::cli::{commands, Cli, Commands};
use pagefeed::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pagefeed=info"));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }

    let errors = match cli.command {
        Commands::Check => commands::check(&config)?,
        Commands::Purge => {
            let ctx = AppContext::new(config)?;
            let removed = commands::purge(&ctx)?;
            println!("Purged {} cached pages", removed);
            0
        }
        Commands::Run => {
            let ctx = AppContext::new(config)?;
            commands::run(&ctx).await?.errors
        }
    };

    if errors > 0 {
        anyhow::bail!("{} targets failed", errors);
    }

    Ok(())
}
