use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::app::{AppContext, PagefeedError, Result};
use crate::config::Config;
use crate::domain::FeedTarget;
use crate::serializer::write_feed_file;
use crate::store::CacheStore;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub written: usize,
    pub unchanged: usize,
    pub errors: usize,
}

/// Compile every configured target. Broken targets are reported and left out;
/// the second value counts them.
pub fn compile_targets(config: &Config) -> (Vec<Arc<FeedTarget>>, usize) {
    let mut targets = Vec::new();
    let mut errors = 0;

    for target in &config.targets {
        match target.compile() {
            Ok(compiled) => targets.push(Arc::new(compiled)),
            Err(e) => {
                errors += 1;
                tracing::error!("Skipping target {}: {}", target.name(), e);
                eprintln!("  Error in target {}: {}", target.name(), e);
            }
        }
    }

    (targets, errors)
}

/// Validate the configuration; returns the number of broken targets.
pub fn check(config: &Config) -> Result<usize> {
    config.cache_lifetime()?;
    config.timezone()?;

    let (targets, errors) = compile_targets(config);
    for target in &targets {
        println!(
            "  {} ({} URLs) -> {}",
            target.display_title(),
            target.urls.len(),
            target.feed_path.display()
        );
    }

    println!("{} targets ok, {} errors", targets.len(), errors);
    Ok(errors)
}

/// Delete cached pages requested before the configured lifetime.
pub fn purge(ctx: &AppContext) -> Result<usize> {
    let Some(lifetime) = ctx.config.cache_lifetime()? else {
        tracing::debug!("No cache lifetime configured, keeping all pages");
        return Ok(0);
    };

    let age = chrono::Duration::from_std(lifetime)
        .map_err(|e| PagefeedError::Other(format!("Cache lifetime out of range: {}", e)))?;
    let cutoff = Utc::now()
        .checked_sub_signed(age)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    let removed = ctx.store.purge_older_than(cutoff)?;
    if removed > 0 {
        tracing::info!("Purged {} cached pages older than {}", removed, cutoff);
    }
    Ok(removed)
}

pub async fn run(ctx: &AppContext) -> Result<RunSummary> {
    purge(ctx)?;

    let (targets, errors) = compile_targets(&ctx.config);
    let mut summary = RunSummary {
        errors,
        ..Default::default()
    };

    if targets.is_empty() {
        println!("No targets to run");
        return Ok(summary);
    }

    println!("Generating {} feeds...", targets.len());

    for outcome in ctx.pipeline.run(targets).await {
        let path = &outcome.target.feed_path;
        let title = &outcome.feed.title;

        if outcome.failed_urls == outcome.target.urls.len() {
            summary.errors += 1;
            eprintln!("  Error: every source of {} failed", title);
            continue;
        }

        if !outcome.changed && path.exists() {
            summary.unchanged += 1;
            tracing::debug!("{} not modified, keeping {}", title, path.display());
            continue;
        }

        match write_feed_file(&outcome.feed, path) {
            Ok(()) => {
                summary.written += 1;
                println!(
                    "  {} entries from {} -> {}",
                    outcome.feed.entries.len(),
                    title,
                    path.display()
                );
            }
            Err(e) => {
                summary.errors += 1;
                tracing::error!("Failed to write {}: {}", path.display(), e);
                eprintln!("  Error writing {}: {}", path.display(), e);
            }
        }
    }

    println!(
        "Run complete: {} written, {} unchanged, {} errors",
        summary.written, summary.unchanged, summary.errors
    );
    Ok(summary)
}
