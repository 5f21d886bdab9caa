pub mod freshness;
pub mod locks;

pub use freshness::{effective_expiry, evaluate, extract_max_age, is_fresh};
pub use locks::{ChangedUrls, UrlLocks};
