pub mod cache;
pub mod feed;
pub mod target;

pub use cache::{CacheStatus, HtmlCache};
pub use feed::{Feed, FeedEntry};
pub use target::{FeedTarget, Pattern, SourceUrl};
