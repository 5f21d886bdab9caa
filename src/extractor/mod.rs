//! Turns cached HTML pages into feed entries.
//!
//! ```text
//! index pattern -> index filter -> content pattern -> content filter
//!     -> sanitize -> pub-date -> dedup -> pub-date fallback
//! ```

pub mod entries;
pub mod pipeline;
pub mod postprocess;
pub mod sanitize;

pub use entries::EntryExtractor;
pub use pipeline::{FeedOutcome, Pipeline};
pub use sanitize::Sanitizer;
