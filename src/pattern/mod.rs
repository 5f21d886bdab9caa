pub mod compiler;
pub mod resolver;

pub use compiler::{compile, PatternKind};
pub use resolver::Resolved;
