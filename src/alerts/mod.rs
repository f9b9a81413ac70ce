// Alert subscription matching exports
pub mod matcher;

pub use matcher::AlertMatcher;
