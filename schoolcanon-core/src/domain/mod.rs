pub mod adapter;
pub mod error;
pub mod harmonize;
pub mod merge;
pub mod normalize;
pub mod schema;
pub mod synthesize;
pub mod vintage;

// Convenient re-exports
pub use error::DomainError;
