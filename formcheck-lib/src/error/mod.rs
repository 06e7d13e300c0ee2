//! Error types

mod engine;
mod rule;
mod setup;
mod submit;

pub use engine::*;
pub use rule::*;
pub use setup::*;
pub use submit::*;

/// Boxed error used for failures the engine does not classify.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
