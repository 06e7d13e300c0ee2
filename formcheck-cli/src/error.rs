use formcheck_lib::error::{EngineError, SetupError, SubmitError};

use crate::config::ConfigError;

/// Errors that end the demo session.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to initialize logger: {0}")]
    Logger(#[from] log::SetLoggerError),

    #[error("invalid rule setup: {0}")]
    Setup(#[from] SetupError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("submission failed: {0}")]
    Submit(#[from] SubmitError),
}
