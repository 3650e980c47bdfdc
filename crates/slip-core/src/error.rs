//! Error types for the interpreter core.
//!
//! These cover *structural* failures only: bad configuration, a worker
//! thread that could not be spawned, misuse of the context lifecycle.
//! Errors raised by interpreted code never appear here; they travel as
//! in-band `Error` values through the heap (see `ValueCell::Error`) so
//! that host-written primitives never have to unwind host control flow.

use thiserror::Error;

use crate::config::ConfigError;

/// Structural failures of a context.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to spawn eval worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("Environment is already set up for this context")]
    AlreadySetup,
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_setup_display() {
        let err = CoreError::AlreadySetup;
        assert_eq!(
            err.to_string(),
            "Environment is already set up for this context"
        );
    }

    #[test]
    fn test_config_error_conversion() {
        let err: CoreError = ConfigError::InvalidDepth("max_depth must be > 0".into()).into();
        assert!(matches!(err, CoreError::Config(_)));
    }
}
