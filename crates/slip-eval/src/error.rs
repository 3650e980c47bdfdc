//! Host-level evaluation errors.
//!
//! Only structural failures appear here: a source string the reader
//! rejected, or a context problem (bad config, worker spawn failure,
//! setup misuse). Errors *inside* the language are ordinary Error
//! values and never surface through this type.

use thiserror::Error;

use slip_core::CoreError;
use slip_read::ReadError;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Parse error: {0}")]
    Read(#[from] ReadError),
}

/// Result type alias for the evaluation pipeline.
pub type Result<T> = std::result::Result<T, EvalError>;
