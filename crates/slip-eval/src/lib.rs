//! slip-eval - The Evaluator
//!
//! The metacircular-style evaluator over cons-cell graphs, the
//! canonical primitive library, environment setup, and the eval
//! worker that puts every caller-visible evaluation under a wall-clock
//! timeout and a memory ceiling.
//!
//! Typical embedding flow:
//!
//! ```rust
//! use slip_core::ContextConfig;
//! use slip_eval::{make_context, setup_environment, run};
//!
//! let ctx = make_context(ContextConfig::default())?;
//! // host primitives and cvars would be registered here
//! setup_environment(&ctx)?;
//! run("(define (twice n) (* 2 n))", &ctx)?;
//! # Ok::<(), slip_eval::EvalError>(())
//! ```

mod builtins;
pub mod error;
mod eval;
pub mod run;
pub mod setup;
pub mod worker;

pub use error::EvalError;
pub use run::run;
pub use setup::{make_context, setup_environment};
pub use worker::eval;
