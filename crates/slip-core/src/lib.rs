//! slip-core - Interpreter Runtime
//!
//! The runtime half of the slip interpreter: the per-context tagged
//! value heap with its accounting allocator, the mark-and-sweep
//! garbage collector rooted at the global environment, the frame-chain
//! environment model, and the context that owns all of it.
//!
//! The reader/printer (`slip-read`) and the evaluator (`slip-eval`)
//! are built on top of this crate; embedders normally reach for the
//! `slip-drv` facade instead of using slip-core directly.
//!
//! ## Memory model
//!
//! Every value is a cell in the context's heap arena, referred to by a
//! `Handle` (`None` is the empty list). The allocator keeps one record
//! per live cell — size, allocating source location, mark bit — and
//! charges the context's byte gauge. Crossing the soft limit arms the
//! collector; an allocation crossing the hard limit stalls the worker
//! until the supervising thread cancels the evaluation.
//!
//! ```rust
//! use slip_core::{Context, ContextConfig};
//!
//! let ctx = Context::new(ContextConfig::default())?;
//! let mut state = ctx.lock_state();
//! let one = state.heap.make_int(1);
//! let list = state.heap.cons(one, None);
//! assert_eq!(state.heap.list_length(list), 1);
//! # Ok::<(), slip_core::CoreError>(())
//! ```

pub mod config;
pub mod context;
pub mod env;
pub mod error;
pub mod gc;
pub mod heap;
pub mod stats;
pub mod value;

pub use config::{ConfigError, ContextConfig};
pub use context::{
    Context, CvarAccess, CvarEntry, CvarSlot, EvalSignals, InternalVar, PrimProc, State,
};
pub use error::{CoreError, Result};
pub use heap::{AllocRecord, Heap};
pub use stats::{MemGauges, MemStatsSnapshot};
pub use value::{Handle, ValueCell, ValueId};

/// Crate version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
pub(crate) fn test_heap_with_limits(soft: usize, hard: usize) -> Heap {
    use std::sync::Arc;
    Heap::new(
        Arc::new(MemGauges::new(soft, hard, false)),
        Arc::new(EvalSignals::new(0)),
    )
}

#[cfg(test)]
pub(crate) fn test_heap() -> Heap {
    test_heap_with_limits(64 * 1024, 128 * 1024)
}
