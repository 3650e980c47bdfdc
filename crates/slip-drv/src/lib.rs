//! slip-drv - Embedding Driver
//!
//! The high-level facade that ties the runtime, the reader and the
//! evaluator together for embedders. The intended flow mirrors the
//! public contract of the interpreter:
//!
//! ```rust
//! use slip_drv::Interp;
//! use slip_core::ContextConfig;
//!
//! let interp = Interp::new(ContextConfig::default())?;
//! // optional: interp.add_prim_proc(...) / interp.add_cvar(...)
//! interp.setup_environment()?;
//!
//! let results = interp.eval_source("(+ 1 2 3)")?;
//! assert_eq!(results, vec!["6"]);
//! # Ok::<(), slip_drv::SlipError>(())
//! ```

use std::io;
use std::sync::atomic::AtomicI64;
use std::sync::Arc;

use thiserror::Error;

use slip_core::{
    Context, ContextConfig, CoreError, CvarAccess, Handle, MemStatsSnapshot, PrimProc,
};
use slip_eval::EvalError;
use slip_read::{ReadError, ReadOutcome};

/// Aggregated host-level error for the driver surface.
#[derive(Debug, Error)]
pub enum SlipError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias for driver operations.
pub type Result<T> = std::result::Result<T, SlipError>;

/// One embedded interpreter.
pub struct Interp {
    ctx: Arc<Context>,
}

impl Interp {
    /// Create an interpreter context with the canonical primitives
    /// registered but the environment not yet built.
    pub fn new(config: ContextConfig) -> Result<Self> {
        Ok(Interp {
            ctx: slip_eval::make_context(config)?,
        })
    }

    /// Register a host primitive under `name`.
    pub fn add_prim_proc(&self, name: &str, proc: PrimProc) {
        self.ctx.add_prim_proc(name, proc);
    }

    /// Register a host integer as a cvar.
    pub fn add_cvar(&self, name: &str, cell: Arc<AtomicI64>, access: CvarAccess) {
        self.ctx.add_cvar(name, cell, access);
    }

    /// Finalize the context; call exactly once after registrations.
    pub fn setup_environment(&self) -> Result<()> {
        slip_eval::setup_environment(&self.ctx)?;
        Ok(())
    }

    /// Read one expression from the front of `source`.
    pub fn read(&self, source: &str) -> Result<ReadOutcome> {
        let mut state = self.ctx.lock_state();
        Ok(slip_read::read(source, &mut state.heap)?)
    }

    /// Evaluate an already-read value through the worker.
    pub fn eval(&self, value: Handle) -> Handle {
        slip_eval::eval(&self.ctx, value)
    }

    /// Read and evaluate all of `source`, discarding the values.
    pub fn run(&self, source: &str) -> Result<()> {
        slip_eval::run(source, &self.ctx)?;
        Ok(())
    }

    /// Read and evaluate all of `source`, returning each result
    /// printed. This is the read-eval-print loop body.
    pub fn eval_source(&self, source: &str) -> Result<Vec<String>> {
        let mut printed = Vec::new();
        let mut rest = source;
        loop {
            if rest.trim().is_empty() {
                return Ok(printed);
            }
            let outcome = self.read(rest)?;
            if outcome.consumed == 0 {
                return Ok(printed);
            }
            let result = self.eval(outcome.value);
            printed.push(self.print_value(result));
            self.ctx.gc(false);
            rest = &rest[outcome.consumed..];
        }
    }

    /// Render a value the way the printer would.
    pub fn print_value(&self, value: Handle) -> String {
        let state = self.ctx.lock_state();
        slip_read::print_value(&state.heap, state.global_env, value)
    }

    /// Render a value to a writer (standard output in the REPL).
    pub fn print_to<W: io::Write>(&self, out: &mut W, value: Handle) -> Result<()> {
        let text = self.print_value(value);
        out.write_all(text.as_bytes())?;
        Ok(())
    }

    /// Run a collection; returns bytes reclaimed.
    pub fn gc(&self, force: bool) -> usize {
        self.ctx.gc(force)
    }

    /// Memory gauges snapshot.
    pub fn stats(&self) -> MemStatsSnapshot {
        self.ctx.stats()
    }

    /// Dump the full allocation accounting to `out`.
    pub fn write_gc_stats<W: io::Write>(&self, out: &mut W) -> Result<()> {
        self.ctx.gc_stats(out)?;
        Ok(())
    }

    /// The underlying context, for embedders that need the raw API.
    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }
}
