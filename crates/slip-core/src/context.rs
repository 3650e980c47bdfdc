//! The interpreter context: the owner of all other components.
//!
//! Every piece of mutable interpreter state lives here, threaded
//! through every operation; there are no module-level globals, so any
//! number of contexts coexist without sharing anything.
//!
//! Concurrency model: public operations are single-threaded per
//! context. The only permitted concurrency is the supervisor/worker
//! pair during an evaluation — the worker owns the `State` behind the
//! mutex for the whole evaluation, while the supervisor restricts
//! itself to the atomics in `EvalSignals` and `MemGauges`.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use log::{info, warn};
use parking_lot::{Mutex, MutexGuard};

use crate::config::ContextConfig;
use crate::error::Result;
use crate::gc;
use crate::heap::Heap;
use crate::stats::{MemGauges, MemStatsSnapshot};
use crate::value::Handle;

/// A native operation: receives the (already evaluated) argument list
/// and the interpreter state, returns a value.
pub type PrimProc = fn(Handle, &mut State) -> Handle;

/// Access mode of a registered cvar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CvarAccess {
    ReadOnly,
    ReadWrite,
}

/// Where a cvar's integer actually lives.
#[derive(Debug, Clone)]
pub enum CvarSlot {
    /// A host-owned integer cell.
    Host(Arc<AtomicI64>),
    /// One of the context's own gauges.
    Internal(InternalVar),
}

/// The context gauges exported as builtin cvars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalVar {
    MemLimHard,
    MemLimSoft,
    MemListEntries,
    MemAllocated,
    MemVerbosity,
    ThreadTimeout,
}

/// One cvar registry entry.
#[derive(Debug, Clone)]
pub struct CvarEntry {
    pub slot: CvarSlot,
    pub access: CvarAccess,
}

/// The supervisor/worker crossing flags.
///
/// `running` gates the supervisor's poll loop, `cancel` is the
/// cooperative cancellation request, and `timeout_secs` backs the
/// read-write `thread_timeout` cvar.
#[derive(Debug)]
pub struct EvalSignals {
    running: AtomicBool,
    cancel: AtomicBool,
    timeout_secs: AtomicU64,
}

impl EvalSignals {
    pub fn new(timeout_secs: u64) -> Self {
        EvalSignals {
            running: AtomicBool::new(false),
            cancel: AtomicBool::new(false),
            timeout_secs: AtomicU64::new(timeout_secs),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn clear_cancel(&self) {
        self.cancel.store(false, Ordering::SeqCst);
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs.load(Ordering::SeqCst)
    }

    pub fn set_timeout_secs(&self, secs: u64) {
        self.timeout_secs.store(secs, Ordering::SeqCst);
    }
}

/// Worker-owned interpreter state: the heap, the two registries and
/// the global environment root.
pub struct State {
    pub heap: Heap,
    /// Primitive registry, iterated in registration order when the
    /// initial environment is built.
    pub prims: IndexMap<String, PrimProc>,
    /// Cvar registry, also insertion-ordered.
    pub cvars: IndexMap<String, CvarEntry>,
    /// Liveness root of the garbage collector; absent until
    /// environment setup, retained across collections afterwards.
    pub global_env: Handle,
    /// Maximum non-tail evaluation depth.
    pub max_depth: u32,
}

impl State {
    pub fn signals(&self) -> &Arc<EvalSignals> {
        self.heap.signals()
    }

    pub fn gauges(&self) -> &Arc<MemGauges> {
        self.heap.gauges()
    }

    /// Read a cvar slot's current value.
    pub fn cvar_value(&self, entry: &CvarEntry) -> i64 {
        match &entry.slot {
            CvarSlot::Host(cell) => cell.load(Ordering::SeqCst),
            CvarSlot::Internal(var) => {
                let gauges = self.heap.gauges();
                match var {
                    InternalVar::MemLimHard => gauges.hard_limit as i64,
                    InternalVar::MemLimSoft => gauges.soft_limit as i64,
                    InternalVar::MemListEntries => gauges.list_entries() as i64,
                    InternalVar::MemAllocated => gauges.bytes_allocated() as i64,
                    InternalVar::MemVerbosity => gauges.verbosity(),
                    InternalVar::ThreadTimeout => self.signals().timeout_secs() as i64,
                }
            }
        }
    }

    /// Write a cvar slot. The caller has already checked the access
    /// mode; writing a read-only internal gauge is a no-op.
    pub fn set_cvar_value(&self, entry: &CvarEntry, value: i64) {
        match &entry.slot {
            CvarSlot::Host(cell) => cell.store(value, Ordering::SeqCst),
            CvarSlot::Internal(InternalVar::MemVerbosity) => {
                self.heap.gauges().set_verbosity(value);
            }
            CvarSlot::Internal(InternalVar::ThreadTimeout) => {
                self.signals().set_timeout_secs(value.max(0) as u64);
            }
            CvarSlot::Internal(_) => {}
        }
    }
}

/// One interpreter instance.
///
/// Create it, register primitives and cvars, set up the environment,
/// then read/evaluate/print. Dropping the context performs the final
/// collection and emits the memory statistics.
pub struct Context {
    config: ContextConfig,
    state: Mutex<State>,
    gauges: Arc<MemGauges>,
    signals: Arc<EvalSignals>,
}

impl Context {
    /// Build a context from a validated configuration.
    pub fn new(config: ContextConfig) -> Result<Self> {
        config.validate()?;

        let gauges = Arc::new(MemGauges::new(
            config.soft_limit_bytes,
            config.hard_limit_bytes,
            config.gc_verbose,
        ));
        let signals = Arc::new(EvalSignals::new(config.timeout_secs));
        let state = State {
            heap: Heap::new(Arc::clone(&gauges), Arc::clone(&signals)),
            prims: IndexMap::new(),
            cvars: IndexMap::new(),
            global_env: None,
            max_depth: config.max_depth,
        };

        Ok(Context {
            config,
            state: Mutex::new(state),
            gauges,
            signals,
        })
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn gauges(&self) -> &Arc<MemGauges> {
        &self.gauges
    }

    pub fn signals(&self) -> &Arc<EvalSignals> {
        &self.signals
    }

    /// Lock the worker-owned state.
    ///
    /// Held for the duration of an evaluation by the worker thread;
    /// everything else takes it briefly.
    pub fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock()
    }

    /// Register a named primitive. Must happen before environment
    /// setup for the name to be bound in the initial frame.
    pub fn add_prim_proc(&self, name: &str, proc: PrimProc) {
        let mut state = self.state.lock();
        if state.prims.insert(name.to_string(), proc).is_some() {
            warn!("primitive '{name}' re-registered; previous binding replaced");
        }
    }

    /// Register a host integer as a named cvar.
    pub fn add_cvar(&self, name: &str, cell: Arc<AtomicI64>, access: CvarAccess) {
        self.add_cvar_slot(name, CvarSlot::Host(cell), access);
    }

    /// Register a cvar backed by an arbitrary slot (used by environment
    /// setup for the builtin gauges).
    pub fn add_cvar_slot(&self, name: &str, slot: CvarSlot, access: CvarAccess) {
        let mut state = self.state.lock();
        let entry = CvarEntry { slot, access };
        if state.cvars.insert(name.to_string(), entry).is_some() {
            warn!("cvar '{name}' re-registered; previous binding replaced");
        }
    }

    /// Run a collection. Returns bytes reclaimed.
    pub fn gc(&self, force: bool) -> usize {
        let mut state = self.state.lock();
        gc::collect(&mut state, force)
    }

    /// Dump the memory accounting to `out`.
    pub fn gc_stats<W: std::io::Write>(&self, out: &mut W) -> std::io::Result<()> {
        let state = self.state.lock();
        gc::write_stats(out, &state)
    }

    /// Point-in-time copy of the memory gauges.
    pub fn stats(&self) -> MemStatsSnapshot {
        self.gauges.snapshot()
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        let state = self.state.get_mut();

        // final collection, then release the environment graph itself
        gc::collect(state, true);
        let root = state.global_env;
        state.heap.free_rec(root);
        state.global_env = None;

        state.prims.clear();
        state.cvars.clear();

        // anything still recorded leaked past the root
        for (_, record) in state.heap.records() {
            warn!(
                "context drop: cell allocated at {}:{} still live ({} bytes)",
                record.file, record.line, record.size
            );
        }

        let gauges = state.heap.gauges();
        info!(
            "context destroyed: {} allocs, {} frees, {} bytes peak",
            gauges.n_allocs(),
            gauges.n_frees(),
            gauges.peak_bytes()
        );
    }
}
