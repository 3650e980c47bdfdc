//! Single-generation mark-and-sweep collection.
//!
//! The liveness root is the context's global environment; everything
//! unreachable from it is garbage. Marking is an iterative worklist
//! over the allocation records, so deep lists cost heap instead of
//! host stack and the one-bit mark makes cycles a fixpoint rather than
//! a hang (the evaluator never builds cycles, but a host primitive
//! using `set-car!`/`set-cdr!` could).
//!
//! Collection never runs concurrently with evaluation: the worker owns
//! the interpreter state for the whole evaluation, and the supervisor
//! only forces a GC after a cancelled worker has exited.

use std::io::{self, Write};

use log::{debug, info, warn};

use crate::context::State;
use crate::heap::Heap;
use crate::value::{Handle, ValueCell, ValueId};

impl Heap {
    /// Reset every record's mark bit.
    pub(crate) fn clear_marks(&mut self) {
        for record in self.records.values_mut() {
            record.mark = false;
        }
    }

    /// Set the mark bit on everything reachable from `root`.
    ///
    /// A handle without a record is diagnosed and skipped (the
    /// "unknown pointer" condition); it cannot be traversed safely.
    pub(crate) fn mark_from(&mut self, root: Handle) {
        let mut work: Vec<ValueId> = Vec::new();
        if let Some(id) = root {
            work.push(id);
        }
        while let Some(id) = work.pop() {
            let Some(record) = self.records.get_mut(&id) else {
                warn!("gc: unknown pointer {:?} reached while marking", id);
                continue;
            };
            if record.mark {
                continue;
            }
            record.mark = true;
            if let Some(ValueCell::Pair(left, right)) =
                self.slots.get(id.index()).and_then(|slot| slot.as_ref())
            {
                if let Some(left) = left {
                    work.push(*left);
                }
                if let Some(right) = right {
                    work.push(*right);
                }
            }
        }
    }

    /// Free every record whose mark equals `req_mark`; returns the
    /// bytes reclaimed.
    pub(crate) fn sweep(&mut self, req_mark: bool) -> usize {
        let victims: Vec<ValueId> = self
            .records
            .iter()
            .filter(|(_, record)| record.mark == req_mark)
            .map(|(id, _)| *id)
            .collect();
        let before = self.gauges.bytes_allocated();
        for id in victims {
            self.free_value(Some(id));
        }
        before - self.gauges.bytes_allocated()
    }

    /// Targeted collection: reclaim exactly the subgraph reachable from
    /// `value`, ignoring the global root. Returns the bytes reclaimed.
    pub fn free_rec(&mut self, value: Handle) -> usize {
        self.clear_marks();
        self.mark_from(value);
        self.sweep(true)
    }
}

/// Run a collection against the context's global environment.
///
/// Without `force`, the collection is a no-op until the byte gauge has
/// crossed the soft limit. Returns the bytes reclaimed.
pub fn collect(state: &mut State, force: bool) -> usize {
    let root = state.global_env;
    let gauges = state.heap.gauges().clone();
    if !force && gauges.bytes_allocated() <= gauges.soft_limit {
        return 0;
    }

    state.heap.clear_marks();
    state.heap.mark_from(root);
    let reclaimed = state.heap.sweep(false);
    // marks are transient: zero outside the mark/sweep window
    state.heap.clear_marks();

    if gauges.is_verbose() {
        info!(
            "gc: {} bytes reclaimed, {} bytes live in {} cells",
            reclaimed,
            gauges.bytes_allocated(),
            state.heap.live_cells()
        );
    } else {
        debug!(
            "gc: {} bytes reclaimed, {} bytes live in {} cells",
            reclaimed,
            gauges.bytes_allocated(),
            state.heap.live_cells()
        );
    }
    reclaimed
}

/// Dump the memory accounting to a diagnostic stream: outstanding
/// allocations by source location, then the counters.
pub fn write_stats<W: Write>(out: &mut W, state: &State) -> io::Result<()> {
    let gauges = state.heap.gauges();
    writeln!(out, "--- memory summary ---")?;
    if state.heap.live_cells() > 0 {
        writeln!(out, "Live allocations:")?;
        for (_, record) in state.heap.records() {
            writeln!(out, "  {}:{} ({} bytes)", record.file, record.line, record.size)?;
        }
    }
    writeln!(
        out,
        "{} allocs; {} frees.",
        gauges.n_allocs(),
        gauges.n_frees()
    )?;
    writeln!(
        out,
        "Bytes allocated: {} out of {} bytes peak memory usage.",
        gauges.bytes_allocated(),
        gauges.peak_bytes()
    )?;
    writeln!(out, "--- end summary ---")?;
    Ok(())
}
