//! The value heap and its accounting allocator.
//!
//! Cells live in a slot arena; a free list recycles slots after a
//! sweep. Alongside the arena the heap keeps one allocation record per
//! live cell (size, allocating source location, mark bit), ordered by
//! handle address. The record collection is what the collector marks
//! and sweeps, and it is the authority on whether a handle belongs to
//! this context.
//!
//! The allocator enforces the byte budgets: crossing the soft limit
//! latches a one-shot warning, and an allocation that would cross the
//! hard limit stalls until the supervisor cancels the evaluation (or
//! fails outright when no worker is running).

use std::collections::BTreeMap;
use std::panic::Location;
use std::sync::Arc;

use log::{debug, warn};

use crate::context::{EvalSignals, PrimProc};
use crate::stats::MemGauges;
use crate::value::{Handle, ValueCell, ValueId};

/// Bookkeeping for one live cell.
#[derive(Debug)]
pub struct AllocRecord {
    /// Charged size in bytes: the cell plus its owned payload.
    pub size: usize,
    /// Source file of the allocating site.
    pub file: &'static str,
    /// Source line of the allocating site.
    pub line: u32,
    /// GC mark bit; zero outside a mark/sweep window.
    pub mark: bool,
}

/// Arena of tagged cells plus the allocation record collection.
pub struct Heap {
    pub(crate) slots: Vec<Option<ValueCell>>,
    pub(crate) free_slots: Vec<u32>,
    pub(crate) records: BTreeMap<ValueId, AllocRecord>,
    pub(crate) gauges: Arc<MemGauges>,
    pub(crate) signals: Arc<EvalSignals>,
}

impl Heap {
    pub(crate) fn new(gauges: Arc<MemGauges>, signals: Arc<EvalSignals>) -> Self {
        Heap {
            slots: Vec::new(),
            free_slots: Vec::new(),
            records: BTreeMap::new(),
            gauges,
            signals,
        }
    }

    pub fn gauges(&self) -> &Arc<MemGauges> {
        &self.gauges
    }

    pub fn signals(&self) -> &Arc<EvalSignals> {
        &self.signals
    }

    /// Allocate one cell, charging its size against the context budget.
    ///
    /// Returns the new handle, or absent when the hard limit blocks the
    /// allocation (the cancellation path) or no worker was running to
    /// cancel.
    #[track_caller]
    pub(crate) fn alloc(&mut self, cell: ValueCell) -> Handle {
        let location = Location::caller();
        let size = std::mem::size_of::<ValueCell>() + cell.payload_bytes();
        let hard = self.gauges.hard_limit;
        let soft = self.gauges.soft_limit;

        if self.gauges.bytes_allocated() + size > hard {
            if !self.signals.is_running() {
                warn!(
                    "allocation of {size} bytes refused: hard limit {hard} reached \
                     with no evaluation to cancel"
                );
                return None;
            }
            // Stall until the watchdog notices the ceiling and cancels.
            // The watchdog triggers on bare-cell headroom; a payload so
            // large that only it is blocked would never trip it, so it
            // is refused outright instead of stalling forever.
            let bare_cell = std::mem::size_of::<ValueCell>();
            while self.gauges.bytes_allocated() + size > hard {
                if self.signals.cancel_requested() {
                    return None;
                }
                if self.gauges.bytes_allocated() + bare_cell < hard {
                    warn!("allocation of {size} bytes refused: payload exceeds remaining budget");
                    return None;
                }
                std::thread::yield_now();
            }
        }

        let projected = self.gauges.bytes_allocated() + size;
        if projected > soft {
            if self.gauges.latch_warned() && self.gauges.is_verbose() {
                warn!("soft memory limit reached ({projected} > {soft} bytes)");
            }
        } else if self.gauges.is_warned() {
            self.gauges.clear_warned();
        }

        let id = match self.free_slots.pop() {
            Some(index) => {
                self.slots[index as usize] = Some(cell);
                ValueId::from_index(index as usize)
            }
            None => {
                self.slots.push(Some(cell));
                ValueId::from_index(self.slots.len() - 1)
            }
        };

        self.records.insert(
            id,
            AllocRecord {
                size,
                file: location.file(),
                line: location.line(),
                mark: false,
            },
        );
        self.gauges.charge(size);
        self.gauges.set_list_entries(self.records.len());
        Some(id)
    }

    /// Free one cell: drop its record, release its payload and return
    /// the slot to the free list. Freeing an unknown handle warns and
    /// is otherwise a no-op.
    pub fn free_value(&mut self, value: Handle) {
        let Some(id) = value else { return };
        match self.records.remove(&id) {
            Some(record) => {
                self.slots[id.index()] = None;
                self.free_slots.push(id.index() as u32);
                self.gauges.release(record.size);
                self.gauges.set_list_entries(self.records.len());
            }
            None => {
                warn!("free_value called on unknown handle {:?}", id);
            }
        }
    }

    /// Borrow the cell behind a handle, if it is live in this heap.
    pub fn get(&self, value: Handle) -> Option<&ValueCell> {
        value.and_then(|id| self.cell(id))
    }

    /// Borrow the cell at `id`, if the slot is live.
    pub fn cell(&self, id: ValueId) -> Option<&ValueCell> {
        self.slots.get(id.index()).and_then(|slot| slot.as_ref())
    }

    pub(crate) fn get_mut(&mut self, id: ValueId) -> Option<&mut ValueCell> {
        self.slots
            .get_mut(id.index())
            .and_then(|slot| slot.as_mut())
    }

    /// Whether the handle belongs to this heap.
    pub fn owns(&self, value: Handle) -> bool {
        match value {
            Some(id) => self.records.contains_key(&id),
            None => false,
        }
    }

    /// Number of live cells.
    pub fn live_cells(&self) -> usize {
        self.records.len()
    }

    /// Iterate the allocation records in handle order.
    pub fn records(&self) -> impl Iterator<Item = (ValueId, &AllocRecord)> {
        self.records.iter().map(|(id, record)| (*id, record))
    }

    /// Sum of the recorded sizes; equals the byte gauge by invariant.
    pub fn recorded_bytes(&self) -> usize {
        self.records.values().map(|record| record.size).sum()
    }

    // Cell constructors. Each captures the caller's source location for
    // the allocation record.

    #[track_caller]
    pub fn make_int(&mut self, value: i64) -> Handle {
        self.alloc(ValueCell::Integer(value))
    }

    #[track_caller]
    pub fn make_decimal(&mut self, value: f64) -> Handle {
        self.alloc(ValueCell::Decimal(value))
    }

    #[track_caller]
    pub fn make_string(&mut self, text: &str) -> Handle {
        self.alloc(ValueCell::Str(text.to_string()))
    }

    #[track_caller]
    pub fn make_symbol(&mut self, ident: &str) -> Handle {
        self.alloc(ValueCell::Symbol(ident.to_string()))
    }

    #[track_caller]
    pub fn make_prim(&mut self, proc: PrimProc) -> Handle {
        self.alloc(ValueCell::Primitive(proc))
    }

    #[track_caller]
    pub fn make_error(&mut self, message: &str) -> Handle {
        debug!("error value created: {message}");
        self.alloc(ValueCell::Error(message.to_string()))
    }

    /// `#t` or `#f` from a host boolean.
    #[track_caller]
    pub fn make_bool(&mut self, truth: bool) -> Handle {
        self.make_symbol(if truth { "#t" } else { "#f" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_heap_with_limits;

    #[test]
    fn test_accounting_invariant_after_alloc_free() {
        let mut heap = test_heap_with_limits(4096, 8192);
        let a = heap.make_int(1);
        let b = heap.make_string("hello");
        let _c = heap.cons(a, b);
        assert_eq!(heap.recorded_bytes(), heap.gauges().bytes_allocated());

        heap.free_value(a);
        assert_eq!(heap.recorded_bytes(), heap.gauges().bytes_allocated());
        assert_eq!(heap.gauges().n_frees(), 1);
    }

    #[test]
    fn test_string_payload_is_charged() {
        let mut heap = test_heap_with_limits(4096, 8192);
        let before = heap.gauges().bytes_allocated();
        heap.make_string("0123456789");
        let charged = heap.gauges().bytes_allocated() - before;
        assert_eq!(charged, std::mem::size_of::<ValueCell>() + 10);
    }

    #[test]
    fn test_slot_reuse_after_free() {
        let mut heap = test_heap_with_limits(4096, 8192);
        let a = heap.make_int(1);
        heap.free_value(a);
        let b = heap.make_int(2);
        // the freed slot is recycled
        assert_eq!(a, b);
        assert_eq!(heap.live_cells(), 1);
    }

    #[test]
    fn test_hard_limit_without_worker_fails() {
        let mut heap = test_heap_with_limits(64, 96);
        let mut last = None;
        for i in 0..16 {
            let handle = heap.make_int(i);
            if handle.is_none() {
                break;
            }
            last = handle;
        }
        assert!(last.is_some());
        assert!(heap.gauges().bytes_allocated() <= 96);
        // the refused allocation did not disturb the accounting
        assert_eq!(heap.recorded_bytes(), heap.gauges().bytes_allocated());
    }

    #[test]
    fn test_free_unknown_handle_is_noop() {
        let mut heap = test_heap_with_limits(4096, 8192);
        let a = heap.make_int(1);
        heap.free_value(a);
        let bytes = heap.gauges().bytes_allocated();
        heap.free_value(a);
        assert_eq!(heap.gauges().bytes_allocated(), bytes);
    }

    #[test]
    fn test_owns() {
        let mut heap = test_heap_with_limits(4096, 8192);
        let a = heap.make_int(1);
        assert!(heap.owns(a));
        assert!(!heap.owns(None));
        heap.free_value(a);
        assert!(!heap.owns(a));
    }
}
