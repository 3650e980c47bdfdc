//! The frame-chain environment model.
//!
//! An environment is a pair `(frame . enclosing)` where the enclosing
//! environment is absent at the outermost level. Each frame is a pair
//! `(vars . vals)` of parallel lists. Lookup and assignment scan
//! outward through the chain; definition is confined to the innermost
//! frame and never escapes to an enclosing one.

use crate::heap::Heap;
use crate::value::Handle;

/// Prepend a new frame binding `vars` to `vals` onto `env`.
///
/// The two lists must have equal length; a mismatch yields an Error
/// value instead of an environment.
#[track_caller]
pub fn extend(heap: &mut Heap, vars: Handle, vals: Handle, env: Handle) -> Handle {
    let n_vars = heap.list_length(vars);
    let n_vals = heap.list_length(vals);
    if n_vars == n_vals {
        let frame = heap.cons(vars, vals);
        return heap.cons(frame, env);
    }
    if n_vars < n_vals {
        heap.make_error("EXTEND -- Too many arguments")
    } else {
        heap.make_error("EXTEND -- Too few arguments")
    }
}

/// Value bound to `var`, scanning frames innermost-first.
pub fn lookup(heap: &mut Heap, var: Handle, env: Handle) -> Handle {
    let mut env = env;
    while env.is_some() {
        let frame = heap.car(env);
        let mut vars = heap.car(frame);
        let mut vals = heap.cdr(frame);
        while vars.is_some() {
            let candidate = heap.car(vars);
            if heap.is_equal(var, candidate) {
                return heap.car(vals);
            }
            vars = heap.cdr(vars);
            vals = heap.cdr(vals);
        }
        env = heap.cdr(env);
    }
    heap.make_error("LOOKUP -- Unbound variable")
}

/// `set!`: overwrite the binding of `var` wherever it is found.
pub fn assign(heap: &mut Heap, var: Handle, val: Handle, env: Handle) -> Handle {
    let mut env = env;
    while env.is_some() {
        let frame = heap.car(env);
        let mut vars = heap.car(frame);
        let mut vals = heap.cdr(frame);
        while vars.is_some() {
            let candidate = heap.car(vars);
            if heap.is_equal(var, candidate) {
                return heap.set_car(vals, val);
            }
            vars = heap.cdr(vars);
            vals = heap.cdr(vals);
        }
        env = heap.cdr(env);
    }
    heap.make_error("SET -- Unbound variable")
}

/// `define`: overwrite `var` in the innermost frame, or prepend a new
/// binding there. Returns the defined value.
#[track_caller]
pub fn define(heap: &mut Heap, var: Handle, val: Handle, env: Handle) -> Handle {
    let frame = heap.car(env);
    let mut vars = heap.car(frame);
    let mut vals = heap.cdr(frame);
    while vars.is_some() {
        let candidate = heap.car(vars);
        if heap.is_equal(var, candidate) {
            heap.set_car(vals, val);
            return val;
        }
        vars = heap.cdr(vars);
        vals = heap.cdr(vals);
    }

    let old_vars = heap.car(frame);
    let new_vars = heap.cons(var, old_vars);
    heap.set_car(frame, new_vars);
    let old_vals = heap.cdr(frame);
    let new_vals = heap.cons(val, old_vals);
    heap.set_cdr(frame, new_vals);
    val
}
