//! Context creation and environment setup.
//!
//! `make_context` builds a context and registers the canonical
//! primitive set; the host then adds its own primitives and cvars and
//! calls `setup_environment` exactly once. Setup registers the builtin
//! gauge cvars, builds the initial frame from the primitive registry
//! (in registration order), loads the derived-procedure library, and
//! finishes with a forced collection.

use std::sync::Arc;

use slip_core::{
    env, Context, ContextConfig, CoreError, CvarAccess, CvarSlot, Handle, InternalVar, PrimProc,
};

use crate::builtins;
use crate::error::Result;
use crate::run::run;

/// Create a context with the canonical primitives registered.
pub fn make_context(config: ContextConfig) -> std::result::Result<Arc<Context>, CoreError> {
    let ctx = Arc::new(Context::new(config)?);
    builtins::register(&ctx);
    Ok(ctx)
}

/// Finalize a context: builtin cvars, initial environment, library.
///
/// Must be called exactly once, after any host registrations.
pub fn setup_environment(ctx: &Arc<Context>) -> Result<()> {
    {
        let state = ctx.lock_state();
        if state.global_env.is_some() {
            return Err(CoreError::AlreadySetup.into());
        }
    }

    ctx.add_cvar_slot(
        "mem_lim_hard",
        CvarSlot::Internal(InternalVar::MemLimHard),
        CvarAccess::ReadOnly,
    );
    ctx.add_cvar_slot(
        "mem_lim_soft",
        CvarSlot::Internal(InternalVar::MemLimSoft),
        CvarAccess::ReadOnly,
    );
    ctx.add_cvar_slot(
        "mem_list_entries",
        CvarSlot::Internal(InternalVar::MemListEntries),
        CvarAccess::ReadOnly,
    );
    ctx.add_cvar_slot(
        "mem_verbosity",
        CvarSlot::Internal(InternalVar::MemVerbosity),
        CvarAccess::ReadWrite,
    );
    ctx.add_cvar_slot(
        "mem_allocated",
        CvarSlot::Internal(InternalVar::MemAllocated),
        CvarAccess::ReadOnly,
    );
    ctx.add_cvar_slot(
        "thread_timeout",
        CvarSlot::Internal(InternalVar::ThreadTimeout),
        CvarAccess::ReadWrite,
    );

    {
        let mut state = ctx.lock_state();

        // the outermost environment is a single empty frame
        let empty_frame = state.heap.cons(None, None);
        let empty_env = state.heap.cons(empty_frame, None);

        // bind every registered primitive, head of the frame being the
        // first registration
        let entries: Vec<(String, PrimProc)> = state
            .prims
            .iter()
            .map(|(name, proc)| (name.clone(), *proc))
            .collect();
        let mut names: Handle = None;
        let mut objects: Handle = None;
        for (name, proc) in entries.iter().rev() {
            let symbol = state.heap.make_symbol(name);
            names = state.heap.cons(symbol, names);

            let native = state.heap.make_prim(*proc);
            let native_tail = state.heap.cons(native, None);
            let tag = state.heap.make_symbol("primitive");
            let object = state.heap.cons(tag, native_tail);
            objects = state.heap.cons(object, objects);
        }

        state.global_env = env::extend(&mut state.heap, names, objects, empty_env);
    }

    for source in DERIVED_LIBRARY {
        run(source, ctx)?;
    }

    ctx.gc(true);
    Ok(())
}

/// The derived procedures every context ships with, loaded as source.
const DERIVED_LIBRARY: &[&str] = &[
    "(define (caar pair) (car (car pair)))",
    "(define (cadr pair) (car (cdr pair)))",
    "(define (cdar pair) (cdr (car pair)))",
    "(define (cddr pair) (cdr (cdr pair)))",
    "(define (caaar pair) (car (car (car pair))))",
    "(define (caadr pair) (car (car (cdr pair))))",
    "(define (cadar pair) (car (cdr (car pair))))",
    "(define (caddr pair) (car (cdr (cdr pair))))",
    "(define (cdaar pair) (cdr (car (car pair))))",
    "(define (cdadr pair) (cdr (car (cdr pair))))",
    "(define (cddar pair) (cdr (cdr (car pair))))",
    "(define (cdddr pair) (cdr (cdr (cdr pair))))",
    "(define (caaaar pair) (car (car (car (car pair)))))",
    "(define (caaadr pair) (car (car (car (cdr pair)))))",
    "(define (caadar pair) (car (car (cdr (car pair)))))",
    "(define (caaddr pair) (car (car (cdr (cdr pair)))))",
    "(define (cadaar pair) (car (cdr (car (car pair)))))",
    "(define (cadadr pair) (car (cdr (car (cdr pair)))))",
    "(define (caddar pair) (car (cdr (cdr (car pair)))))",
    "(define (cadddr pair) (car (cdr (cdr (cdr pair)))))",
    "(define (cdaaar pair) (cdr (car (car (car pair)))))",
    "(define (cdaadr pair) (cdr (car (car (cdr pair)))))",
    "(define (cdadar pair) (cdr (car (cdr (car pair)))))",
    "(define (cdaddr pair) (cdr (car (cdr (cdr pair)))))",
    "(define (cddaar pair) (cdr (cdr (car (car pair)))))",
    "(define (cddadr pair) (cdr (cdr (car (cdr pair)))))",
    "(define (cdddar pair) (cdr (cdr (cdr (car pair)))))",
    "(define (cddddr pair) (cdr (cdr (cdr (cdr pair)))))",
    "(define nil '())",
    "(define (zero? exp) (= 0 exp))",
    "(define (null? exp) (eq? exp nil))",
    "(define (negative? exp) (< exp 0))",
    "(define (positive? exp) (> exp 0))",
    "(define (boolean? exp) (or (eq? exp '#t) (eq? exp '#f)))",
    "(define (abs n) (if (negative? n) (- 0 n) n))",
    "(define (<= a b) (not (> a b)))",
    "(define (>= a b) (not (< a b)))",
    "(define (map proc items) (if (null? items) nil (cons (proc (car items)) (map proc (cdr items)))))",
    "(define (fact n) (if (= n 1) 1 (* n (fact (- n 1)))))",
    "(define (delay proc) (lambda () proc))",
    "(define (force proc) (proc))",
    "(define (length list) (define (list-loop part count) (if (null? part) count (list-loop (cdr part) (+ count 1)))) (list-loop list 0))",
    "(define (modulo num div) (- num (* (floor (/ num div)) div)))",
    "(define (quotient num div) (truncate (/ num div)))",
    "(define (remainder num div) (+ (* (quotient num div) div -1) num))",
    "(define (odd? n) (if (= 1 (modulo n 2)) '#t '#f))",
    "(define (even? n) (not (odd? n)))",
    "(define (square n) (* n n))",
    "(define (average a b) (/ (+ a b) 2))",
    "(define (sqrt x) (define (good-enough? guess) (< (abs (- (square guess) x)) 0.000001)) (define (improve guess) (average guess (/ x guess))) (define (sqrt-iter guess) (if (good-enough? guess) (abs guess) (sqrt-iter (improve guess)))) (sqrt-iter 1.0))",
    "(define (append list1 list2) (if (null? list1) list2 (cons (car list1) (append (cdr list1) list2))))",
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker;

    fn interp() -> Arc<Context> {
        let ctx = make_context(ContextConfig::new(768 * 1024, 1024 * 1024, false, 10))
            .expect("context");
        setup_environment(&ctx).expect("setup");
        ctx
    }

    fn eval_to_string(ctx: &Arc<Context>, source: &str) -> String {
        let value = {
            let mut st = ctx.lock_state();
            slip_read::read(source, &mut st.heap).expect("read").value
        };
        let result = worker::eval(ctx, value);
        let st = ctx.lock_state();
        slip_read::print_value(&st.heap, st.global_env, result)
    }

    #[test]
    fn test_setup_is_once_only() {
        let ctx = interp();
        assert!(setup_environment(&ctx).is_err());
    }

    #[test]
    fn test_initial_frame_binds_primitives_in_registration_order() {
        let ctx = interp();
        let st = ctx.lock_state();
        let frame = st.heap.car(st.global_env);
        let names = st.heap.car(frame);
        // "+" was registered first, so it heads the frame
        assert!(st.heap.symbol_is(st.heap.car(names), "+"));
        assert_eq!(st.heap.list_length(names), st.prims.len());
        // every binding is a (primitive <prim>) object
        let objects = st.heap.cdr(frame);
        assert!(st.heap.tagged_with(st.heap.car(objects), "primitive"));
    }

    #[test]
    fn test_builtin_cvars_present() {
        let ctx = interp();
        let st = ctx.lock_state();
        for name in [
            "mem_lim_hard",
            "mem_lim_soft",
            "mem_list_entries",
            "mem_verbosity",
            "mem_allocated",
            "thread_timeout",
        ] {
            assert!(st.cvars.contains_key(name), "missing cvar {name}");
        }
    }

    #[test]
    fn test_library_procedures() {
        let ctx = interp();
        assert_eq!(eval_to_string(&ctx, "(cadr '(1 2 3))"), "2");
        assert_eq!(eval_to_string(&ctx, "(cddr '(1 2 3))"), "(3)");
        assert_eq!(eval_to_string(&ctx, "nil"), "()");
        assert_eq!(eval_to_string(&ctx, "(null? nil)"), "#t");
        assert_eq!(eval_to_string(&ctx, "(null? '(1))"), "#f");
        assert_eq!(eval_to_string(&ctx, "(zero? 0)"), "#t");
        assert_eq!(eval_to_string(&ctx, "(abs -4)"), "4");
        assert_eq!(eval_to_string(&ctx, "(<= 1 2)"), "#t");
        assert_eq!(eval_to_string(&ctx, "(>= 1 2)"), "#f");
        assert_eq!(eval_to_string(&ctx, "(modulo 7 2)"), "1");
        assert_eq!(eval_to_string(&ctx, "(quotient 7 2)"), "3");
        assert_eq!(eval_to_string(&ctx, "(remainder 7 2)"), "1");
        assert_eq!(eval_to_string(&ctx, "(odd? 3)"), "#t");
        assert_eq!(eval_to_string(&ctx, "(even? 3)"), "#f");
        assert_eq!(eval_to_string(&ctx, "(square 6)"), "36");
        assert_eq!(eval_to_string(&ctx, "(average 4 6)"), "5");
        assert_eq!(eval_to_string(&ctx, "(length '(a b c))"), "3");
        assert_eq!(eval_to_string(&ctx, "(fact 5)"), "120");
        assert_eq!(
            eval_to_string(&ctx, "(map (lambda (n) (* n n)) '(1 2 3))"),
            "(1 4 9)"
        );
        assert_eq!(
            eval_to_string(&ctx, "(append '(1 2) '(3 4))"),
            "(1 2 3 4)"
        );
    }

    #[test]
    fn test_library_sqrt_tolerance() {
        let ctx = interp();
        // Newton iteration with 1e-6 tolerance, printed through %g
        assert_eq!(eval_to_string(&ctx, "(sqrt 25)"), "5");
        assert_eq!(eval_to_string(&ctx, "(sqrt (+ (* 3 3) (* 4 4)))"), "5");
    }

    #[test]
    fn test_host_registrations_visible_to_user_code() {
        use slip_core::{CvarAccess, Handle, State};
        use std::sync::atomic::{AtomicI64, Ordering};

        fn answer_prim(_args: Handle, state: &mut State) -> Handle {
            state.heap.make_int(42)
        }

        let ctx = make_context(ContextConfig::new(768 * 1024, 1024 * 1024, false, 10))
            .expect("context");
        let guess = Arc::new(AtomicI64::new(7));
        ctx.add_cvar("my-guess", Arc::clone(&guess), CvarAccess::ReadWrite);
        ctx.add_prim_proc("answer", answer_prim);
        setup_environment(&ctx).expect("setup");

        assert_eq!(eval_to_string(&ctx, "(answer)"), "42");
        assert_eq!(eval_to_string(&ctx, "(get-cvar 'my-guess)"), "7");
        assert_eq!(eval_to_string(&ctx, "(set-cvar! 'my-guess 17)"), "ok");
        assert_eq!(guess.load(Ordering::SeqCst), 17);
    }

    #[test]
    fn test_setup_leaves_accounting_consistent() {
        let ctx = interp();
        let st = ctx.lock_state();
        assert_eq!(st.heap.recorded_bytes(), st.gauges().bytes_allocated());
    }
}
