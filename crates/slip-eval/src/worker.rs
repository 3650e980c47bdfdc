//! The eval worker: evaluation under a timeout and a memory ceiling.
//!
//! Every caller-visible evaluation runs on a helper thread while the
//! submitting thread polls `thread_running` with a wall-clock check
//! and a memory gauge check. Either breach raises the cooperative
//! cancellation flag; the evaluator observes it at every entry (and
//! the allocator while stalled at the ceiling) and unwinds, leaving
//! the heap consistent. A cancelled evaluation reports the absent
//! value; rootless temporaries it created are reclaimed by the forced
//! collection that follows a memory cancel.
//!
//! Only one worker per context runs at a time: the worker holds the
//! state lock for the whole evaluation, and the supervisor does not
//! return until `thread_running` has dropped.

use std::mem;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{error, warn};
use parking_lot::Mutex;

use slip_core::{Context, EvalSignals, Handle, ValueCell};

use crate::eval::{eval_expr, Halt};

/// Clears the crossing flags when the worker exits, however it exits.
/// A worker that died without this would leave `thread_running` set
/// and the supervisor spinning forever.
struct RunningGuard(Arc<EvalSignals>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.clear_cancel();
        self.0.set_running(false);
    }
}

/// Evaluate `exp` against the context's global environment, through
/// the worker. Structural failures (spawn) and cancellations both
/// yield the absent value; language-level errors come back as Error
/// values.
pub fn eval(ctx: &Arc<Context>, exp: Handle) -> Handle {
    let signals = Arc::clone(ctx.signals());
    let gauges = Arc::clone(ctx.gauges());

    let slot: Arc<Mutex<Handle>> = Arc::new(Mutex::new(None));
    let worker_ctx = Arc::clone(ctx);
    let worker_slot = Arc::clone(&slot);

    signals.set_running(true);
    let spawned = thread::Builder::new()
        .name("slip-eval".to_string())
        .stack_size(ctx.config().worker_stack_bytes)
        .spawn(move || {
            let _guard = RunningGuard(Arc::clone(worker_ctx.signals()));
            let mut state = worker_ctx.lock_state();
            let root = state.global_env;
            let result = match eval_expr(exp, root, &mut state, 0) {
                Ok(value) => value,
                Err(Halt::Cancelled) => None,
            };
            drop(state);

            *worker_slot.lock() = result;
            // the guard neutralizes any cancellation that raced with
            // completion before clearing thread_running
        });

    let join_handle = match spawned {
        Ok(handle) => handle,
        Err(err) => {
            error!("could not spawn eval worker: {err}");
            signals.set_running(false);
            return None;
        }
    };

    let start = Instant::now();
    let headroom = mem::size_of::<ValueCell>();
    let mut memory_cancel = false;
    let mut timed_out = false;
    while signals.is_running() {
        let timeout = signals.timeout_secs();
        if timeout > 0 && start.elapsed() > Duration::from_secs(timeout) && !timed_out {
            warn!("eval timed out after {timeout}s; cancelling");
            signals.request_cancel();
            timed_out = true;
        }
        if gauges.bytes_allocated() + headroom >= gauges.hard_limit && !memory_cancel {
            warn!(
                "hard memory limit reached ({} of {} bytes); cancelling eval",
                gauges.bytes_allocated(),
                gauges.hard_limit
            );
            signals.request_cancel();
            memory_cancel = true;
        }
        thread::yield_now();
    }
    let _ = join_handle.join();
    // a request the worker never observed must not leak into the next
    // evaluation
    signals.clear_cancel();

    if memory_cancel {
        ctx.gc(true);
    }

    let result = slot.lock().take();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::run;
    use crate::setup::{make_context, setup_environment};
    use slip_core::ContextConfig;

    fn eval_to_string(ctx: &Arc<Context>, source: &str) -> String {
        let value = {
            let mut st = ctx.lock_state();
            slip_read::read(source, &mut st.heap).expect("read").value
        };
        let result = eval(ctx, value);
        let st = ctx.lock_state();
        slip_read::print_value(&st.heap, st.global_env, result)
    }

    #[test]
    fn test_timeout_cancels_and_context_stays_usable() {
        let ctx = make_context(ContextConfig {
            soft_limit_bytes: 8 * 1024 * 1024,
            hard_limit_bytes: 16 * 1024 * 1024,
            timeout_secs: 1,
            ..ContextConfig::default()
        })
        .expect("context");
        setup_environment(&ctx).expect("setup");

        let start = Instant::now();
        run("(define (loop) (loop)) (loop)", &ctx).expect("run");
        assert!(
            start.elapsed() < Duration::from_secs(2),
            "cancellation took {:?}",
            start.elapsed()
        );

        // the context is still usable afterwards
        assert_eq!(eval_to_string(&ctx, "(+ 1 2)"), "3");
    }

    #[test]
    fn test_memory_ceiling_cancels_runaway_allocation() {
        let ctx = make_context(ContextConfig {
            soft_limit_bytes: 384 * 1024,
            hard_limit_bytes: 512 * 1024,
            timeout_secs: 30,
            ..ContextConfig::default()
        })
        .expect("context");
        setup_environment(&ctx).expect("setup");

        let start = Instant::now();
        run(
            "(define (grow l) (grow (cons 1 l))) (grow '())",
            &ctx,
        )
        .expect("run");
        assert!(
            start.elapsed() < Duration::from_secs(10),
            "memory cancellation took {:?}",
            start.elapsed()
        );

        // the forced collection brought usage back under the ceiling
        assert!(ctx.gauges().bytes_allocated() < 512 * 1024);
        assert_eq!(eval_to_string(&ctx, "(* 6 7)"), "42");
    }

    #[test]
    fn test_cancelled_eval_reports_absent() {
        let ctx = make_context(ContextConfig {
            soft_limit_bytes: 8 * 1024 * 1024,
            hard_limit_bytes: 16 * 1024 * 1024,
            timeout_secs: 1,
            ..ContextConfig::default()
        })
        .expect("context");
        setup_environment(&ctx).expect("setup");

        eval_to_string(&ctx, "(define (loop) (loop))");
        assert_eq!(eval_to_string(&ctx, "(loop)"), "()");
    }

    #[test]
    fn test_zero_timeout_disables_the_clock() {
        let ctx = make_context(ContextConfig {
            timeout_secs: 0,
            ..ContextConfig::default()
        })
        .expect("context");
        setup_environment(&ctx).expect("setup");
        assert_eq!(eval_to_string(&ctx, "(fact 10)"), "3628800");
    }
}
