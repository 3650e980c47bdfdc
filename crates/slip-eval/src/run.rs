//! Read-eval over a whole source string.

use std::sync::Arc;

use slip_core::Context;

use crate::error::Result;
use crate::worker;

/// Read and evaluate every expression in `source`, discarding the
/// values; a soft collection runs between statements. Reader failure
/// is the only error — evaluation errors are in-band Error values and
/// are discarded with the rest.
pub fn run(source: &str, ctx: &Arc<Context>) -> Result<()> {
    let mut rest = source;
    loop {
        if rest.trim().is_empty() {
            return Ok(());
        }
        let outcome = {
            let mut state = ctx.lock_state();
            slip_read::read(rest, &mut state.heap)?
        };
        if outcome.consumed == 0 {
            return Ok(());
        }

        worker::eval(ctx, outcome.value);
        // statement boundary: the only place a routine collection runs
        ctx.gc(false);

        rest = &rest[outcome.consumed..];
    }
}
