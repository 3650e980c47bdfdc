//! The canonical primitive library.
//!
//! Every primitive receives the already-evaluated argument list and
//! the interpreter state, and always returns a value; precondition
//! violations come back as Error values, never as host errors.
//!
//! Arithmetic follows the integer/decimal promotion rule: integers
//! stay exact, and any decimal result that equals its floor is
//! returned as an Integer.

use slip_core::{Context, CvarAccess, Handle, Heap, State, ValueCell};

/// A number taken out of a cell.
#[derive(Clone, Copy)]
enum Num {
    Int(i64),
    Dec(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Dec(d) => d,
        }
    }
}

fn as_num(heap: &Heap, value: Handle) -> Option<Num> {
    match heap.get(value) {
        Some(ValueCell::Integer(i)) => Some(Num::Int(*i)),
        Some(ValueCell::Decimal(d)) => Some(Num::Dec(*d)),
        _ => None,
    }
}

/// Integer when the value equals its floor, Decimal otherwise.
fn numeric_result(heap: &mut Heap, value: f64) -> Handle {
    if value.is_finite()
        && value == value.floor()
        && value >= i64::MIN as f64
        && value <= i64::MAX as f64
    {
        heap.make_int(value as i64)
    } else {
        heap.make_decimal(value)
    }
}

fn two_numbers(heap: &mut Heap, args: Handle, who: &str) -> Result<(Num, Num), Handle> {
    if heap.list_length(args) != 2 {
        return Err(heap.make_error(&format!("{who} -- Expected two operands")));
    }
    let first = as_num(heap, heap.car(args));
    let second = as_num(heap, heap.cadr(args));
    match (first, second) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(heap.make_error(&format!("{who} -- Expected number"))),
    }
}

fn one_number(heap: &mut Heap, args: Handle, who: &str) -> Result<Num, Handle> {
    if heap.list_length(args) != 1 {
        return Err(heap.make_error(&format!("{who} -- Expected one operand")));
    }
    match as_num(heap, heap.car(args)) {
        Some(n) => Ok(n),
        None => Err(heap.make_error(&format!("{who} -- Expected number"))),
    }
}

/* ARITHMETIC */

fn prim_add(args: Handle, st: &mut State) -> Handle {
    let heap = &mut st.heap;
    let mut int_sum: i64 = 0;
    let mut dec_sum: f64 = 0.0;
    let mut cursor = args;
    while cursor.is_some() {
        match as_num(heap, heap.car(cursor)) {
            Some(Num::Int(i)) => int_sum = int_sum.wrapping_add(i),
            Some(Num::Dec(d)) => dec_sum += d,
            None => return heap.make_error("+ -- Expected number"),
        }
        cursor = heap.cdr(cursor);
    }
    if dec_sum == 0.0 {
        return heap.make_int(int_sum);
    }
    numeric_result(heap, dec_sum + int_sum as f64)
}

fn prim_mul(args: Handle, st: &mut State) -> Handle {
    let heap = &mut st.heap;
    let mut int_prod: i64 = 1;
    let mut dec_prod: f64 = 1.0;
    let mut cursor = args;
    while cursor.is_some() {
        match as_num(heap, heap.car(cursor)) {
            Some(Num::Int(i)) => int_prod = int_prod.wrapping_mul(i),
            Some(Num::Dec(d)) => dec_prod *= d,
            None => return heap.make_error("* -- Expected number"),
        }
        cursor = heap.cdr(cursor);
    }
    if dec_prod == 1.0 {
        return heap.make_int(int_prod);
    }
    numeric_result(heap, dec_prod * int_prod as f64)
}

fn prim_sub(args: Handle, st: &mut State) -> Handle {
    let heap = &mut st.heap;
    if args.is_none() {
        return heap.make_error("- -- No operands");
    }
    let first = match as_num(heap, heap.car(args)) {
        Some(n) => n,
        None => return heap.make_error("- -- Expected number"),
    };

    let mut cursor = heap.cdr(args);
    if cursor.is_none() {
        // unary minus
        return match first {
            Num::Int(i) => heap.make_int(-i),
            Num::Dec(d) => heap.make_decimal(-d),
        };
    }

    let mut exact = matches!(first, Num::Int(_));
    let mut int_acc: i64 = 0;
    let mut dec_acc: f64 = 0.0;
    while cursor.is_some() {
        match as_num(heap, heap.car(cursor)) {
            Some(Num::Int(i)) => int_acc = int_acc.wrapping_add(i),
            Some(Num::Dec(d)) => {
                exact = false;
                dec_acc += d;
            }
            None => return heap.make_error("- -- Expected number"),
        }
        cursor = heap.cdr(cursor);
    }

    if exact {
        if let Num::Int(i) = first {
            return heap.make_int(i.wrapping_sub(int_acc));
        }
    }
    numeric_result(heap, first.as_f64() - dec_acc - int_acc as f64)
}

fn prim_div(args: Handle, st: &mut State) -> Handle {
    let heap = &mut st.heap;
    if args.is_none() {
        return heap.make_error("/ -- No operands");
    }
    let first = match as_num(heap, heap.car(args)) {
        Some(n) => n.as_f64(),
        None => return heap.make_error("/ -- Expected number"),
    };

    let mut cursor = heap.cdr(args);
    if cursor.is_none() {
        if first == 0.0 {
            return heap.make_error("/ -- Division by zero");
        }
        return numeric_result(heap, 1.0 / first);
    }

    let mut divisor: f64 = 1.0;
    while cursor.is_some() {
        match as_num(heap, heap.car(cursor)) {
            Some(n) => divisor *= n.as_f64(),
            None => return heap.make_error("/ -- Expected number"),
        }
        cursor = heap.cdr(cursor);
    }
    if divisor == 0.0 {
        return heap.make_error("/ -- Division by zero");
    }
    numeric_result(heap, first / divisor)
}

/* COMPARISONS */

fn prim_num_eq(args: Handle, st: &mut State) -> Handle {
    let heap = &mut st.heap;
    match two_numbers(heap, args, "=") {
        Err(error) => error,
        Ok((a, b)) => {
            let truth = match (a, b) {
                (Num::Int(x), Num::Int(y)) => x == y,
                _ => a.as_f64() == b.as_f64(),
            };
            heap.make_bool(truth)
        }
    }
}

fn prim_less(args: Handle, st: &mut State) -> Handle {
    let heap = &mut st.heap;
    match two_numbers(heap, args, "<") {
        Err(error) => error,
        Ok((a, b)) => {
            let truth = match (a, b) {
                (Num::Int(x), Num::Int(y)) => x < y,
                _ => a.as_f64() < b.as_f64(),
            };
            heap.make_bool(truth)
        }
    }
}

fn prim_more(args: Handle, st: &mut State) -> Handle {
    let heap = &mut st.heap;
    match two_numbers(heap, args, ">") {
        Err(error) => error,
        Ok((a, b)) => {
            let truth = match (a, b) {
                (Num::Int(x), Num::Int(y)) => x > y,
                _ => a.as_f64() > b.as_f64(),
            };
            heap.make_bool(truth)
        }
    }
}

/* BOOLEANS */

fn prim_or(args: Handle, st: &mut State) -> Handle {
    let heap = &mut st.heap;
    let mut cursor = args;
    while cursor.is_some() {
        if heap.symbol_is(heap.car(cursor), "#t") {
            return heap.make_bool(true);
        }
        cursor = heap.cdr(cursor);
    }
    heap.make_bool(false)
}

fn prim_and(args: Handle, st: &mut State) -> Handle {
    let heap = &mut st.heap;
    let mut cursor = args;
    while cursor.is_some() {
        if heap.symbol_is(heap.car(cursor), "#f") {
            return heap.make_bool(false);
        }
        cursor = heap.cdr(cursor);
    }
    heap.make_bool(true)
}

fn prim_not(args: Handle, st: &mut State) -> Handle {
    let heap = &mut st.heap;
    if heap.list_length(args) != 1 {
        return heap.make_error("NOT -- Expected one operand");
    }
    let arg = heap.car(args);
    if arg.is_none() {
        return heap.make_error("NOT -- Expected boolean");
    }
    let truth = heap.symbol_is(arg, "#f");
    heap.make_bool(truth)
}

/* ROUNDING */

fn prim_floor(args: Handle, st: &mut State) -> Handle {
    let heap = &mut st.heap;
    match one_number(heap, args, "FLOOR") {
        Err(error) => error,
        Ok(Num::Int(i)) => heap.make_int(i),
        Ok(Num::Dec(d)) => heap.make_int(d.floor() as i64),
    }
}

fn prim_ceiling(args: Handle, st: &mut State) -> Handle {
    let heap = &mut st.heap;
    match one_number(heap, args, "CEILING") {
        Err(error) => error,
        Ok(Num::Int(i)) => heap.make_int(i),
        Ok(Num::Dec(d)) => heap.make_int(d.ceil() as i64),
    }
}

fn prim_truncate(args: Handle, st: &mut State) -> Handle {
    let heap = &mut st.heap;
    match one_number(heap, args, "TRUNCATE") {
        Err(error) => error,
        Ok(Num::Int(i)) => heap.make_int(i),
        Ok(Num::Dec(d)) => heap.make_int(d.trunc() as i64),
    }
}

/// Round half-to-even at the .5 boundary.
fn prim_round(args: Handle, st: &mut State) -> Handle {
    let heap = &mut st.heap;
    match one_number(heap, args, "ROUND") {
        Err(error) => error,
        Ok(Num::Int(i)) => heap.make_int(i),
        Ok(Num::Dec(d)) => {
            let fraction = d - d.floor();
            let down = d.floor() as i64;
            let value = if fraction < 0.5 {
                down
            } else if fraction > 0.5 {
                down + 1
            } else if down % 2 != 0 {
                down + 1
            } else {
                down
            };
            heap.make_int(value)
        }
    }
}

fn prim_max(args: Handle, st: &mut State) -> Handle {
    let heap = &mut st.heap;
    if args.is_none() {
        return heap.make_error("MAX -- No operands");
    }
    let mut best: Option<(Handle, f64)> = None;
    let mut cursor = args;
    while cursor.is_some() {
        let head = heap.car(cursor);
        let Some(n) = as_num(heap, head) else {
            return heap.make_error("MAX -- Expected number");
        };
        let value = n.as_f64();
        if best.map_or(true, |(_, current)| value > current) {
            best = Some((head, value));
        }
        cursor = heap.cdr(cursor);
    }
    match best {
        Some((winner, _)) => winner,
        None => None,
    }
}

fn prim_min(args: Handle, st: &mut State) -> Handle {
    let heap = &mut st.heap;
    if args.is_none() {
        return heap.make_error("MIN -- No operands");
    }
    let mut best: Option<(Handle, f64)> = None;
    let mut cursor = args;
    while cursor.is_some() {
        let head = heap.car(cursor);
        let Some(n) = as_num(heap, head) else {
            return heap.make_error("MIN -- Expected number");
        };
        let value = n.as_f64();
        if best.map_or(true, |(_, current)| value < current) {
            best = Some((head, value));
        }
        cursor = heap.cdr(cursor);
    }
    match best {
        Some((winner, _)) => winner,
        None => None,
    }
}

/* LISTS */

fn prim_eq(args: Handle, st: &mut State) -> Handle {
    let heap = &mut st.heap;
    if heap.list_length(args) != 2 {
        return heap.make_error("EQ? -- No operands");
    }
    let first = heap.car(args);
    let second = heap.cadr(args);
    let truth = heap.is_equal(first, second);
    heap.make_bool(truth)
}

fn prim_car(args: Handle, st: &mut State) -> Handle {
    let heap = &mut st.heap;
    if heap.list_length(args) != 1 {
        return heap.make_error("CAR -- Expected one operand");
    }
    heap.car(heap.car(args))
}

fn prim_cdr(args: Handle, st: &mut State) -> Handle {
    let heap = &mut st.heap;
    if heap.list_length(args) != 1 {
        return heap.make_error("CDR -- Expected one operand");
    }
    heap.cdr(heap.car(args))
}

fn prim_cons(args: Handle, st: &mut State) -> Handle {
    let heap = &mut st.heap;
    if heap.list_length(args) != 2 {
        return heap.make_error("CONS -- Expected two operands");
    }
    let left = heap.car(args);
    let right = heap.cadr(args);
    heap.cons(left, right)
}

fn prim_list(args: Handle, st: &mut State) -> Handle {
    let heap = &mut st.heap;
    // fresh spine, shared elements
    let mut items: Vec<Handle> = Vec::new();
    let mut cursor = args;
    while cursor.is_some() {
        items.push(heap.car(cursor));
        cursor = heap.cdr(cursor);
    }
    let mut out: Handle = None;
    for item in items.into_iter().rev() {
        out = heap.cons(item, out);
    }
    out
}

fn prim_set_car(args: Handle, st: &mut State) -> Handle {
    let heap = &mut st.heap;
    if heap.list_length(args) != 2 {
        return heap.make_error("SET-CAR -- Expected two operands");
    }
    let target = heap.car(args);
    if !matches!(heap.get(target), Some(ValueCell::Pair(..))) {
        return heap.make_error("SET-CAR -- Expected pair");
    }
    let value = heap.cadr(args);
    heap.set_car(target, value);
    target
}

fn prim_set_cdr(args: Handle, st: &mut State) -> Handle {
    let heap = &mut st.heap;
    if heap.list_length(args) != 2 {
        return heap.make_error("SET-CDR -- Expected two operands");
    }
    let target = heap.car(args);
    if !matches!(heap.get(target), Some(ValueCell::Pair(..))) {
        return heap.make_error("SET-CDR -- Expected pair");
    }
    let value = heap.cadr(args);
    heap.set_cdr(target, value);
    target
}

/* TYPE PREDICATES AND CONVERSIONS */

fn prim_sym_to_str(args: Handle, st: &mut State) -> Handle {
    let heap = &mut st.heap;
    if heap.list_length(args) != 1 {
        return heap.make_error("SYMBOL->STRING -- Expected one operand");
    }
    match heap.symbol_text(heap.car(args)).map(str::to_string) {
        Some(text) => heap.make_string(&text),
        None => heap.make_error("SYMBOL->STRING -- Expected symbol"),
    }
}

fn prim_str_to_sym(args: Handle, st: &mut State) -> Handle {
    let heap = &mut st.heap;
    if heap.list_length(args) != 1 {
        return heap.make_error("STRING->SYMBOL -- Expected string");
    }
    let text = match heap.get(heap.car(args)) {
        Some(ValueCell::Str(s)) => s.clone(),
        _ => return heap.make_error("STRING->SYMBOL -- Expected string"),
    };
    heap.make_symbol(&text)
}

fn type_predicate(args: Handle, heap: &mut Heap, pred: fn(&ValueCell) -> bool) -> Handle {
    if heap.list_length(args) != 1 {
        return heap.make_error("IS-TYPE -- Expected one operand");
    }
    let truth = heap.get(heap.car(args)).is_some_and(pred);
    heap.make_bool(truth)
}

fn prim_is_num(args: Handle, st: &mut State) -> Handle {
    type_predicate(args, &mut st.heap, |cell| {
        matches!(cell, ValueCell::Integer(_) | ValueCell::Decimal(_))
    })
}

fn prim_is_int(args: Handle, st: &mut State) -> Handle {
    type_predicate(args, &mut st.heap, |cell| {
        matches!(cell, ValueCell::Integer(_))
    })
}

fn prim_is_sym(args: Handle, st: &mut State) -> Handle {
    type_predicate(args, &mut st.heap, |cell| matches!(cell, ValueCell::Symbol(_)))
}

fn prim_is_str(args: Handle, st: &mut State) -> Handle {
    type_predicate(args, &mut st.heap, |cell| matches!(cell, ValueCell::Str(_)))
}

fn prim_is_pair(args: Handle, st: &mut State) -> Handle {
    type_predicate(args, &mut st.heap, |cell| matches!(cell, ValueCell::Pair(..)))
}

fn prim_is_proc(args: Handle, st: &mut State) -> Handle {
    let heap = &mut st.heap;
    if heap.list_length(args) != 1 {
        return heap.make_error("IS-PROC -- Expected one operand");
    }
    let arg = heap.car(args);
    let truth = heap.tagged_with(arg, "closure") || heap.tagged_with(arg, "primitive");
    heap.make_bool(truth)
}

/* NUMBER THEORY */

// reduces over magnitudes; the result is always non-negative
fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

fn lcm(a: i64, b: i64) -> i64 {
    let g = gcd(a, b);
    if g == 0 {
        return 0;
    }
    (a / g).wrapping_mul(b).abs()
}

/// Reduce an integer list with `f`; the empty list reduces to 0.
fn int_fold(args: Handle, heap: &mut Heap, who: &str, f: fn(i64, i64) -> i64) -> Handle {
    if args.is_none() {
        return heap.make_int(0);
    }
    let mut acc = match heap.get(heap.car(args)) {
        Some(ValueCell::Integer(i)) => *i,
        _ => return heap.make_error(&format!("{who} -- Expected integer")),
    };
    let mut cursor = heap.cdr(args);
    while cursor.is_some() {
        match heap.get(heap.car(cursor)) {
            Some(ValueCell::Integer(i)) => acc = f(acc, *i),
            _ => return heap.make_error(&format!("{who} -- Expected integer")),
        }
        cursor = heap.cdr(cursor);
    }
    heap.make_int(acc)
}

fn prim_gcd(args: Handle, st: &mut State) -> Handle {
    int_fold(args, &mut st.heap, "GCD", gcd)
}

fn prim_lcm(args: Handle, st: &mut State) -> Handle {
    int_fold(args, &mut st.heap, "LCM", lcm)
}

/* TRANSCENDENTALS */

fn math_fn(args: Handle, heap: &mut Heap, f: fn(f64) -> f64) -> Handle {
    if heap.list_length(args) != 1 {
        return heap.make_error("MATHFN -- Expected one operand");
    }
    match as_num(heap, heap.car(args)) {
        Some(n) => heap.make_decimal(f(n.as_f64())),
        None => heap.make_error("MATHFN -- Expected number"),
    }
}

fn prim_sin(args: Handle, st: &mut State) -> Handle {
    math_fn(args, &mut st.heap, f64::sin)
}

fn prim_cos(args: Handle, st: &mut State) -> Handle {
    math_fn(args, &mut st.heap, f64::cos)
}

fn prim_tan(args: Handle, st: &mut State) -> Handle {
    math_fn(args, &mut st.heap, f64::tan)
}

fn prim_asin(args: Handle, st: &mut State) -> Handle {
    math_fn(args, &mut st.heap, f64::asin)
}

fn prim_acos(args: Handle, st: &mut State) -> Handle {
    math_fn(args, &mut st.heap, f64::acos)
}

fn prim_atan(args: Handle, st: &mut State) -> Handle {
    math_fn(args, &mut st.heap, f64::atan)
}

fn prim_log(args: Handle, st: &mut State) -> Handle {
    math_fn(args, &mut st.heap, f64::ln)
}

fn prim_exp(args: Handle, st: &mut State) -> Handle {
    math_fn(args, &mut st.heap, f64::exp)
}

fn prim_expt(args: Handle, st: &mut State) -> Handle {
    let heap = &mut st.heap;
    match two_numbers(heap, args, "EXPT") {
        Err(error) => error,
        Ok((base, exponent)) => heap.make_decimal(base.as_f64().powf(exponent.as_f64())),
    }
}

/* CVAR REFLECTION */

fn prim_set_cvar(args: Handle, st: &mut State) -> Handle {
    if st.heap.list_length(args) != 2 {
        return st.heap.make_error("SET-CVAR -- Expected two operands");
    }
    let Some(name) = st.heap.symbol_text(st.heap.car(args)).map(str::to_string) else {
        return st.heap.make_error("SET-CVAR -- Expected identifier");
    };
    let value = match st.heap.get(st.heap.cadr(args)) {
        Some(ValueCell::Integer(i)) => *i,
        _ => return st.heap.make_error("SET-CVAR -- Expected integer"),
    };

    let entry = st.cvars.get(&name).cloned();
    match entry {
        None => st.heap.make_error("SET-CVAR -- Unknown CVAR"),
        Some(entry) => {
            if entry.access == CvarAccess::ReadOnly {
                return st.heap.make_error("SET-CVAR -- Read only");
            }
            st.set_cvar_value(&entry, value);
            st.heap.make_symbol("ok")
        }
    }
}

fn prim_get_cvar(args: Handle, st: &mut State) -> Handle {
    if st.heap.list_length(args) != 1 {
        return st.heap.make_error("GET-CVAR -- Expected one operand");
    }
    let Some(name) = st.heap.symbol_text(st.heap.car(args)).map(str::to_string) else {
        return st.heap.make_error("GET-CVAR -- Expected identifier");
    };

    let entry = st.cvars.get(&name).cloned();
    match entry {
        None => st.heap.make_error("GET-CVAR -- Unknown CVAR"),
        Some(entry) => {
            let value = st.cvar_value(&entry);
            st.heap.make_int(value)
        }
    }
}

/// Register the canonical primitive set on a freshly created context.
pub(crate) fn register(ctx: &Context) {
    ctx.add_prim_proc("+", prim_add);
    ctx.add_prim_proc("*", prim_mul);
    ctx.add_prim_proc("-", prim_sub);
    ctx.add_prim_proc("/", prim_div);
    ctx.add_prim_proc("=", prim_num_eq);
    ctx.add_prim_proc("<", prim_less);
    ctx.add_prim_proc(">", prim_more);
    ctx.add_prim_proc("or", prim_or);
    ctx.add_prim_proc("and", prim_and);
    ctx.add_prim_proc("not", prim_not);
    ctx.add_prim_proc("floor", prim_floor);
    ctx.add_prim_proc("ceiling", prim_ceiling);
    ctx.add_prim_proc("truncate", prim_truncate);
    ctx.add_prim_proc("round", prim_round);
    ctx.add_prim_proc("max", prim_max);
    ctx.add_prim_proc("min", prim_min);
    ctx.add_prim_proc("eq?", prim_eq);
    ctx.add_prim_proc("car", prim_car);
    ctx.add_prim_proc("cdr", prim_cdr);
    ctx.add_prim_proc("set-car!", prim_set_car);
    ctx.add_prim_proc("set-cdr!", prim_set_cdr);
    ctx.add_prim_proc("cons", prim_cons);
    ctx.add_prim_proc("list", prim_list);
    ctx.add_prim_proc("number?", prim_is_num);
    ctx.add_prim_proc("real?", prim_is_num);
    ctx.add_prim_proc("integer?", prim_is_int);
    ctx.add_prim_proc("procedure?", prim_is_proc);
    ctx.add_prim_proc("symbol->string", prim_sym_to_str);
    ctx.add_prim_proc("string->symbol", prim_str_to_sym);
    ctx.add_prim_proc("symbol?", prim_is_sym);
    ctx.add_prim_proc("string?", prim_is_str);
    ctx.add_prim_proc("pair?", prim_is_pair);
    ctx.add_prim_proc("gcd", prim_gcd);
    ctx.add_prim_proc("lcm", prim_lcm);

    ctx.add_prim_proc("sin", prim_sin);
    ctx.add_prim_proc("cos", prim_cos);
    ctx.add_prim_proc("tan", prim_tan);
    ctx.add_prim_proc("asin", prim_asin);
    ctx.add_prim_proc("acos", prim_acos);
    ctx.add_prim_proc("atan", prim_atan);
    ctx.add_prim_proc("log", prim_log);
    ctx.add_prim_proc("exp", prim_exp);
    ctx.add_prim_proc("expt", prim_expt);

    ctx.add_prim_proc("set-cvar!", prim_set_cvar);
    ctx.add_prim_proc("get-cvar", prim_get_cvar);
}

#[cfg(test)]
mod tests {
    use crate::setup::{make_context, setup_environment};
    use crate::worker;
    use slip_core::{Context, ContextConfig};
    use std::sync::Arc;

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
    fn test_arithmetic_promotion() {
        let ctx = interp();
        assert_eq!(eval_to_string(&ctx, "(+ 1 2 3)"), "6");
        assert_eq!(eval_to_string(&ctx, "(+ 1 0.5)"), "1.5");
        // a decimal result that equals its floor comes back integral
        assert_eq!(eval_to_string(&ctx, "(+ 1.5 0.5)"), "2");
        assert_eq!(eval_to_string(&ctx, "(* 2 0.5)"), "1");
        assert_eq!(eval_to_string(&ctx, "(* 2 3 4)"), "24");
        assert_eq!(eval_to_string(&ctx, "(- 10 4)"), "6");
        assert_eq!(eval_to_string(&ctx, "(- 5)"), "-5");
        assert_eq!(eval_to_string(&ctx, "(- 10 2.5)"), "7.5");
        assert_eq!(eval_to_string(&ctx, "(/ 8 2)"), "4");
        assert_eq!(eval_to_string(&ctx, "(/ 1 4)"), "0.25");
        assert_eq!(eval_to_string(&ctx, "(+ 'a 1)"), "ERROR: '+ -- Expected number'");
    }

    #[test]
    fn test_division_by_zero() {
        let ctx = interp();
        assert_eq!(
            eval_to_string(&ctx, "(/ 4 0)"),
            "ERROR: '/ -- Division by zero'"
        );
    }

    #[test]
    fn test_comparisons() {
        let ctx = interp();
        assert_eq!(eval_to_string(&ctx, "(= 2 2)"), "#t");
        assert_eq!(eval_to_string(&ctx, "(= 2 3)"), "#f");
        assert_eq!(eval_to_string(&ctx, "(= 2 2.0)"), "#t");
        assert_eq!(eval_to_string(&ctx, "(< 1 2)"), "#t");
        assert_eq!(eval_to_string(&ctx, "(< 2.5 2)"), "#f");
        assert_eq!(eval_to_string(&ctx, "(> 3 2)"), "#t");
        assert_eq!(
            eval_to_string(&ctx, "(< 1 2 3)"),
            "ERROR: '< -- Expected two operands'"
        );
    }

    #[test]
    fn test_booleans() {
        let ctx = interp();
        assert_eq!(eval_to_string(&ctx, "(and '#t '#t)"), "#t");
        assert_eq!(eval_to_string(&ctx, "(and '#t '#f)"), "#f");
        assert_eq!(eval_to_string(&ctx, "(or '#f '#f)"), "#f");
        assert_eq!(eval_to_string(&ctx, "(or '#f '#t)"), "#t");
        assert_eq!(eval_to_string(&ctx, "(not '#f)"), "#t");
        assert_eq!(eval_to_string(&ctx, "(not '#t)"), "#f");
    }

    #[test]
    fn test_rounding_family() {
        let ctx = interp();
        assert_eq!(eval_to_string(&ctx, "(floor 2.7)"), "2");
        assert_eq!(eval_to_string(&ctx, "(floor -2.7)"), "-3");
        assert_eq!(eval_to_string(&ctx, "(ceiling 2.1)"), "3");
        assert_eq!(eval_to_string(&ctx, "(truncate 2.9)"), "2");
        assert_eq!(eval_to_string(&ctx, "(truncate -2.9)"), "-2");
        assert_eq!(eval_to_string(&ctx, "(round 2.4)"), "2");
        assert_eq!(eval_to_string(&ctx, "(round 2.6)"), "3");
        // banker's rounding at the .5 boundary
        assert_eq!(eval_to_string(&ctx, "(round 2.5)"), "2");
        assert_eq!(eval_to_string(&ctx, "(round 3.5)"), "4");
        assert_eq!(eval_to_string(&ctx, "(round 7)"), "7");
    }

    #[test]
    fn test_max_min() {
        let ctx = interp();
        assert_eq!(eval_to_string(&ctx, "(max 1 7 3)"), "7");
        assert_eq!(eval_to_string(&ctx, "(max -5 -3)"), "-3");
        assert_eq!(eval_to_string(&ctx, "(max 1 2.5)"), "2.5");
        assert_eq!(eval_to_string(&ctx, "(min 4 2 8)"), "2");
        assert_eq!(eval_to_string(&ctx, "(min -1 3)"), "-1");
        assert_eq!(eval_to_string(&ctx, "(max)"), "ERROR: 'MAX -- No operands'");
    }

    #[test]
    fn test_list_primitives() {
        let ctx = interp();
        assert_eq!(eval_to_string(&ctx, "(cons 1 2)"), "(1 . 2)");
        assert_eq!(eval_to_string(&ctx, "(car '(1 2 3))"), "1");
        assert_eq!(eval_to_string(&ctx, "(cdr '(1 2 3))"), "(2 3)");
        assert_eq!(eval_to_string(&ctx, "(list 1 2 3)"), "(1 2 3)");
        assert_eq!(eval_to_string(&ctx, "(list)"), "()");
        // car/cdr of a non-pair are absent, not errors
        assert_eq!(eval_to_string(&ctx, "(car 5)"), "()");
        assert_eq!(eval_to_string(&ctx, "(cdr 5)"), "()");
    }

    #[test]
    fn test_set_car_set_cdr() {
        let ctx = interp();
        eval_to_string(&ctx, "(define p (cons 1 2))");
        assert_eq!(eval_to_string(&ctx, "(set-car! p 9)"), "(9 . 2)");
        assert_eq!(eval_to_string(&ctx, "(set-cdr! p 8)"), "(9 . 8)");
        assert_eq!(
            eval_to_string(&ctx, "(set-car! 5 1)"),
            "ERROR: 'SET-CAR -- Expected pair'"
        );
    }

    #[test]
    fn test_predicates() {
        let ctx = interp();
        assert_eq!(eval_to_string(&ctx, "(number? 4)"), "#t");
        assert_eq!(eval_to_string(&ctx, "(number? 4.5)"), "#t");
        assert_eq!(eval_to_string(&ctx, "(number? 'x)"), "#f");
        assert_eq!(eval_to_string(&ctx, "(integer? 4)"), "#t");
        assert_eq!(eval_to_string(&ctx, "(integer? 4.5)"), "#f");
        assert_eq!(eval_to_string(&ctx, "(symbol? 'x)"), "#t");
        assert_eq!(eval_to_string(&ctx, "(string? \"x\")"), "#t");
        assert_eq!(eval_to_string(&ctx, "(pair? '(1))"), "#t");
        assert_eq!(eval_to_string(&ctx, "(pair? 1)"), "#f");
        assert_eq!(eval_to_string(&ctx, "(procedure? car)"), "#t");
        assert_eq!(eval_to_string(&ctx, "(procedure? (lambda (x) x))"), "#t");
        assert_eq!(eval_to_string(&ctx, "(procedure? 1)"), "#f");
    }

    #[test]
    fn test_symbol_string_conversion() {
        let ctx = interp();
        assert_eq!(eval_to_string(&ctx, "(symbol->string 'abc)"), "\"abc\"");
        assert_eq!(eval_to_string(&ctx, "(string->symbol \"abc\")"), "abc");
        assert_eq!(
            eval_to_string(&ctx, "(symbol->string 4)"),
            "ERROR: 'SYMBOL->STRING -- Expected symbol'"
        );
    }

    #[test]
    fn test_gcd_lcm() {
        let ctx = interp();
        assert_eq!(eval_to_string(&ctx, "(gcd 12 18)"), "6");
        assert_eq!(eval_to_string(&ctx, "(gcd 12 18 8)"), "2");
        assert_eq!(eval_to_string(&ctx, "(lcm 4 6)"), "12");
        assert_eq!(eval_to_string(&ctx, "(lcm 3 5 7)"), "105");
        assert_eq!(eval_to_string(&ctx, "(gcd)"), "0");
        // negative operands reduce over their magnitudes
        assert_eq!(eval_to_string(&ctx, "(gcd -12 18)"), "6");
        assert_eq!(eval_to_string(&ctx, "(gcd -12 -18)"), "6");
        assert_eq!(eval_to_string(&ctx, "(lcm -4 6)"), "12");
    }

    #[test]
    fn test_transcendentals() {
        let ctx = interp();
        assert_eq!(eval_to_string(&ctx, "(sin 0)"), "0");
        assert_eq!(eval_to_string(&ctx, "(cos 0)"), "1");
        assert_eq!(eval_to_string(&ctx, "(exp 0)"), "1");
        assert_eq!(eval_to_string(&ctx, "(log 1)"), "0");
        assert_eq!(eval_to_string(&ctx, "(expt 2 10)"), "1024");
        assert_eq!(eval_to_string(&ctx, "(atan 0)"), "0");
    }

    #[test]
    fn test_cvar_reflection() {
        let ctx = interp();
        // read-only gauges
        assert_eq!(
            eval_to_string(&ctx, "(get-cvar 'mem_lim_hard)"),
            (1024 * 1024).to_string()
        );
        assert_eq!(
            eval_to_string(&ctx, "(set-cvar! 'mem_lim_hard 1)"),
            "ERROR: 'SET-CVAR -- Read only'"
        );
        // read-write timeout
        assert_eq!(eval_to_string(&ctx, "(get-cvar 'thread_timeout)"), "10");
        assert_eq!(eval_to_string(&ctx, "(set-cvar! 'thread_timeout 20)"), "ok");
        assert_eq!(eval_to_string(&ctx, "(get-cvar 'thread_timeout)"), "20");
        // unknown names are errors
        assert_eq!(
            eval_to_string(&ctx, "(get-cvar 'nope)"),
            "ERROR: 'GET-CVAR -- Unknown CVAR'"
        );
        assert_eq!(
            eval_to_string(&ctx, "(set-cvar! 'nope 1)"),
            "ERROR: 'SET-CVAR -- Unknown CVAR'"
        );
    }
}
