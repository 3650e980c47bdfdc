//! The printer: values back to text.
//!
//! Rendering rules: integers print in full, decimals print the way C's
//! `%g` would (six significant digits, trailing zeros stripped,
//! scientific notation outside the fixed range), strings print quoted,
//! symbols print raw. Pairs print as `(head tail...)` with a dotted
//! tail where the value is not a list. Closures and primitive objects
//! print as `<proc>`, the global environment as `<env>`, and Error
//! values as `ERROR: '...'`.

use std::fmt::{self, Write};

use slip_core::{Handle, Heap, ValueCell};

/// Render `value` to a fresh string.
pub fn print_value(heap: &Heap, global_env: Handle, value: Handle) -> String {
    let mut out = String::new();
    // writing into a String cannot fail
    let _ = write_value(&mut out, heap, global_env, value);
    out
}

/// Render `value` into any `fmt::Write` sink.
pub fn write_value<W: Write>(
    out: &mut W,
    heap: &Heap,
    global_env: Handle,
    value: Handle,
) -> fmt::Result {
    write_rec(out, heap, global_env, value, true)
}

fn write_rec<W: Write>(
    out: &mut W,
    heap: &Heap,
    root: Handle,
    value: Handle,
    parens: bool,
) -> fmt::Result {
    let Some(id) = value else {
        return out.write_str("()");
    };
    if root.is_some() && value == root {
        return out.write_str("<env>");
    }
    match heap.cell(id) {
        // a handle from another context or a stale one; nothing to show
        None => out.write_str("()"),
        Some(ValueCell::Integer(n)) => write!(out, "{n}"),
        Some(ValueCell::Decimal(d)) => out.write_str(&format_g(*d)),
        Some(ValueCell::Symbol(s)) => out.write_str(s),
        Some(ValueCell::Str(s)) => write!(out, "\"{s}\""),
        Some(ValueCell::Error(message)) => write!(out, "ERROR: '{message}'"),
        Some(ValueCell::Primitive(_)) => out.write_str("<proc>"),
        Some(ValueCell::Pair(..)) => {
            if heap.tagged_with(value, "closure") || heap.tagged_with(value, "primitive") {
                return out.write_str("<proc>");
            }
            if parens {
                out.write_str("(")?;
            }
            let mut cursor = value;
            loop {
                write_rec(out, heap, root, heap.car(cursor), true)?;
                let tail = heap.cdr(cursor);
                if tail.is_none() {
                    break;
                }
                if !matches!(heap.get(tail), Some(ValueCell::Pair(..))) {
                    out.write_str(" . ")?;
                    write_rec(out, heap, root, tail, true)?;
                    break;
                }
                out.write_str(" ")?;
                if tail == root
                    || heap.tagged_with(tail, "closure")
                    || heap.tagged_with(tail, "primitive")
                {
                    write_rec(out, heap, root, tail, true)?;
                    break;
                }
                cursor = tail;
            }
            if parens {
                out.write_str(")")?;
            }
            Ok(())
        }
    }
}

/// `%g`-style rendering: six significant digits, trailing zeros
/// stripped, scientific notation when the exponent leaves [-4, 6).
fn format_g(x: f64) -> String {
    if x == 0.0 {
        return "0".to_string();
    }
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x < 0.0 { "-inf" } else { "inf" }.to_string();
    }

    // exponent after rounding to six significant digits
    let sci = format!("{x:.5e}");
    let exponent: i32 = sci
        .split('e')
        .nth(1)
        .and_then(|e| e.parse().ok())
        .unwrap_or(0);

    if exponent < -4 || exponent >= 6 {
        let mantissa = sci.split('e').next().unwrap_or("0");
        let mantissa = trim_trailing_zeros(mantissa);
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exponent.abs())
    } else {
        let decimals = (5 - exponent).max(0) as usize;
        let fixed = format!("{x:.decimals$}");
        trim_trailing_zeros(&fixed).to_string()
    }
}

fn trim_trailing_zeros(text: &str) -> &str {
    if !text.contains('.') {
        return text;
    }
    text.trim_end_matches('0').trim_end_matches('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read;
    use slip_core::{Context, ContextConfig};

    fn ctx() -> Context {
        Context::new(ContextConfig::new(64 * 1024, 128 * 1024, false, 0)).expect("context")
    }

    #[test]
    fn test_atoms() {
        let ctx = ctx();
        let mut st = ctx.lock_state();
        let n = st.heap.make_int(-42);
        assert_eq!(print_value(&st.heap, None, n), "-42");
        let s = st.heap.make_string("hi");
        assert_eq!(print_value(&st.heap, None, s), "\"hi\"");
        let sym = st.heap.make_symbol("foo!");
        assert_eq!(print_value(&st.heap, None, sym), "foo!");
        let err = st.heap.make_error("LOOKUP -- Unbound variable");
        assert_eq!(
            print_value(&st.heap, None, err),
            "ERROR: 'LOOKUP -- Unbound variable'"
        );
        assert_eq!(print_value(&st.heap, None, None), "()");
    }

    #[test]
    fn test_format_g_cases() {
        assert_eq!(format_g(5.0), "5");
        assert_eq!(format_g(5.000000000053722), "5");
        assert_eq!(format_g(0.1), "0.1");
        assert_eq!(format_g(2.5), "2.5");
        assert_eq!(format_g(-0.5), "-0.5");
        assert_eq!(format_g(12.125), "12.125");
        assert_eq!(format_g(123456.0), "123456");
        assert_eq!(format_g(1234567.0), "1.23457e+06");
        assert_eq!(format_g(1e30), "1e+30");
        assert_eq!(format_g(0.00001), "1e-05");
        assert_eq!(format_g(0.0001), "0.0001");
        assert_eq!(format_g(0.0), "0");
    }

    #[test]
    fn test_lists() {
        let ctx = ctx();
        let mut st = ctx.lock_state();
        let v = read("(1 (2 3) x)", &mut st.heap).expect("read").value;
        assert_eq!(print_value(&st.heap, None, v), "(1 (2 3) x)");
    }

    #[test]
    fn test_dotted_pair() {
        let ctx = ctx();
        let mut st = ctx.lock_state();
        let one = st.heap.make_int(1);
        let two = st.heap.make_int(2);
        let pair = st.heap.cons(one, two);
        assert_eq!(print_value(&st.heap, None, pair), "(1 . 2)");

        let three = st.heap.make_int(3);
        let improper = st.heap.cons(three, pair);
        assert_eq!(print_value(&st.heap, None, improper), "(3 1 . 2)");
    }

    #[test]
    fn test_procedures_and_env() {
        let ctx = ctx();
        let mut st = ctx.lock_state();
        let tag = st.heap.make_symbol("closure");
        let closure = st.heap.cons(tag, None);
        assert_eq!(print_value(&st.heap, None, closure), "<proc>");

        let tag = st.heap.make_symbol("primitive");
        let prim_obj = st.heap.cons(tag, None);
        assert_eq!(print_value(&st.heap, None, prim_obj), "<proc>");

        let frame = st.heap.cons(None, None);
        let env = st.heap.cons(frame, None);
        assert_eq!(print_value(&st.heap, env, env), "<env>");
    }

    #[test]
    fn test_quote_prints_as_list() {
        let ctx = ctx();
        let mut st = ctx.lock_state();
        let v = read("'(1 2)", &mut st.heap).expect("read").value;
        assert_eq!(print_value(&st.heap, None, v), "(quote (1 2))");
    }

    mod roundtrip {
        use super::*;
        use proptest::prelude::*;
        use slip_core::ValueCell;

        proptest! {
            #[test]
            fn integers_roundtrip(n in any::<i64>()) {
                let ctx = ctx();
                let mut st = ctx.lock_state();
                let value = st.heap.make_int(n);
                let text = print_value(&st.heap, None, value);
                let reread = read(&text, &mut st.heap).expect("read").value;
                prop_assert!(matches!(st.heap.get(reread), Some(ValueCell::Integer(m)) if *m == n));
            }

            #[test]
            fn symbols_roundtrip(name in "[a-zA-Z!$%&*+/:<=>?@^_~][a-zA-Z0-9!$%&*+/:<=>?@^_~.-]{0,16}") {
                let ctx = ctx();
                let mut st = ctx.lock_state();
                let value = st.heap.make_symbol(&name);
                let text = print_value(&st.heap, None, value);
                let reread = read(&text, &mut st.heap).expect("read").value;
                prop_assert!(st.heap.is_equal(value, reread));
                prop_assert!(matches!(st.heap.get(reread), Some(ValueCell::Symbol(_))));
            }

            #[test]
            fn strings_roundtrip(text in "[a-zA-Z0-9 _!?.,;:+-]{0,24}") {
                let ctx = ctx();
                let mut st = ctx.lock_state();
                let value = st.heap.make_string(&text);
                let printed = print_value(&st.heap, None, value);
                let reread = read(&printed, &mut st.heap).expect("read").value;
                prop_assert!(st.heap.is_equal(value, reread));
                prop_assert!(matches!(st.heap.get(reread), Some(ValueCell::Str(_))));
            }
        }
    }
}
