//! The evaluator: expression classification, special forms, apply.
//!
//! `eval_expr` dispatches on the shape of the expression: Errors and
//! the self-evaluating atoms return unchanged, symbols are variable
//! lookups, and pairs are either one of the special forms (matched by
//! the exact symbol in operator position) or an application. The
//! derived forms `cond`, `let`, `let*` and `letrec` are rewritten into
//! kernel forms and re-entered.
//!
//! Two control details matter more than the dispatch itself:
//!
//! - Cancellation is observed as the first action of every evaluator
//!   entry, including re-entries for tail expressions. An observed
//!   request clears the flag and unwinds to the worker as `Halt`.
//! - Tail positions (the last expression of a body or `begin`, both
//!   `if` arms, the body of an applied closure) iterate in the main
//!   loop instead of recursing, so a runaway tail loop spends heap and
//!   wall clock — both of which the supervisor bounds — rather than
//!   host stack. Non-tail recursion still uses the host stack and is
//!   cut off at the configured depth with an Error value.

use slip_core::{env, Handle, Heap, State, ValueCell};

/// Abnormal termination of an evaluation; only cancellation exists.
pub(crate) enum Halt {
    Cancelled,
}

pub(crate) type Flow = Result<Handle, Halt>;

/// The dispatch decision for a pair expression.
#[derive(Clone, Copy)]
enum Form {
    Quote,
    Assignment,
    Definition,
    If,
    Lambda,
    Begin,
    Cond,
    Let,
    LetStar,
    LetRec,
    Application,
}

/// Evaluate `exp` in `env_h`, at the given non-tail nesting depth.
pub(crate) fn eval_expr(exp: Handle, env_h: Handle, st: &mut State, depth: u32) -> Flow {
    if depth > st.max_depth {
        return Ok(st.heap.make_error("EVAL -- Maximum recursion depth exceeded"));
    }

    let mut exp = exp;
    let mut env_h = env_h;
    loop {
        if st.signals().cancel_requested() {
            st.signals().clear_cancel();
            return Err(Halt::Cancelled);
        }

        let (op, operands) = match st.heap.get(exp) {
            // absent, numbers and strings are self-evaluating
            None => return Ok(exp),
            Some(ValueCell::Integer(_) | ValueCell::Decimal(_) | ValueCell::Str(_)) => {
                return Ok(exp)
            }
            // errors propagate unchanged
            Some(ValueCell::Error(_)) => return Ok(exp),
            Some(ValueCell::Symbol(_)) => return Ok(env::lookup(&mut st.heap, exp, env_h)),
            Some(ValueCell::Primitive(_)) => {
                return Ok(st.heap.make_error("EVAL -- Unknown expression type"))
            }
            Some(ValueCell::Pair(left, right)) => (*left, *right),
        };

        let form = match st.heap.symbol_text(op) {
            Some("quote") => Form::Quote,
            Some("set!") => Form::Assignment,
            Some("define") => Form::Definition,
            Some("if") => Form::If,
            Some("lambda") => Form::Lambda,
            Some("begin") => Form::Begin,
            Some("cond") => Form::Cond,
            Some("let") => Form::Let,
            Some("let*") => Form::LetStar,
            Some("letrec") => Form::LetRec,
            _ => Form::Application,
        };

        match form {
            Form::Quote => return Ok(st.heap.cadr(exp)),

            Form::Assignment => {
                let var = st.heap.cadr(exp);
                let value_exp = st.heap.caddr(exp);
                let value = eval_expr(value_exp, env_h, st, depth + 1)?;
                return Ok(env::assign(&mut st.heap, var, value, env_h));
            }

            Form::Definition => {
                let name = st.heap.cadr(exp);
                let (var, value_exp) = if matches!(st.heap.get(name), Some(ValueCell::Symbol(_))) {
                    (name, st.heap.caddr(exp))
                } else {
                    // (define (f . args) body...) = (define f (lambda args body...))
                    let params = st.heap.cdadr(exp);
                    let body = st.heap.cddr(exp);
                    let lambda = make_lambda(&mut st.heap, params, body);
                    (st.heap.caadr(exp), lambda)
                };
                let value = eval_expr(value_exp, env_h, st, depth + 1)?;
                return Ok(env::define(&mut st.heap, var, value, env_h));
            }

            Form::If => {
                let predicate_exp = st.heap.cadr(exp);
                let predicate = eval_expr(predicate_exp, env_h, st, depth + 1)?;
                // the symbol #t is the only true value
                exp = if st.heap.symbol_is(predicate, "#t") {
                    st.heap.caddr(exp)
                } else {
                    st.heap.car(st.heap.cdddr(exp))
                };
            }

            Form::Lambda => {
                let params = st.heap.cadr(exp);
                let body = st.heap.cddr(exp);
                return Ok(make_closure(&mut st.heap, params, body, env_h));
            }

            Form::Begin => {
                exp = eval_leading(operands, env_h, st, depth)?;
            }

            Form::Cond => {
                let clauses = st.heap.cdr(exp);
                exp = expand_cond_clauses(&mut st.heap, clauses);
            }

            Form::Let => {
                exp = let_to_combination(&mut st.heap, exp);
            }

            Form::LetStar => {
                exp = let_star_to_nested_lets(&mut st.heap, exp);
            }

            Form::LetRec => {
                exp = letrec_to_let(&mut st.heap, exp);
            }

            Form::Application => {
                let procedure = eval_expr(op, env_h, st, depth + 1)?;

                // operands evaluate left-to-right into a fresh list
                let mut values: Vec<Handle> = Vec::new();
                let mut rest = operands;
                while rest.is_some() {
                    let operand = st.heap.car(rest);
                    values.push(eval_expr(operand, env_h, st, depth + 1)?);
                    rest = st.heap.cdr(rest);
                }
                let mut args: Handle = None;
                for value in values.into_iter().rev() {
                    args = st.heap.cons(value, args);
                }

                // an Error argument is the application's result
                let mut scan = args;
                while scan.is_some() {
                    let arg = st.heap.car(scan);
                    if st.heap.is_error(arg) {
                        return Ok(arg);
                    }
                    scan = st.heap.cdr(scan);
                }

                if st.heap.tagged_with(procedure, "primitive") {
                    let prim_cell = st.heap.cadr(procedure);
                    let proc = match st.heap.get(prim_cell) {
                        Some(ValueCell::Primitive(proc)) => *proc,
                        _ => {
                            return Ok(st.heap.make_error("APPLY -- Unknown procedure type"));
                        }
                    };
                    return Ok(proc(args, st));
                }

                if st.heap.tagged_with(procedure, "closure") {
                    let params = st.heap.cadr(procedure);
                    let body = st.heap.caddr(procedure);
                    let captured = st.heap.car(st.heap.cdddr(procedure));
                    let extended = env::extend(&mut st.heap, params, args, captured);
                    if st.heap.is_error(extended) {
                        return Ok(extended);
                    }
                    // the closure body runs as an implicit begin; its
                    // last expression is a tail position
                    exp = eval_leading(body, extended, st, depth)?;
                    env_h = extended;
                } else {
                    return Ok(st.heap.make_error("APPLY -- Unknown procedure type"));
                }
            }
        }
    }
}

/// Evaluate every expression of `seq` but the last; return the last
/// unevaluated so the caller can run it in tail position. An empty
/// sequence yields the absent value.
fn eval_leading(seq: Handle, env_h: Handle, st: &mut State, depth: u32) -> Flow {
    let mut seq = seq;
    loop {
        if seq.is_none() {
            return Ok(None);
        }
        let rest = st.heap.cdr(seq);
        if rest.is_none() {
            return Ok(st.heap.car(seq));
        }
        let first = st.heap.car(seq);
        eval_expr(first, env_h, st, depth + 1)?;
        seq = rest;
    }
}

/// `(lambda params body...)`
fn make_lambda(heap: &mut Heap, params: Handle, body: Handle) -> Handle {
    let tail = heap.cons(params, body);
    let sym = heap.make_symbol("lambda");
    heap.cons(sym, tail)
}

/// `(closure params body... env)`
fn make_closure(heap: &mut Heap, params: Handle, body: Handle, env_h: Handle) -> Handle {
    let env_tail = heap.cons(env_h, None);
    let body_tail = heap.cons(body, env_tail);
    let params_tail = heap.cons(params, body_tail);
    let sym = heap.make_symbol("closure");
    heap.cons(sym, params_tail)
}

/// `(if predicate consequent alternative)`
fn make_if(heap: &mut Heap, predicate: Handle, consequent: Handle, alternative: Handle) -> Handle {
    let t3 = heap.cons(alternative, None);
    let t2 = heap.cons(consequent, t3);
    let t1 = heap.cons(predicate, t2);
    let sym = heap.make_symbol("if");
    heap.cons(sym, t1)
}

/// A body sequence as one expression: itself, or wrapped in `begin`.
fn sequence_to_exp(heap: &mut Heap, seq: Handle) -> Handle {
    if seq.is_none() {
        return None;
    }
    if heap.cdr(seq).is_none() {
        return heap.car(seq);
    }
    let sym = heap.make_symbol("begin");
    heap.cons(sym, seq)
}

/// Rewrite cond clauses into nested ifs. A misplaced `else` clause
/// becomes an Error value, which the re-entry then propagates.
fn expand_cond_clauses(heap: &mut Heap, clauses: Handle) -> Handle {
    if clauses.is_none() {
        return heap.make_symbol("#f");
    }
    let first = heap.car(clauses);
    let rest = heap.cdr(clauses);
    let predicate = heap.car(first);

    if heap.symbol_is(predicate, "else") {
        if rest.is_none() {
            let actions = heap.cdr(first);
            return sequence_to_exp(heap, actions);
        }
        return heap.make_error("COND-IF -- ELSE clause isn't last");
    }

    let actions = heap.cdr(first);
    let consequent = sequence_to_exp(heap, actions);
    let alternative = expand_cond_clauses(heap, rest);
    make_if(heap, predicate, consequent, alternative)
}

/// Variables of a let binding list.
fn binding_vars(heap: &mut Heap, bindings: Handle) -> Handle {
    if bindings.is_none() {
        return None;
    }
    let var = heap.caar(bindings);
    let rest_bindings = heap.cdr(bindings);
    let rest = binding_vars(heap, rest_bindings);
    heap.cons(var, rest)
}

/// Initializer expressions of a let binding list.
fn binding_exps(heap: &mut Heap, bindings: Handle) -> Handle {
    if bindings.is_none() {
        return None;
    }
    let exp = heap.cadar(bindings);
    let rest_bindings = heap.cdr(bindings);
    let rest = binding_exps(heap, rest_bindings);
    heap.cons(exp, rest)
}

/// `(let ((v e)...) body...)` = `((lambda (v...) body...) e...)`
fn let_to_combination(heap: &mut Heap, exp: Handle) -> Handle {
    let bindings = heap.cadr(exp);
    let body = heap.cddr(exp);
    let vars = binding_vars(heap, bindings);
    let lambda = make_lambda(heap, vars, body);
    let exps = binding_exps(heap, bindings);
    heap.cons(lambda, exps)
}

/// `let*` as nested single-binding `let`s, right to left.
fn let_star_to_nested_lets(heap: &mut Heap, exp: Handle) -> Handle {
    let bindings = heap.cadr(exp);
    let body = heap.cddr(exp);
    transform_let_star(heap, bindings, body)
}

fn transform_let_star(heap: &mut Heap, bindings: Handle, body: Handle) -> Handle {
    if heap.cdr(bindings).is_none() {
        let tail = heap.cons(bindings, body);
        let sym = heap.make_symbol("let");
        return heap.cons(sym, tail);
    }
    let first = heap.car(bindings);
    let rest_bindings = heap.cdr(bindings);
    let inner = transform_let_star(heap, rest_bindings, body);
    let inner_tail = heap.cons(inner, None);
    let first_list = heap.cons(first, None);
    let tail = heap.cons(first_list, inner_tail);
    let sym = heap.make_symbol("let");
    heap.cons(sym, tail)
}

/// `letrec` as a `let` that binds every name to the quoted symbol
/// `unassigned`, then `set!`s each to its expression before the body.
fn letrec_to_let(heap: &mut Heap, exp: Handle) -> Handle {
    let bindings = heap.cadr(exp);
    let vars = binding_vars(heap, bindings);
    let exps = binding_exps(heap, bindings);
    let unassigned = make_unassigned_bindings(heap, vars);
    let sets = make_letrec_sets(heap, vars, exps);
    let body = heap.cddr(exp);
    let full_body = heap.append(sets, body);
    let tail = heap.cons(unassigned, full_body);
    let sym = heap.make_symbol("let");
    heap.cons(sym, tail)
}

fn make_unassigned_bindings(heap: &mut Heap, vars: Handle) -> Handle {
    if vars.is_none() {
        return None;
    }
    let var = heap.car(vars);
    let unassigned = heap.make_symbol("unassigned");
    let quote_tail = heap.cons(unassigned, None);
    let quote_sym = heap.make_symbol("quote");
    let quoted = heap.cons(quote_sym, quote_tail);
    let binding_tail = heap.cons(quoted, None);
    let binding = heap.cons(var, binding_tail);
    let rest_vars = heap.cdr(vars);
    let rest = make_unassigned_bindings(heap, rest_vars);
    heap.cons(binding, rest)
}

fn make_letrec_sets(heap: &mut Heap, vars: Handle, exps: Handle) -> Handle {
    if vars.is_none() {
        return None;
    }
    let var = heap.car(vars);
    let exp = heap.car(exps);
    let t2 = heap.cons(exp, None);
    let t1 = heap.cons(var, t2);
    let set_sym = heap.make_symbol("set!");
    let set_exp = heap.cons(set_sym, t1);
    let rest_vars = heap.cdr(vars);
    let rest_exps = heap.cdr(exps);
    let rest = make_letrec_sets(heap, rest_vars, rest_exps);
    heap.cons(set_exp, rest)
}
