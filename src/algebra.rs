//! Ring algebra normalizer.
//!
//! Two rings share the `RingTerm` shape: the additive ring (`PlusMinus`,
//! identity 0, entries are `TimesDiv` terms so similar terms merge by leading
//! coefficient) and the multiplicative ring (`TimesDiv`, identity 1, entries
//! are atoms). Every public operation routes through `normalform` then
//! `collect`, so constructed terms are always canonical: sign-pure, sorted,
//! and with pairwise-matching entries cancelled.
//!
//! Division is a field operation, not a ring one: dividing by a sum keeps the
//! sum as an opaque divisor, while dividing a sum distributes over its terms.

use crate::error::ExpressionError;
use crate::expr::{Expr, Number, RingTerm, Value};
use std::collections::BTreeMap;

/// Ring addition: `a + b`.
pub fn add(a: Expr, b: Expr) -> Expr {
    let ta = normalform_add(a);
    let tb = normalform_add(b);
    let merged = RingTerm {
        coeff: Number::new(ta.coeff.get() + tb.coeff.get()),
        pos: ta.pos.into_iter().chain(tb.pos).collect(),
        neg: ta.neg.into_iter().chain(tb.neg).collect(),
    };
    simplify_add(collect_add(merged))
}

/// Ring subtraction: `a - b`.
pub fn sub(a: Expr, b: Expr) -> Expr {
    let negated = negate(b);
    add(a, negated)
}

/// Additive-ring negation: swaps the signed lists and flips the constant.
pub fn negate(a: Expr) -> Expr {
    let t = normalform_add(a);
    simplify_add(collect_add(RingTerm {
        coeff: Number::new(-t.coeff.get()),
        pos: t.neg,
        neg: t.pos,
    }))
}

/// Ring multiplication with full distribution, including cross terms:
/// both operands are brought to additive normal form and every signed term
/// pair is multiplied.
pub fn mul(a: Expr, b: Expr) -> Expr {
    let ta = normalform_add(a);
    let tb = normalform_add(b);
    let mut coeff = 0.0;
    let mut pos = Vec::new();
    let mut neg = Vec::new();
    for ra in signed_terms(&ta) {
        for rb in signed_terms(&tb) {
            let product = term_mul(&ra, &rb);
            let c = product.coeff.get();
            if c == 0.0 {
                continue;
            }
            if product.pos.is_empty() && product.neg.is_empty() {
                coeff += c;
            } else if c < 0.0 {
                neg.push(Expr::TimesDiv(RingTerm {
                    coeff: Number::new(-c),
                    pos: product.pos,
                    neg: product.neg,
                }));
            } else {
                pos.push(Expr::TimesDiv(product));
            }
        }
    }
    simplify_add(collect_add(RingTerm {
        coeff: Number::new(coeff),
        pos,
        neg,
    }))
}

/// Field division. The divisor is normalized additively first:
/// a constant folds, a single multiplicative term is inverted (reciprocal)
/// and distributed, and a genuine sum stays opaque in the `neg` slot, so
/// `(x+y)/a` splits into `x/a + y/a` while `a/(x+y)` keeps one division.
pub fn div(a: Expr, b: Expr) -> Result<Expr, ExpressionError> {
    let denom = simplify_add(collect_add(normalform_add(b)));
    match denom {
        Expr::Const(Value::Number(n)) => {
            if n.get() == 0.0 {
                Err(ExpressionError::invalid(
                    &a.to_string(),
                    "division by constant zero",
                ))
            } else {
                Ok(mul(a, Expr::number(1.0 / n.get())))
            }
        }
        Expr::TimesDiv(t) => {
            let reciprocal = collect_mul(RingTerm {
                coeff: Number::new(1.0 / t.coeff.get()),
                pos: t.neg,
                neg: t.pos,
            });
            Ok(mul(a, Expr::TimesDiv(reciprocal)))
        }
        // A negated single term is still one multiplicative term.
        Expr::PlusMinus(t) if t.coeff.get() == 0.0 && t.pos.is_empty() && t.neg.len() == 1 => {
            let inner = as_times_div(&t.neg[0]).clone();
            let reciprocal = collect_mul(RingTerm {
                coeff: Number::new(-1.0 / inner.coeff.get()),
                pos: inner.neg,
                neg: inner.pos,
            });
            Ok(mul(a, Expr::TimesDiv(reciprocal)))
        }
        other => Ok(mul(
            a,
            Expr::TimesDiv(RingTerm {
                coeff: Number::new(1.0),
                pos: Vec::new(),
                neg: vec![other],
            }),
        )),
    }
}

/// Exponentiation. Small integer powers (`±1..±4`) expand into repeated
/// multiplication/division so cancellation can see through them; anything
/// else stays a `pow` primitive call.
pub fn pow(base: Expr, exponent: Expr) -> Result<Expr, ExpressionError> {
    if let (Some(b), Some(e)) = (base.const_number(), exponent.const_number()) {
        return Ok(Expr::number(b.powf(e)));
    }
    if let Some(e) = exponent.const_number() {
        if e.fract() == 0.0 && (1.0..=4.0).contains(&e) {
            return Ok(repeat_mul(base, e as u32));
        }
        if e.fract() == 0.0 && (-4.0..=-1.0).contains(&e) {
            return div(Expr::number(1.0), repeat_mul(base, (-e) as u32));
        }
    }
    Ok(Expr::call("pow", vec![base, exponent]))
}

fn repeat_mul(base: Expr, n: u32) -> Expr {
    let mut out = base.clone();
    for _ in 1..n {
        out = mul(out, base.clone());
    }
    out
}

/// Rewrites any expression into additive normal form: an existing term is a
/// no-op, a constant folds into the const slot, and anything else wraps as a
/// singleton `TimesDiv` entry. A negative inner coefficient is hoisted into
/// the `neg` slot so `pos`/`neg` partition by sign, not by syntactic `-`.
fn normalform_add(e: Expr) -> RingTerm {
    match e {
        Expr::Const(Value::Number(n)) => RingTerm {
            coeff: n,
            pos: Vec::new(),
            neg: Vec::new(),
        },
        Expr::Const(other) => {
            panic!("arithmetic on non-numeric constant {other}")
        }
        Expr::PlusMinus(t) => t,
        Expr::TimesDiv(t) => signed_entry(t),
        atom => signed_entry(RingTerm {
            coeff: Number::new(1.0),
            pos: vec![atom],
            neg: Vec::new(),
        }),
    }
}

fn signed_entry(t: RingTerm) -> RingTerm {
    let c = t.coeff.get();
    if c == 0.0 {
        return RingTerm::constant(0.0);
    }
    if c < 0.0 {
        let flipped = RingTerm {
            coeff: Number::new(-c),
            pos: t.pos,
            neg: t.neg,
        };
        RingTerm {
            coeff: Number::new(0.0),
            pos: Vec::new(),
            neg: vec![Expr::TimesDiv(flipped)],
        }
    } else {
        RingTerm {
            coeff: Number::new(0.0),
            pos: vec![Expr::TimesDiv(t)],
            neg: Vec::new(),
        }
    }
}

/// Merges syntactically-similar multiplicative subterms by summing their
/// leading constants, drops cancelled terms, and partitions the survivors
/// back into sign-pure sorted `pos`/`neg` lists.
fn collect_add(t: RingTerm) -> RingTerm {
    let mut merged: BTreeMap<(Vec<Expr>, Vec<Expr>), f64> = BTreeMap::new();
    let mut coeff = t.coeff.get();
    for (sign, items) in [(1.0, &t.pos), (-1.0, &t.neg)] {
        for item in items {
            let inner = as_times_div(item);
            let key = (inner.pos.clone(), inner.neg.clone());
            *merged.entry(key).or_insert(0.0) += sign * inner.coeff.get();
        }
    }
    let mut pos = Vec::new();
    let mut neg = Vec::new();
    for ((p, n), c) in merged {
        if c == 0.0 {
            continue;
        }
        if p.is_empty() && n.is_empty() {
            coeff += c;
            continue;
        }
        let term = RingTerm {
            coeff: Number::new(c.abs()),
            pos: p,
            neg: n,
        };
        if c > 0.0 {
            pos.push(Expr::TimesDiv(term));
        } else {
            neg.push(Expr::TimesDiv(term));
        }
    }
    pos.sort();
    neg.sort();
    RingTerm {
        coeff: Number::new(coeff),
        pos,
        neg,
    }
}

/// Cancels exact structural matches across `pos`/`neg` and sorts both lists.
fn collect_mul(t: RingTerm) -> RingTerm {
    if t.coeff.get() == 0.0 {
        return RingTerm::constant(0.0);
    }
    let mut pos = t.pos;
    let mut neg = t.neg;
    let mut i = 0;
    while i < pos.len() {
        if let Some(j) = neg.iter().position(|n| *n == pos[i]) {
            neg.remove(j);
            pos.remove(i);
        } else {
            i += 1;
        }
    }
    pos.sort();
    neg.sort();
    RingTerm {
        coeff: t.coeff,
        pos,
        neg,
    }
}

fn term_mul(a: &RingTerm, b: &RingTerm) -> RingTerm {
    collect_mul(RingTerm {
        coeff: Number::new(a.coeff.get() * b.coeff.get()),
        pos: a.pos.iter().chain(&b.pos).cloned().collect(),
        neg: a.neg.iter().chain(&b.neg).cloned().collect(),
    })
}

/// Signed term list of an additive normal form, sign folded into the leading
/// coefficient; the const slot appears as a bare constant term.
fn signed_terms(t: &RingTerm) -> Vec<RingTerm> {
    let mut out = Vec::with_capacity(1 + t.pos.len() + t.neg.len());
    if t.coeff.get() != 0.0 {
        out.push(RingTerm::constant(t.coeff.get()));
    }
    for item in &t.pos {
        out.push(as_times_div(item).clone());
    }
    for item in &t.neg {
        let inner = as_times_div(item);
        out.push(RingTerm {
            coeff: Number::new(-inner.coeff.get()),
            pos: inner.pos.clone(),
            neg: inner.neg.clone(),
        });
    }
    out
}

fn as_times_div(e: &Expr) -> &RingTerm {
    match e {
        Expr::TimesDiv(t) => t,
        other => panic!("additive term entry is not in multiplicative form: {other}"),
    }
}

/// Reduces a degenerate additive term to its simplest equivalent expression.
fn simplify_add(t: RingTerm) -> Expr {
    if t.pos.is_empty() && t.neg.is_empty() {
        return Expr::Const(Value::Number(t.coeff));
    }
    if t.coeff.get() == 0.0 && t.pos.len() == 1 && t.neg.is_empty() {
        let mut pos = t.pos;
        let only = pos.pop().expect("length checked above");
        return match only {
            Expr::TimesDiv(inner) => simplify_mul(inner),
            other => other,
        };
    }
    Expr::PlusMinus(t)
}

fn simplify_mul(t: RingTerm) -> Expr {
    if t.coeff.get() == 0.0 {
        return Expr::number(0.0);
    }
    if t.pos.is_empty() && t.neg.is_empty() {
        return Expr::Const(Value::Number(t.coeff));
    }
    if t.coeff.get() == 1.0 && t.pos.len() == 1 && t.neg.is_empty() {
        let mut pos = t.pos;
        return pos.pop().expect("length checked above");
    }
    Expr::TimesDiv(t)
}
