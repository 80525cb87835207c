//! Goal lowering: rewrites a normalized expression into a tree of only
//! `Const`/`Name`/`Predicate` leaves and primitive `Call` nodes, the shape
//! the call-graph builder and the execution backend understand.
//!
//! The rewrite is pure and deterministic. Commutative reductions emit
//! balanced binary trees rather than linear chains, and repeated
//! multiplicative factors reduce by squaring, so structurally equal
//! subproducts (`x*x` inside `x**4`) surface as shareable subtrees.

use crate::expr::{Expr, RingTerm};

/// Lowers one goal expression. The input must already be in ring/logical
/// normal form; an unexpected shape is a normalizer bug and panics.
pub fn lower(e: &Expr) -> Expr {
    match e {
        Expr::Const(_) | Expr::Name(_) => e.clone(),
        Expr::Predicate { name, positive } => {
            let base = Expr::predicate(name.clone());
            if *positive {
                base
            } else {
                Expr::call("not", vec![base])
            }
        }
        Expr::Call { func, args } => Expr::Call {
            func: func.clone(),
            args: args.iter().map(lower).collect(),
        },
        Expr::Relation { cmp, left, right } => {
            use crate::expr::Cmp;
            let args = vec![lower(left), lower(right)];
            match cmp {
                Cmp::Lt => Expr::call("lt", args),
                Cmp::Le => Expr::call("le", args),
                Cmp::Eq => Expr::call("eq", args),
                Cmp::Ne => Expr::call("ne", args),
                Cmp::In => Expr::call("isin", args),
                Cmp::NotIn => Expr::call("not", vec![Expr::call("isin", args)]),
            }
        }
        Expr::PlusMinus(term) => lower_additive(term),
        Expr::TimesDiv(term) => lower_multiplicative(term),
        Expr::LogicalAnd(args) => balanced("and", args.iter().map(lower).collect()),
        Expr::LogicalOr(args) => balanced("or", args.iter().map(lower).collect()),
    }
}

fn lower_additive(term: &RingTerm) -> Expr {
    let mut summands = Vec::with_capacity(1 + term.pos.len());
    if term.coeff.get() != 0.0 || term.pos.is_empty() {
        summands.push(Expr::Const(crate::expr::Value::Number(term.coeff)));
    }
    summands.extend(term.pos.iter().map(lower));
    let sum = balanced("add", summands);
    if term.neg.is_empty() {
        sum
    } else {
        let negated = balanced("add", term.neg.iter().map(lower).collect());
        Expr::call("sub", vec![sum, negated])
    }
}

fn lower_multiplicative(term: &RingTerm) -> Expr {
    let mut factors = Vec::with_capacity(1 + term.pos.len());
    if term.coeff.get() != 1.0 || term.pos.is_empty() {
        factors.push(Expr::Const(crate::expr::Value::Number(term.coeff)));
    }
    factors.extend(grouped_factors(&term.pos));
    let product = balanced("mul", factors);
    if term.neg.is_empty() {
        product
    } else {
        let divisor = balanced("mul", grouped_factors(&term.neg));
        Expr::call("div", vec![product, divisor])
    }
}

/// Collapses each run of equal factors (the entries are sorted, so runs are
/// adjacent) into a reduce-by-squaring subtree: `x*x*x*x` becomes
/// `mul(mul(x,x), mul(x,x))`, exposing `mul(x,x)` for sharing.
fn grouped_factors(factors: &[Expr]) -> Vec<Expr> {
    let mut out = Vec::new();
    let mut idx = 0;
    while idx < factors.len() {
        let mut run = idx + 1;
        while run < factors.len() && factors[run] == factors[idx] {
            run += 1;
        }
        out.push(repeated(&lower(&factors[idx]), run - idx));
        idx = run;
    }
    out
}

fn repeated(factor: &Expr, count: usize) -> Expr {
    match count {
        1 => factor.clone(),
        n => {
            let half = repeated(factor, n / 2);
            let squared = Expr::call("mul", vec![half.clone(), half]);
            if n % 2 == 0 {
                squared
            } else {
                Expr::call("mul", vec![squared, factor.clone()])
            }
        }
    }
}

/// Reduces a list with a binary primitive as a balanced tree.
fn balanced(func: &str, mut items: Vec<Expr>) -> Expr {
    match items.len() {
        0 => panic!("balanced reduction over an empty list"),
        1 => items.pop().expect("length checked above"),
        n => {
            let right = items.split_off(n / 2);
            Expr::call(
                func,
                vec![balanced(func, items), balanced(func, right)],
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra;
    use crate::expr::Cmp;

    fn x() -> Expr {
        Expr::name("x")
    }
    fn y() -> Expr {
        Expr::name("y")
    }

    #[test]
    fn sums_lower_to_balanced_add_trees() {
        let e = algebra::add(x(), y());
        assert_eq!(lower(&e), Expr::call("add", vec![x(), y()]));

        let e = algebra::sub(x(), y());
        assert_eq!(lower(&e), Expr::call("sub", vec![x(), y()]));
    }

    #[test]
    fn coefficients_appear_as_constant_operands() {
        let e = algebra::add(algebra::mul(Expr::number(2.0), x()), y());
        // Term order follows the canonical sort, which compares leading
        // coefficients first, so 1*y precedes 2*x.
        assert_eq!(
            lower(&e),
            Expr::call(
                "add",
                vec![y(), Expr::call("mul", vec![Expr::number(2.0), x()])]
            )
        );
    }

    #[test]
    fn repeated_factors_reduce_by_squaring() {
        let e = algebra::pow(x(), Expr::number(4.0)).expect("pow should succeed");
        let squared = Expr::call("mul", vec![x(), x()]);
        assert_eq!(
            lower(&e),
            Expr::call("mul", vec![squared.clone(), squared])
        );

        let cubed = algebra::pow(x(), Expr::number(3.0)).expect("pow should succeed");
        assert_eq!(
            lower(&cubed),
            Expr::call("mul", vec![Expr::call("mul", vec![x(), x()]), x()])
        );
    }

    #[test]
    fn opaque_division_lowers_to_a_div_call() {
        let e = algebra::div(x(), algebra::add(x(), y())).expect("division should succeed");
        let lowered = lower(&e);
        match lowered {
            Expr::Call { func, args } => {
                assert_eq!(func, "div");
                assert_eq!(args[0], x());
                assert_eq!(args[1], Expr::call("add", vec![x(), y()]));
            }
            other => panic!("expected div call, got {other}"),
        }
    }

    #[test]
    fn relations_and_logic_lower_to_primitive_calls() {
        let rel = Expr::Relation {
            cmp: Cmp::Lt,
            left: Box::new(x()),
            right: Box::new(Expr::number(1.0)),
        };
        assert_eq!(
            lower(&rel),
            Expr::call("lt", vec![x(), Expr::number(1.0)])
        );

        let negated = Expr::Predicate {
            name: "trig".to_string(),
            positive: false,
        };
        assert_eq!(
            lower(&negated),
            Expr::call("not", vec![Expr::predicate("trig")])
        );

        let conj = Expr::LogicalAnd(vec![rel.clone(), Expr::predicate("trig")]);
        assert_eq!(
            lower(&conj),
            Expr::call("and", vec![lower(&rel), Expr::predicate("trig")])
        );
    }
}
