//! Logical normalizer: conjunction/disjunction on the boolean ring, kept in
//! full disjunctive normal form. A `LogicalOr` holds only `LogicalAnd`
//! children whose own children are `Relation`/`Predicate` leaves; degenerate
//! shapes simplify to the bare literal or a boolean constant.

use crate::expr::{Cmp, Expr, Value};

/// Conjunction: Cartesian-product distribution of AND over OR.
pub fn and(a: Expr, b: Expr) -> Expr {
    let da = to_dnf(&a);
    let db = to_dnf(&b);
    let mut out = Vec::with_capacity(da.len() * db.len());
    for ca in &da {
        for cb in &db {
            out.push(ca.iter().chain(cb).cloned().collect());
        }
    }
    from_dnf(out)
}

/// Disjunction: flattening of OR over OR.
pub fn or(a: Expr, b: Expr) -> Expr {
    let mut out = to_dnf(&a);
    out.extend(to_dnf(&b));
    from_dnf(out)
}

/// Exclusive or, expanded on the boolean ring.
pub fn xor(a: Expr, b: Expr) -> Expr {
    or(
        and(a.clone(), negate(b.clone())),
        and(negate(a), b),
    )
}

/// Logical negation: literals flip via a fixed complement table; composite
/// formulas convert to DNF first, then De Morgan expansion (one negated
/// literal chosen from every conjunction, all combinations) yields a new
/// valid DNF.
pub fn negate(e: Expr) -> Expr {
    match &e {
        Expr::Const(Value::Bool(b)) => return Expr::boolean(!*b),
        Expr::Relation { .. } | Expr::Predicate { .. } => return literal_negate(&e),
        _ => {}
    }
    let dnf = to_dnf(&e);
    let mut acc: Vec<Vec<Expr>> = vec![Vec::new()];
    for conj in &dnf {
        let mut next = Vec::with_capacity(acc.len() * conj.len());
        for partial in &acc {
            for lit in conj {
                let mut extended = partial.clone();
                extended.push(literal_negate(lit));
                next.push(extended);
            }
        }
        acc = next;
    }
    from_dnf(acc)
}

/// Complement of a single literal: `==`/`!=` swap, `<`/`<=` swap with
/// reversed operands, `in`/`not in` swap, predicates flip their flag.
fn literal_negate(e: &Expr) -> Expr {
    match e {
        Expr::Predicate { name, positive } => Expr::Predicate {
            name: name.clone(),
            positive: !positive,
        },
        Expr::Relation { cmp, left, right } => {
            let (cmp, left, right) = match cmp {
                Cmp::Eq => (Cmp::Ne, left.clone(), right.clone()),
                Cmp::Ne => (Cmp::Eq, left.clone(), right.clone()),
                Cmp::Lt => (Cmp::Le, right.clone(), left.clone()),
                Cmp::Le => (Cmp::Lt, right.clone(), left.clone()),
                Cmp::In => (Cmp::NotIn, left.clone(), right.clone()),
                Cmp::NotIn => (Cmp::In, left.clone(), right.clone()),
            };
            Expr::Relation { cmp, left, right }
        }
        other => panic!("negation of non-literal expression {other}"),
    }
}

/// DNF view: a list of conjunctions, each a list of literals. `True` is the
/// single empty conjunction; `False` is the empty disjunction.
fn to_dnf(e: &Expr) -> Vec<Vec<Expr>> {
    match e {
        Expr::Const(Value::Bool(true)) => vec![Vec::new()],
        Expr::Const(Value::Bool(false)) => Vec::new(),
        Expr::Relation { .. } | Expr::Predicate { .. } => vec![vec![e.clone()]],
        Expr::LogicalAnd(args) => vec![args.clone()],
        Expr::LogicalOr(args) => args.iter().flat_map(to_dnf).collect(),
        other => panic!("logical operation on non-boolean expression {other}"),
    }
}

/// Canonical expression from a raw DNF: drops `True` literals, contradictory
/// and duplicate conjunctions, sorts everything, and collapses degenerate
/// `True`/`False` combinations and singleton groups.
fn from_dnf(conjunctions: Vec<Vec<Expr>>) -> Expr {
    let mut normalized: Vec<Vec<Expr>> = Vec::new();
    'outer: for conj in conjunctions {
        let mut lits: Vec<Expr> = Vec::new();
        for lit in conj {
            match lit {
                Expr::Const(Value::Bool(true)) => continue,
                Expr::Const(Value::Bool(false)) => continue 'outer,
                other => lits.push(other),
            }
        }
        lits.sort();
        lits.dedup();
        if lits
            .iter()
            .any(|l| lits.binary_search(&literal_negate(l)).is_ok())
        {
            continue;
        }
        if lits.is_empty() {
            return Expr::boolean(true);
        }
        normalized.push(lits);
    }
    normalized.sort();
    normalized.dedup();
    // Absorption: a conjunction subsumed by a weaker one is redundant,
    // e.g. (a and c) or c == c.
    let mut kept: Vec<Vec<Expr>> = Vec::new();
    for conj in normalized {
        if kept.iter().any(|k| is_subset(k, &conj)) {
            continue;
        }
        kept.retain(|k| !is_subset(&conj, k));
        kept.push(conj);
    }
    let mut normalized = kept;
    normalized.sort();
    // A literal alongside its own complement makes the disjunction vacuous.
    for conj in &normalized {
        if conj.len() == 1 {
            let complement = vec![literal_negate(&conj[0])];
            if normalized.binary_search(&complement).is_ok() {
                return Expr::boolean(true);
            }
        }
    }
    match normalized.len() {
        0 => Expr::boolean(false),
        1 => {
            let mut only = normalized.pop().expect("length checked above");
            if only.len() == 1 {
                only.pop().expect("length checked above")
            } else {
                Expr::LogicalAnd(only)
            }
        }
        _ => Expr::LogicalOr(
            normalized
                .into_iter()
                .map(Expr::LogicalAnd)
                .collect(),
        ),
    }
}

fn is_subset(a: &[Expr], b: &[Expr]) -> bool {
    a.iter().all(|item| b.binary_search(item).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(name: &str) -> Expr {
        Expr::predicate(name)
    }

    fn lt(name: &str, v: f64) -> Expr {
        Expr::Relation {
            cmp: Cmp::Lt,
            left: Box::new(Expr::name(name)),
            right: Box::new(Expr::number(v)),
        }
    }

    #[test]
    fn de_morgan_over_a_conjunction() {
        let lhs = negate(and(p("a"), p("b")));
        let rhs = or(negate(p("a")), negate(p("b")));
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn double_negation_is_the_identity() {
        for e in [
            p("a"),
            lt("x", 5.0),
            and(p("a"), p("b")),
            or(and(p("a"), p("b")), p("c")),
        ] {
            assert_eq!(negate(negate(e.clone())), e);
        }
    }

    #[test]
    fn relation_negation_uses_the_complement_table() {
        let not_lt = negate(lt("x", 5.0));
        match not_lt {
            Expr::Relation { cmp, left, right } => {
                assert_eq!(cmp, Cmp::Le);
                assert_eq!(*left, Expr::number(5.0));
                assert_eq!(*right, Expr::name("x"));
            }
            other => panic!("expected relation, got {other}"),
        }
    }

    #[test]
    fn contradictions_and_constants_collapse() {
        assert_eq!(and(p("a"), negate(p("a"))), Expr::boolean(false));
        assert_eq!(or(p("a"), negate(p("a"))), Expr::boolean(true));
        assert_eq!(and(Expr::boolean(true), p("a")), p("a"));
        assert_eq!(and(Expr::boolean(false), p("a")), Expr::boolean(false));
        assert_eq!(or(Expr::boolean(false), p("a")), p("a"));
        assert_eq!(or(Expr::boolean(true), p("a")), Expr::boolean(true));
    }

    #[test]
    fn conjunction_order_is_canonical() {
        assert_eq!(and(p("a"), p("b")), and(p("b"), p("a")));
        assert_eq!(
            or(and(p("a"), p("b")), p("c")),
            or(p("c"), and(p("b"), p("a")))
        );
    }

    #[test]
    fn xor_expands_on_the_boolean_ring() {
        let e = xor(p("a"), p("b"));
        match &e {
            Expr::LogicalOr(args) => assert_eq!(args.len(), 2),
            other => panic!("expected disjunction, got {other}"),
        }
        assert_eq!(xor(p("a"), p("a")), Expr::boolean(false));
    }
}
