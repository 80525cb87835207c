//! Expression model: a closed tagged union with structural equality, a strict
//! total order, and a stable hash, so canonical forms sort deterministically
//! inside commutative collections.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Floating constant with total order/eq/hash via bit patterns.
///
/// `-0.0` collapses to `0.0` and every NaN collapses to one canonical NaN, so
/// mathematically identical constants compare equal after normalization.
#[derive(Debug, Clone, Copy)]
pub struct Number(f64);

impl Number {
    pub fn new(value: f64) -> Self {
        if value == 0.0 {
            return Self(0.0);
        }
        if value.is_nan() {
            return Self(f64::NAN);
        }
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }

    #[inline]
    pub fn is_integer(self) -> bool {
        self.0.is_finite() && self.0.fract() == 0.0
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Number {}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for Number {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_integer() {
            write!(f, "{:.0}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// A literal value: number, string, boolean, or a finite set of literals used
/// by membership tests. Sets are kept sorted and deduplicated on construction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    Number(Number),
    Bool(bool),
    Str(String),
    Set(Vec<Value>),
}

impl Value {
    pub fn set(mut items: Vec<Value>) -> Self {
        items.sort();
        items.dedup();
        Self::Set(items)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Set(items) => {
                write!(f, "{{")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Comparison operator of a `Relation`. `>`/`>=` never appear: the parser
/// rewrites them as `<`/`<=` with swapped operands, and symmetric operators
/// sort their operands, so the constant side is canonicalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Cmp {
    Eq,
    Ne,
    Lt,
    Le,
    In,
    NotIn,
}

impl Cmp {
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::In => "in",
            Self::NotIn => "not in",
        }
    }
}

/// Ring normal-form payload: `coeff + Σpos − Σneg` when wrapped in
/// `Expr::PlusMinus`, `coeff · Πpos / Πneg` when wrapped in `Expr::TimesDiv`.
///
/// Only `algebra` constructs these, via `normalform`/`collect`; `pos`/`neg`
/// are sorted and sign-pure, and no two entries equal after cancellation
/// coexist unsimplified.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RingTerm {
    pub coeff: Number,
    pub pos: Vec<Expr>,
    pub neg: Vec<Expr>,
}

impl RingTerm {
    pub fn constant(value: f64) -> Self {
        Self {
            coeff: Number::new(value),
            pos: Vec::new(),
            neg: Vec::new(),
        }
    }
}

/// An immutable, structurally-hashable, totally-ordered expression tree.
///
/// The derived `Ord` follows the declared variant order, which is the
/// canonical sort order used inside commutative collections.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Expr {
    Const(Value),
    Name(String),
    Predicate { name: String, positive: bool },
    Call { func: String, args: Vec<Expr> },
    Relation { cmp: Cmp, left: Box<Expr>, right: Box<Expr> },
    PlusMinus(RingTerm),
    TimesDiv(RingTerm),
    LogicalAnd(Vec<Expr>),
    LogicalOr(Vec<Expr>),
}

impl Expr {
    pub fn number(value: f64) -> Self {
        Self::Const(Value::Number(Number::new(value)))
    }

    pub fn boolean(value: bool) -> Self {
        Self::Const(Value::Bool(value))
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    pub fn predicate(name: impl Into<String>) -> Self {
        Self::Predicate {
            name: name.into(),
            positive: true,
        }
    }

    pub fn call(func: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::Call {
            func: func.into(),
            args,
        }
    }

    /// Numeric value if this is a numeric literal.
    pub fn const_number(&self) -> Option<f64> {
        match self {
            Self::Const(Value::Number(n)) => Some(n.get()),
            _ => None,
        }
    }

    /// Whether this expression is boolean-valued.
    pub fn is_logical(&self) -> bool {
        matches!(
            self,
            Self::Const(Value::Bool(_))
                | Self::Predicate { .. }
                | Self::Relation { .. }
                | Self::LogicalAnd(_)
                | Self::LogicalOr(_)
        )
    }

    /// Substitutes every subtree found (by structural equality) in `mapping`
    /// with a reference to its bound local name.
    ///
    /// Contract: every `Name`/`Predicate` leaf of `self` must be covered by
    /// the mapping; an unmapped leaf is a scheduler bug and panics.
    pub fn rename(&self, mapping: &HashMap<Expr, String>) -> Expr {
        if let Some(local) = mapping.get(self) {
            return Expr::Name(local.clone());
        }
        match self {
            Self::Const(_) => self.clone(),
            Self::Name(name) => panic!("rename: field `{name}` has no bound local name"),
            Self::Predicate { name, .. } => {
                panic!("rename: predicate `{name}` has no bound local name")
            }
            Self::Call { func, args } => Expr::Call {
                func: func.clone(),
                args: args.iter().map(|arg| arg.rename(mapping)).collect(),
            },
            Self::Relation { cmp, left, right } => Expr::Relation {
                cmp: *cmp,
                left: Box::new(left.rename(mapping)),
                right: Box::new(right.rename(mapping)),
            },
            Self::PlusMinus(term) => Expr::PlusMinus(rename_term(term, mapping)),
            Self::TimesDiv(term) => Expr::TimesDiv(rename_term(term, mapping)),
            Self::LogicalAnd(args) => {
                Expr::LogicalAnd(args.iter().map(|arg| arg.rename(mapping)).collect())
            }
            Self::LogicalOr(args) => {
                Expr::LogicalOr(args.iter().map(|arg| arg.rename(mapping)).collect())
            }
        }
    }
}

fn rename_term(term: &RingTerm, mapping: &HashMap<Expr, String>) -> RingTerm {
    RingTerm {
        coeff: term.coeff,
        pos: term.pos.iter().map(|e| e.rename(mapping)).collect(),
        neg: term.neg.iter().map(|e| e.rename(mapping)).collect(),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const(value) => write!(f, "{value}"),
            Self::Name(name) => write!(f, "{name}"),
            Self::Predicate { name, positive } => {
                if *positive {
                    write!(f, "{name}")
                } else {
                    write!(f, "not {name}")
                }
            }
            Self::Call { func, args } => {
                write!(f, "{func}(")?;
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Self::Relation { cmp, left, right } => {
                write!(f, "({left} {} {right})", cmp.symbol())
            }
            Self::PlusMinus(term) => fmt_ring(f, term, '+', '-'),
            Self::TimesDiv(term) => fmt_ring(f, term, '*', '/'),
            Self::LogicalAnd(args) => fmt_joined(f, args, " and "),
            Self::LogicalOr(args) => fmt_joined(f, args, " or "),
        }
    }
}

fn fmt_ring(f: &mut fmt::Formatter<'_>, term: &RingTerm, pos_op: char, neg_op: char) -> fmt::Result {
    let identity = if pos_op == '+' { 0.0 } else { 1.0 };
    write!(f, "(")?;
    let mut wrote = false;
    if term.coeff.get() != identity || (term.pos.is_empty() && term.neg.is_empty()) {
        write!(f, "{}", term.coeff)?;
        wrote = true;
    }
    for item in &term.pos {
        if wrote {
            write!(f, " {pos_op} ")?;
        }
        write!(f, "{item}")?;
        wrote = true;
    }
    for item in &term.neg {
        if !wrote {
            write!(f, "{identity}")?;
        }
        write!(f, " {neg_op} {item}")?;
        wrote = true;
    }
    write!(f, ")")
}

fn fmt_joined(f: &mut fmt::Formatter<'_>, args: &[Expr], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (idx, arg) in args.iter().enumerate() {
        if idx > 0 {
            write!(f, "{sep}")?;
        }
        write!(f, "{arg}")?;
    }
    write!(f, ")")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_collapses_negative_zero_and_nan() {
        assert_eq!(Number::new(-0.0), Number::new(0.0));
        assert_eq!(Number::new(f64::NAN), Number::new(-f64::NAN));
        assert_ne!(Number::new(1.0), Number::new(-1.0));
    }

    #[test]
    fn variant_order_puts_constants_first() {
        let mut items = vec![
            Expr::name("x"),
            Expr::number(3.0),
            Expr::call("sqrt", vec![Expr::name("x")]),
        ];
        items.sort();
        assert_eq!(items[0], Expr::number(3.0));
        assert_eq!(items[1], Expr::name("x"));
    }

    #[test]
    fn rename_substitutes_mapped_subtrees() {
        let sqrt_x = Expr::call("sqrt", vec![Expr::name("x")]);
        let outer = Expr::call("exp", vec![sqrt_x.clone()]);
        let mut mapping = HashMap::new();
        mapping.insert(sqrt_x, "v1".to_string());
        assert_eq!(
            outer.rename(&mapping),
            Expr::call("exp", vec![Expr::name("v1")])
        );
    }

    #[test]
    #[should_panic(expected = "no bound local name")]
    fn rename_panics_on_unmapped_leaf() {
        let expr = Expr::call("sqrt", vec![Expr::name("x")]);
        expr.rename(&HashMap::new());
    }

    #[test]
    fn display_renders_ring_terms() {
        let term = RingTerm {
            coeff: Number::new(0.0),
            pos: vec![Expr::name("x")],
            neg: vec![Expr::name("y")],
        };
        assert_eq!(Expr::PlusMinus(term).to_string(), "(x - y)");
    }
}
