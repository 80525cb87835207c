//! Algebraic properties of the formula grammar, checked end to end through
//! the parser and normalizer.

use histplan::{parse, Expr, ExpressionError, FunctionRegistry};
use std::collections::BTreeMap;

fn p(source: &str) -> Expr {
    let registry = FunctionRegistry::standard();
    parse(source, &registry, &BTreeMap::new()).expect("parse should succeed")
}

fn p_err(source: &str) -> ExpressionError {
    let registry = FunctionRegistry::standard();
    parse(source, &registry, &BTreeMap::new()).expect_err("parse should fail")
}

#[test]
fn commutative_reorderings_parse_identically() {
    assert_eq!(p("x + y + z"), p("z + y + x"));
    assert_eq!(p("x * y * z"), p("z * y * x"));
    assert_eq!(p("x*y + z"), p("z + y*x"));
}

#[test]
fn cancellation_reaches_constants() {
    assert_eq!(p("x - x"), p("0"));
    assert_eq!(p("a*(x+y) - a*x - a*y"), p("0"));
    assert_eq!(p("a*(x+y) - a*x"), p("a*y"));
    assert_eq!(p("a*(x+y)/y - a*x/y"), p("a"));
    assert_eq!(p("(x + y) - (y + x)"), p("0"));
}

#[test]
fn division_by_a_sum_stays_a_single_division() {
    // (x+y)/a distributes into ring form.
    assert_eq!(p("(x+y)/a"), p("x/a + y/a"));

    // a/(x+y) keeps the sum as one opaque divisor.
    let opaque = p("a/(x+y)");
    match opaque {
        Expr::TimesDiv(term) => {
            assert_eq!(term.neg.len(), 1);
            assert!(matches!(term.neg[0], Expr::PlusMinus(_)));
        }
        other => panic!("expected a genuine division, got {other}"),
    }
}

#[test]
fn small_integer_powers_cancel_like_products() {
    assert_eq!(p("x**2"), p("x*x"));
    assert_eq!(p("x**2 / x"), p("x"));
    assert_eq!(p("x**-2 * x"), p("1/x"));
    assert_eq!(p("x**3 - x*x*x"), p("0"));
    assert!(matches!(p("x**5"), Expr::Call { ref func, .. } if func == "pow"));
    assert!(matches!(p("x**-5"), Expr::Call { ref func, .. } if func == "pow"));
}

#[test]
fn logical_normalization_satisfies_de_morgan() {
    assert_eq!(p("not (a < 1 and b < 2)"), p("not (a < 1) or not (b < 2)"));
    assert_eq!(p("not (a < 1 or b < 2)"), p("not (a < 1) and not (b < 2)"));
    assert_eq!(p("not not (a < 1 and b < 2)"), p("a < 1 and b < 2"));
}

#[test]
fn boolean_constants_collapse() {
    assert_eq!(p("x < 1 and 1 < 2"), p("x < 1"));
    assert_eq!(p("x < 1 and 2 < 1"), p("1 == 2"));
    assert_eq!(p("x < 1 or 1 < 2"), p("1 < 2"));
    assert_eq!(p("x < 1 and not (x < 1)"), p("2 < 1"));
}

#[test]
fn definitions_substitute_before_normalization() {
    let registry = FunctionRegistry::standard();
    let mut defs = BTreeMap::new();
    defs.insert("pt2".to_string(), "px**2 + py**2".to_string());
    // The definition cancels against an explicit spelling of itself.
    let expr = parse("pt2 - px*px - py*py", &registry, &defs).expect("parse should succeed");
    assert_eq!(expr, Expr::number(0.0));
}

#[test]
fn unsupported_syntax_is_rejected_up_front() {
    assert!(matches!(p_err("x = 1"), ExpressionError::Invalid { .. }));
    assert!(matches!(p_err("x +"), ExpressionError::Invalid { .. }));
    assert!(matches!(p_err("(x"), ExpressionError::Invalid { .. }));
    assert!(matches!(
        p_err("x in [1, y]"),
        ExpressionError::NotConstantCollection { .. }
    ));
    assert!(matches!(
        p_err("sqrt(x < 1)"),
        ExpressionError::Invalid { .. }
    ));
    assert!(matches!(
        p_err("x and 1"),
        ExpressionError::NotBoolean { .. }
    ));
}
