//! Registered function table.
//!
//! The registry is an immutable value constructed once and passed into the
//! parser; only names present here are accepted as formula calls. Extension
//! path: add one `reg(...)` line with the arity and an optional constant-fold
//! kernel.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
}

impl Arity {
    #[inline]
    pub fn accepts(self, actual: usize) -> bool {
        match self {
            Self::Exact(n) => n == actual,
        }
    }

    pub fn describe(self) -> String {
        match self {
            Self::Exact(n) => n.to_string(),
        }
    }
}

pub type FoldFn = fn(&[f64]) -> f64;

#[derive(Debug, Clone, Copy)]
pub struct FunctionMeta {
    /// Formula-facing name; also the primitive name dispatched to the
    /// execution backend.
    pub name: &'static str,
    pub arity: Arity,
    /// Constant-fold kernel applied when every argument is a numeric literal.
    pub fold: Option<FoldFn>,
}

#[derive(Debug)]
pub struct FunctionRegistry {
    by_name: HashMap<&'static str, FunctionMeta>,
}

impl FunctionRegistry {
    /// The standard table: trigonometric, hyperbolic, exponential and
    /// rounding functions plus binary `min`/`max`/`atan2`.
    pub fn standard() -> Self {
        let mut by_name = HashMap::new();
        reg(&mut by_name, "sin", 1, Some(|a: &[f64]| a[0].sin()));
        reg(&mut by_name, "cos", 1, Some(|a: &[f64]| a[0].cos()));
        reg(&mut by_name, "tan", 1, Some(|a: &[f64]| a[0].tan()));
        reg(&mut by_name, "asin", 1, Some(|a: &[f64]| a[0].asin()));
        reg(&mut by_name, "acos", 1, Some(|a: &[f64]| a[0].acos()));
        reg(&mut by_name, "atan", 1, Some(|a: &[f64]| a[0].atan()));
        reg(&mut by_name, "sinh", 1, Some(|a: &[f64]| a[0].sinh()));
        reg(&mut by_name, "cosh", 1, Some(|a: &[f64]| a[0].cosh()));
        reg(&mut by_name, "tanh", 1, Some(|a: &[f64]| a[0].tanh()));
        reg(&mut by_name, "exp", 1, Some(|a: &[f64]| a[0].exp()));
        reg(&mut by_name, "expm1", 1, Some(|a: &[f64]| a[0].exp_m1()));
        reg(&mut by_name, "log", 1, Some(|a: &[f64]| a[0].ln()));
        reg(&mut by_name, "log10", 1, Some(|a: &[f64]| a[0].log10()));
        reg(&mut by_name, "log1p", 1, Some(|a: &[f64]| a[0].ln_1p()));
        reg(&mut by_name, "sqrt", 1, Some(|a: &[f64]| a[0].sqrt()));
        reg(&mut by_name, "abs", 1, Some(|a: &[f64]| a[0].abs()));
        reg(&mut by_name, "floor", 1, Some(|a: &[f64]| a[0].floor()));
        reg(&mut by_name, "ceil", 1, Some(|a: &[f64]| a[0].ceil()));
        reg(&mut by_name, "atan2", 2, Some(|a: &[f64]| a[0].atan2(a[1])));
        reg(&mut by_name, "min", 2, Some(|a: &[f64]| a[0].min(a[1])));
        reg(&mut by_name, "max", 2, Some(|a: &[f64]| a[0].max(a[1])));
        Self { by_name }
    }

    pub fn get(&self, name: &str) -> Option<&FunctionMeta> {
        self.by_name.get(name)
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn reg(
    table: &mut HashMap<&'static str, FunctionMeta>,
    name: &'static str,
    arity: usize,
    fold: Option<FoldFn>,
) {
    let meta = FunctionMeta {
        name,
        arity: Arity::Exact(arity),
        fold,
    };
    if table.insert(name, meta).is_some() {
        panic!("duplicate function name in registry: {name}");
    }
}
