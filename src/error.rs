use thiserror::Error;

/// User-input failures surfaced at parse/compile time.
///
/// Internal consistency failures (a malformed normal form reaching lowering,
/// `rename` invoked with a missing mapping entry) are programming errors and
/// panic instead of returning a variant: a corrupted plan must never be built.
#[derive(Debug, Error)]
pub enum ExpressionError {
    #[error("fill request contains no goals")]
    EmptyRequest,
    #[error("invalid expression `{expr}`: {reason}")]
    Invalid { expr: String, reason: String },
    #[error("unknown function `{name}`")]
    UnknownFunction { name: String },
    #[error("function `{name}` requires {expected} args, got {actual}")]
    InvalidArity {
        name: String,
        expected: String,
        actual: usize,
    },
    #[error("expression `{expr}` is not boolean ({context})")]
    NotBoolean { expr: String, context: &'static str },
    #[error("membership test in `{expr}` requires a constant collection")]
    NotConstantCollection { expr: String },
    #[error("named definition `{name}` refers to itself")]
    DefinitionCycle { name: String },
}

impl ExpressionError {
    pub(crate) fn invalid(expr: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            expr: expr.to_string(),
            reason: reason.into(),
        }
    }
}
