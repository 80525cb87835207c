//! Expression algebra and execution-plan compiler for vectorized histogram
//! filling.
//!
//! Formulas over named fields (bin expressions, weights, filters) parse into
//! a canonical ring/logical normal form that exposes algebraic cancellation,
//! then lower into one shared call graph and a single instruction stream
//! that computes every requested goal exactly once, freeing intermediate
//! results as soon as they are dead.

pub mod algebra;
pub mod error;
pub mod expr;
pub mod graph;
pub mod logic;
pub mod lower;
pub mod parse;
pub mod plan;
pub mod registry;
pub mod schedule;

pub use error::ExpressionError;
pub use expr::{Cmp, Expr, Number, RingTerm, Value};
pub use graph::CallGraph;
pub use parse::parse;
pub use plan::{compile, compile_request, CompileManifest, FillRequest, Plan, PlanCache, PlanGoal};
pub use registry::{Arity, FunctionMeta, FunctionRegistry};
pub use schedule::Instruction;
