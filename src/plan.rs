//! Compiled execution plan: the immutable instruction stream handed to the
//! fill engine, plus the goal table and required-field contract, wrapped
//! with a compile manifest for observability.

use crate::error::ExpressionError;
use crate::expr::Expr;
use crate::graph::CallGraph;
use crate::parse;
use crate::registry::FunctionRegistry;
use crate::schedule::{self, Instruction};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

/// One requested result, in submission order. `original` is the
/// pre-lowering expression, kept for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanGoal {
    pub label: String,
    pub original: Expr,
}

/// Immutable after construction; may be read concurrently by any number of
/// executor threads.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub instructions: Vec<Instruction>,
    pub goals: Vec<PlanGoal>,
    /// Sorted names of every external field any `Param` binds. The host must
    /// supply exactly these at fill time.
    pub required_fields: Vec<String>,
    pub manifest: CompileManifest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileManifest {
    /// Number of requested goals.
    pub goal_count: usize,
    pub node_count: usize,
    /// Nodes reached by more than one goal, i.e. CSE wins.
    pub shared_node_count: usize,
    pub param_count: usize,
    pub assign_count: usize,
    pub delete_count: usize,
    /// End-to-end compile latency in microseconds.
    pub compile_time_us: u64,
}

impl CompileManifest {
    #[inline]
    pub fn summary_line(&self) -> String {
        format!(
            "goals={} nodes={} shared={} params={} assigns={} deletes={} compile_us={}",
            self.goal_count,
            self.node_count,
            self.shared_node_count,
            self.param_count,
            self.assign_count,
            self.delete_count,
            self.compile_time_us
        )
    }
}

/// One fill pass worth of goals: `(label, formula)` pairs plus shared named
/// sub-definitions available to every formula.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillRequest {
    pub goals: Vec<(String, String)>,
    pub defs: BTreeMap<String, String>,
}

/// Schedules a fully grown call graph into a plan.
pub fn compile(graph: &CallGraph) -> Plan {
    let started_at = Instant::now();
    let instructions = schedule::instructions(graph);

    let mut param_count = 0;
    let mut assign_count = 0;
    let mut delete_count = 0;
    for inst in &instructions {
        match inst {
            Instruction::Param { .. } => param_count += 1,
            Instruction::Assign { .. } => assign_count += 1,
            Instruction::Delete { .. } => delete_count += 1,
            Instruction::Export { .. } => {}
        }
    }
    let manifest = CompileManifest {
        goal_count: graph.goals().len(),
        node_count: graph.nodes().len(),
        shared_node_count: graph
            .nodes()
            .iter()
            .filter(|n| n.num_required_by > 1)
            .count(),
        param_count,
        assign_count,
        delete_count,
        compile_time_us: started_at.elapsed().as_micros() as u64,
    };
    tracing::debug!(target: "histplan::compile", "{}", manifest.summary_line());

    Plan {
        instructions,
        goals: graph
            .goals()
            .iter()
            .map(|g| PlanGoal {
                label: g.label.clone(),
                original: g.original.clone(),
            })
            .collect(),
        required_fields: graph.source_fields(),
        manifest,
    }
}

/// Parses every goal of a request and compiles them into one shared plan.
pub fn compile_request(
    req: &FillRequest,
    registry: &FunctionRegistry,
) -> Result<Plan, ExpressionError> {
    if req.goals.is_empty() {
        return Err(ExpressionError::EmptyRequest);
    }
    let mut graph = CallGraph::new();
    for (label, formula) in &req.goals {
        let expr = parse::parse(formula, registry, &req.defs)?;
        graph.add_goal(label.clone(), expr);
    }
    Ok(compile(&graph))
}

/// Memoizes compiled plans against the exact goal set: repeated fills with
/// the same goals reuse the cached plan instead of rebuilding it.
#[derive(Debug, Default)]
pub struct PlanCache {
    plans: HashMap<Vec<(String, Expr)>, Arc<Plan>>,
}

impl PlanCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compile(
        &mut self,
        req: &FillRequest,
        registry: &FunctionRegistry,
    ) -> Result<Arc<Plan>, ExpressionError> {
        if req.goals.is_empty() {
            return Err(ExpressionError::EmptyRequest);
        }
        let mut parsed = Vec::with_capacity(req.goals.len());
        for (label, formula) in &req.goals {
            parsed.push((label.clone(), parse::parse(formula, registry, &req.defs)?));
        }
        let mut key = parsed.clone();
        key.sort();
        if let Some(plan) = self.plans.get(&key) {
            return Ok(Arc::clone(plan));
        }
        let mut graph = CallGraph::new();
        for (label, expr) in parsed {
            graph.add_goal(label, expr);
        }
        let plan = Arc::new(compile(&graph));
        self.plans.insert(key, Arc::clone(&plan));
        Ok(plan)
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(goals: &[(&str, &str)]) -> FillRequest {
        FillRequest {
            goals: goals
                .iter()
                .map(|(l, f)| (l.to_string(), f.to_string()))
                .collect(),
            defs: BTreeMap::new(),
        }
    }

    #[test]
    fn empty_requests_are_rejected() {
        let registry = FunctionRegistry::standard();
        let err = compile_request(&request(&[]), &registry).expect_err("empty should fail");
        assert!(matches!(err, ExpressionError::EmptyRequest));
    }

    #[test]
    fn manifest_counts_match_the_stream() {
        let registry = FunctionRegistry::standard();
        let plan = compile_request(
            &request(&[("a", "sqrt(x)"), ("b", "exp(sqrt(x))")]),
            &registry,
        )
        .expect("compile should succeed");

        assert_eq!(plan.manifest.goal_count, 2);
        assert_eq!(plan.manifest.param_count, 1);
        assert_eq!(plan.manifest.assign_count, 2);
        // Every introduced local is eventually deleted.
        assert_eq!(
            plan.manifest.delete_count,
            plan.manifest.param_count + plan.manifest.assign_count
        );
        // sqrt(x) and x each feed two consumers.
        assert_eq!(plan.manifest.shared_node_count, 2);
        assert_eq!(plan.required_fields, vec!["x".to_string()]);
    }

    #[test]
    fn plan_cache_reuses_equal_goal_sets() {
        let registry = FunctionRegistry::standard();
        let mut cache = PlanCache::new();
        let first = cache
            .compile(&request(&[("a", "sqrt(x)"), ("b", "y")]), &registry)
            .expect("compile should succeed");
        // Goal order does not matter; formula spelling does not either, as
        // long as the normalized expressions match.
        let second = cache
            .compile(&request(&[("b", "y"), ("a", "sqrt(x)")]), &registry)
            .expect("compile should succeed");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        let third = cache
            .compile(&request(&[("a", "sqrt(x)")]), &registry)
            .expect("compile should succeed");
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn goal_labels_survive_into_the_plan() {
        let registry = FunctionRegistry::standard();
        let plan = compile_request(&request(&[("weight", "2 * w")]), &registry)
            .expect("compile should succeed");
        assert_eq!(plan.goals.len(), 1);
        assert_eq!(plan.goals[0].label, "weight");
    }
}
