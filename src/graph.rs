//! Call graph: a shared, deduplicated dependency graph over the lowered
//! forms of every goal expression.
//!
//! Nodes live in an arena vector and reference each other by index; the
//! dedup table maps a lowered expression to its index, so two goals that
//! contain structurally equal subtrees share one node.

use crate::expr::Expr;
use crate::lower;
use std::collections::{HashMap, HashSet};

pub type NodeId = usize;

#[derive(Debug)]
pub struct GraphNode {
    /// Lowered expression this node computes.
    pub expr: Expr,
    /// Direct dependencies, deduplicated.
    pub requires: Vec<NodeId>,
    /// Direct dependents, deduplicated.
    pub required_by: Vec<NodeId>,
    /// How many distinct goals reach this node. Drives scheduling priority:
    /// a subexpression shared by five goals counts five even though it is a
    /// single node.
    pub num_required_by: usize,
}

/// An externally meaningful result: an axis bin formula, a weight, a filter,
/// or a profile quantity. Keeps the pre-lowering expression for reporting.
#[derive(Debug, Clone)]
pub struct Goal {
    pub label: String,
    pub original: Expr,
    pub node: NodeId,
}

#[derive(Debug, Default)]
pub struct CallGraph {
    nodes: Vec<GraphNode>,
    index: HashMap<Expr, NodeId>,
    goals: Vec<Goal>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lowers one goal expression into the graph and bumps the usage count
    /// of every node it reaches. Resubmitting an identical labeled goal is
    /// a no-op.
    pub fn add_goal(&mut self, label: impl Into<String>, original: Expr) -> NodeId {
        let label = label.into();
        let lowered = lower::lower(&original);
        if let Some(existing) = self
            .goals
            .iter()
            .find(|g| g.label == label && g.original == original)
        {
            return existing.node;
        }
        let node = self.grow(&lowered);
        let mut reached = HashSet::new();
        self.mark_reachable(node, &mut reached);
        for id in reached {
            self.nodes[id].num_required_by += 1;
        }
        self.goals.push(Goal {
            label,
            original,
            node,
        });
        node
    }

    /// Ensures a lowered expression and its whole argument subtree are
    /// present exactly once, wiring `requires`/`required_by` edges. Constant
    /// operands stay inline in the parent expression; only a constant goal
    /// root becomes a node.
    fn grow(&mut self, lowered: &Expr) -> NodeId {
        if let Some(&id) = self.index.get(lowered) {
            return id;
        }
        let requires = match lowered {
            Expr::Const(_) | Expr::Name(_) => Vec::new(),
            Expr::Predicate { positive: true, .. } => Vec::new(),
            Expr::Call { args, .. } => {
                let mut deps = Vec::new();
                for arg in args {
                    if matches!(arg, Expr::Const(_)) {
                        continue;
                    }
                    let dep = self.grow(arg);
                    if !deps.contains(&dep) {
                        deps.push(dep);
                    }
                }
                deps
            }
            other => panic!("non-lowered expression reached the call graph: {other}"),
        };
        let id = self.nodes.len();
        self.nodes.push(GraphNode {
            expr: lowered.clone(),
            requires: requires.clone(),
            required_by: Vec::new(),
            num_required_by: 0,
        });
        self.index.insert(lowered.clone(), id);
        for dep in requires {
            self.nodes[dep].required_by.push(id);
        }
        id
    }

    fn mark_reachable(&self, node: NodeId, reached: &mut HashSet<NodeId>) {
        if !reached.insert(node) {
            return;
        }
        for &dep in &self.nodes[node].requires {
            self.mark_reachable(dep, reached);
        }
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &GraphNode {
        &self.nodes[id]
    }

    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    /// Sorted names of every external field any goal depends on.
    pub fn source_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = self
            .nodes
            .iter()
            .filter_map(|n| match &n.expr {
                Expr::Name(name) => Some(name.clone()),
                Expr::Predicate { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect();
        fields.sort();
        fields.dedup();
        fields
    }
}
