//! Scheduler and instruction generator.
//!
//! `walkdown` linearizes the call graph from its sources: a node becomes
//! visitable only once every dependency has been visited, and among the
//! ready nodes the most widely shared one (highest `num_required_by`) goes
//! first, with the lowest node id breaking ties for determinism.
//! `instructions` consumes that order and emits one `Param`/`Assign` per
//! node, an `Export` per goal, and a `Delete` as soon as a local value has
//! no unvisited dependent left.

use crate::expr::Expr;
use crate::graph::{CallGraph, NodeId};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Bind an external field to a local name.
    Param { name: String, source: String },
    /// Compute a primitive call whose operands are already-bound locals.
    Assign { name: String, expr: Expr },
    /// Copy a local out as the value of goal `goal` (index into the plan's
    /// goal list).
    Export { name: String, goal: usize },
    /// Free a local; no later instruction may reference it.
    Delete { name: String },
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Param { name, source } => write!(f, "{name} := param {source}"),
            Self::Assign { name, expr } => write!(f, "{name} := {expr}"),
            Self::Export { name, goal } => write!(f, "export {name} as goal {goal}"),
            Self::Delete { name } => write!(f, "delete {name}"),
        }
    }
}

/// Topological visit order over the whole graph. Every node appears exactly
/// once, after all of its dependencies.
pub fn walkdown(graph: &CallGraph) -> Vec<NodeId> {
    let nodes = graph.nodes();
    let mut unvisited_deps: Vec<usize> = nodes.iter().map(|n| n.requires.len()).collect();
    let mut ready: Vec<NodeId> = (0..nodes.len()).filter(|&id| unvisited_deps[id] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());
    while !ready.is_empty() {
        let mut pick = 0;
        for slot in 1..ready.len() {
            let best = ready[pick];
            let cand = ready[slot];
            let cand_key = (nodes[cand].num_required_by, std::cmp::Reverse(cand));
            let best_key = (nodes[best].num_required_by, std::cmp::Reverse(best));
            if cand_key > best_key {
                pick = slot;
            }
        }
        let id = ready.swap_remove(pick);
        order.push(id);
        for &dependent in &nodes[id].required_by {
            unvisited_deps[dependent] -= 1;
            if unvisited_deps[dependent] == 0 {
                ready.push(dependent);
            }
        }
    }
    debug_assert_eq!(order.len(), nodes.len(), "call graph contains a cycle");
    order
}

/// Explicit traversal state: bound local names keyed by the node expression
/// (feeding `rename`), the live set in introduction order, and the remaining
/// unvisited-dependent count per node.
struct ScheduleState {
    names: HashMap<Expr, String>,
    live: Vec<(NodeId, String)>,
    remaining: Vec<usize>,
    next_local: usize,
}

impl ScheduleState {
    fn bind(&mut self, id: NodeId, expr: &Expr) -> String {
        self.next_local += 1;
        let name = format!("v{}", self.next_local);
        self.names.insert(expr.clone(), name.clone());
        self.live.push((id, name.clone()));
        name
    }

    fn sweep(&mut self, out: &mut Vec<Instruction>) {
        let mut idx = 0;
        while idx < self.live.len() {
            if self.remaining[self.live[idx].0] == 0 {
                let (_, name) = self.live.remove(idx);
                out.push(Instruction::Delete { name });
            } else {
                idx += 1;
            }
        }
    }
}

/// Emits the complete instruction stream for every goal in the graph.
///
/// Goals are exported by name immediately after their node is computed, but
/// their storage is still deleted once nothing further requires it: export
/// is a copy-out, not a reference retention.
pub fn instructions(graph: &CallGraph) -> Vec<Instruction> {
    let nodes = graph.nodes();
    let mut goals_by_node: HashMap<NodeId, Vec<usize>> = HashMap::new();
    for (idx, goal) in graph.goals().iter().enumerate() {
        goals_by_node.entry(goal.node).or_default().push(idx);
    }

    let mut state = ScheduleState {
        names: HashMap::new(),
        live: Vec::new(),
        remaining: nodes.iter().map(|n| n.required_by.len()).collect(),
        next_local: 0,
    };
    let mut out = Vec::new();
    for id in walkdown(graph) {
        let node = &nodes[id];
        let name = match &node.expr {
            Expr::Name(source) | Expr::Predicate { name: source, .. } => {
                let local = state.bind(id, &node.expr);
                out.push(Instruction::Param {
                    name: local.clone(),
                    source: source.clone(),
                });
                local
            }
            expr => {
                let resolved = expr.rename(&state.names);
                let local = state.bind(id, expr);
                out.push(Instruction::Assign {
                    name: local.clone(),
                    expr: resolved,
                });
                local
            }
        };
        if let Some(goal_indices) = goals_by_node.get(&id) {
            for &goal in goal_indices {
                out.push(Instruction::Export {
                    name: name.clone(),
                    goal,
                });
            }
        }
        for &dep in &node.requires {
            state.remaining[dep] -= 1;
        }
        state.sweep(&mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::CallGraph;

    fn sqrt_of(inner: Expr) -> Expr {
        Expr::call("sqrt", vec![inner])
    }

    #[test]
    fn walkdown_visits_dependencies_first() {
        let mut graph = CallGraph::new();
        graph.add_goal("a", sqrt_of(sqrt_of(Expr::name("x"))));
        let order = walkdown(&graph);
        assert_eq!(order.len(), graph.nodes().len());
        let position: HashMap<usize, usize> =
            order.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        for (id, node) in graph.nodes().iter().enumerate() {
            for dep in &node.requires {
                assert!(position[dep] < position[&id]);
            }
        }
    }

    #[test]
    fn shared_nodes_are_scheduled_before_less_shared_peers() {
        let mut graph = CallGraph::new();
        // sqrt(y) feeds two goals, sqrt(x) feeds one.
        graph.add_goal("a", sqrt_of(sqrt_of(Expr::name("y"))));
        graph.add_goal("b", Expr::call("exp", vec![sqrt_of(Expr::name("y"))]));
        graph.add_goal("c", sqrt_of(Expr::name("x")));
        let order = walkdown(&graph);
        let sqrt_y = sqrt_of(Expr::name("y"));
        let sqrt_x = sqrt_of(Expr::name("x"));
        let pos = |expr: &Expr| {
            order
                .iter()
                .position(|&id| graph.node(id).expr == *expr)
                .expect("node should be scheduled")
        };
        assert!(pos(&sqrt_y) < pos(&sqrt_x));
    }

    #[test]
    fn locals_are_deleted_after_their_last_consumer() {
        let mut graph = CallGraph::new();
        graph.add_goal("a", sqrt_of(sqrt_of(Expr::name("x"))));
        let stream = instructions(&graph);

        let mut deleted = Vec::new();
        let mut introduced = Vec::new();
        for inst in &stream {
            match inst {
                Instruction::Param { name, .. } | Instruction::Assign { name, .. } => {
                    assert!(!deleted.contains(name));
                    introduced.push(name.clone());
                }
                Instruction::Export { name, .. } => assert!(!deleted.contains(name)),
                Instruction::Delete { name } => {
                    assert!(!deleted.contains(name), "double delete of {name}");
                    deleted.push(name.clone());
                }
            }
        }
        introduced.sort();
        deleted.sort();
        assert_eq!(introduced, deleted);
    }

    #[test]
    fn goal_storage_is_deleted_after_export() {
        let mut graph = CallGraph::new();
        graph.add_goal("a", sqrt_of(Expr::name("x")));
        let stream = instructions(&graph);
        let export_at = stream
            .iter()
            .position(|i| matches!(i, Instruction::Export { .. }))
            .expect("goal should be exported");
        let exported = match &stream[export_at] {
            Instruction::Export { name, .. } => name.clone(),
            _ => unreachable!(),
        };
        assert!(stream[export_at + 1..]
            .iter()
            .any(|i| matches!(i, Instruction::Delete { name } if *name == exported)));
    }

    #[test]
    fn assign_operands_are_renamed_to_locals() {
        let mut graph = CallGraph::new();
        graph.add_goal("a", sqrt_of(Expr::name("x")));
        let stream = instructions(&graph);
        let assign = stream
            .iter()
            .find_map(|i| match i {
                Instruction::Assign { expr, .. } => Some(expr.clone()),
                _ => None,
            })
            .expect("one assign expected");
        assert_eq!(assign, Expr::call("sqrt", vec![Expr::name("v1")]));
    }
}
