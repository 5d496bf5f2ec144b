//! DAG planner (§4.3): cycle detection and dependency-level grouping over
//! a workflow's steps.
//!
//! Builds a `petgraph` digraph purely to get cycle-tracing for free from
//! `petgraph::algo`; the level grouping itself is the Kahn's-algorithm
//! walk the spec describes step by step, since that (not a generic
//! toposort) is what determines which steps the executor may run in
//! parallel.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use skillforge_types::skill::WorkflowStep;
use skillforge_types::{Result, SkillforgeError};

use crate::suggest::suggestion_suffix;

/// A dependency-ordered execution plan: each inner `Vec<String>` is one
/// level (§3's "Level"), containing the step ids whose dependencies all
/// lie in earlier levels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub levels: Vec<Vec<String>>,
}

impl Plan {
    /// The level index of a given step id, or `None` if it is not planned.
    pub fn level_of(&self, step_id: &str) -> Option<usize> {
        self.levels
            .iter()
            .position(|level| level.iter().any(|id| id == step_id))
    }

    /// All step ids across all levels, in declaration-preserving level
    /// order (the concatenation the round-trip property in §8 refers to).
    pub fn flatten(&self) -> Vec<&str> {
        self.levels
            .iter()
            .flat_map(|level| level.iter().map(String::as_str))
            .collect()
    }
}

/// Plan a workflow's steps into execution levels.
///
/// # Errors
///
/// Returns [`SkillforgeError::UnknownStep`] if any `dependsOn` entry names
/// a step id not present in `steps`, with a "did you mean" suggestion when
/// a close match exists. Returns [`SkillforgeError::Cycle`] if the
/// dependency graph is not acyclic, naming at least one step on the cycle.
pub fn plan(steps: &[WorkflowStep]) -> Result<Plan> {
    let mut index_of: HashMap<&str, NodeIndex> = HashMap::new();
    let mut graph: DiGraph<&str, ()> = DiGraph::new();

    for step in steps {
        let idx = graph.add_node(step.id.as_str());
        index_of.insert(step.id.as_str(), idx);
    }

    let all_ids: Vec<&str> = steps.iter().map(|s| s.id.as_str()).collect();

    for step in steps {
        for dep in &step.depends_on {
            let Some(&dep_idx) = index_of.get(dep.as_str()) else {
                let suggestion = suggestion_suffix(
                    dep,
                    all_ids.iter().copied().filter(|id| *id != dep.as_str()),
                );
                return Err(SkillforgeError::UnknownStep {
                    reference: dep.clone(),
                    suggestion,
                });
            };
            let step_idx = index_of[step.id.as_str()];
            // Edge direction: dependency -> dependent, so in-degree counts
            // unsatisfied dependencies.
            graph.add_edge(dep_idx, step_idx, ());
        }
    }

    level_group(&graph, steps.len())
}

/// Kahn's-algorithm level grouping (§4.3 steps 2-5). Returns a cycle error
/// naming a concrete cycle path when fewer than `total` nodes are
/// processed before the frontier empties.
fn level_group(graph: &DiGraph<&str, ()>, total: usize) -> Result<Plan> {
    use petgraph::Direction;

    let mut in_degree: HashMap<NodeIndex, usize> = HashMap::new();
    for node in graph.node_indices() {
        in_degree.insert(node, graph.edges_directed(node, Direction::Incoming).count());
    }

    let mut frontier: Vec<NodeIndex> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&n, _)| n)
        .collect();
    frontier.sort_by_key(|n| n.index());

    let mut levels: Vec<Vec<String>> = Vec::new();
    let mut processed = 0usize;

    while !frontier.is_empty() {
        let mut level_ids: Vec<String> = frontier.iter().map(|&n| graph[n].to_string()).collect();
        level_ids.sort();
        levels.push(level_ids);
        processed += frontier.len();

        let mut next_frontier: Vec<NodeIndex> = Vec::new();
        for &node in &frontier {
            for edge in graph.edges_directed(node, Direction::Outgoing) {
                let dependent = edge.target();
                let deg = in_degree.get_mut(&dependent).unwrap();
                *deg -= 1;
                if *deg == 0 {
                    next_frontier.push(dependent);
                }
            }
        }
        next_frontier.sort_by_key(|n| n.index());
        next_frontier.dedup();
        frontier = next_frontier;
    }

    if processed < total {
        return Err(SkillforgeError::Cycle(trace_cycle(graph, &in_degree)));
    }

    Ok(Plan { levels })
}

/// Trace a cycle among the nodes still carrying positive in-degree after
/// the frontier has emptied, reporting it as
/// `step 'A' depends on 'B' depends on ... depends on 'A'`.
fn trace_cycle(graph: &DiGraph<&str, ()>, in_degree: &HashMap<NodeIndex, usize>) -> String {
    use petgraph::Direction;

    let Some(&start) = in_degree.iter().find(|(_, &deg)| deg > 0).map(|(n, _)| n) else {
        return "cycle detected among workflow steps".to_string();
    };

    let mut path = vec![start];
    let mut current = start;
    loop {
        // Follow any remaining dependency edge (incoming, since a step
        // "depends on" the source of its incoming edge).
        let next = graph
            .edges_directed(current, Direction::Incoming)
            .find(|edge| in_degree.get(&edge.source()).copied().unwrap_or(0) > 0)
            .map(|edge| edge.source());
        let Some(next) = next else { break };
        if let Some(cycle_start) = path.iter().position(|&n| n == next) {
            path.push(next);
            let cycle_ids: Vec<&str> = path[cycle_start..].iter().map(|&n| graph[n]).collect();
            return format!("step {}", format_cycle(&cycle_ids));
        }
        path.push(next);
        current = next;
    }

    let cycle_ids: Vec<&str> = path.iter().map(|&n| graph[n]).collect();
    format!("step {}", format_cycle(&cycle_ids))
}

fn format_cycle(ids: &[&str]) -> String {
    ids.iter()
        .map(|id| format!("'{id}'"))
        .collect::<Vec<_>>()
        .join(" depends on ")
}
