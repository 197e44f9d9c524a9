//! Session spawn forest.
//!
//! Sessions reference their parent by id. The source never checks that these
//! links form a forest, so the arena drops links to unknown parents and
//! breaks any cycle it finds before exposing adjacency.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnNode {
    pub session_id: String,
    pub parent_session_id: Option<String>,
    pub is_agent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokenEdge {
    pub parent_session_id: String,
    pub child_session_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct SpawnForest {
    nodes: Vec<SpawnNode>,
    index: HashMap<String, usize>,
    parent: Vec<Option<usize>>,
    broken: Vec<BrokenEdge>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    New,
    OnPath,
    Done,
}

impl SpawnForest {
    pub fn build(mut nodes: Vec<SpawnNode>) -> Self {
        nodes.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        nodes.dedup_by(|a, b| a.session_id == b.session_id);
        let index: HashMap<String, usize> = nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (node.session_id.clone(), idx))
            .collect();
        let parent: Vec<Option<usize>> = nodes
            .iter()
            .map(|node| {
                node.parent_session_id
                    .as_deref()
                    .and_then(|id| index.get(id).copied())
            })
            .collect();
        let mut forest = Self {
            nodes,
            index,
            parent,
            broken: Vec::new(),
        };
        forest.break_cycles();
        forest
    }

    /// Each node has at most one parent, so every cycle is found by walking
    /// parent links; the link that closes the loop is discarded.
    fn break_cycles(&mut self) {
        let mut state = vec![Visit::New; self.nodes.len()];
        for start in 0..self.nodes.len() {
            if state[start] != Visit::New {
                continue;
            }
            let mut path: Vec<usize> = Vec::new();
            let mut current = Some(start);
            while let Some(idx) = current {
                match state[idx] {
                    Visit::Done => break,
                    Visit::OnPath => {
                        if let Some(&closing) = path.last() {
                            self.broken.push(BrokenEdge {
                                parent_session_id: self.nodes[idx].session_id.clone(),
                                child_session_id: self.nodes[closing].session_id.clone(),
                            });
                            self.parent[closing] = None;
                        }
                        break;
                    }
                    Visit::New => {
                        state[idx] = Visit::OnPath;
                        path.push(idx);
                        current = self.parent[idx];
                    }
                }
            }
            for idx in path {
                state[idx] = Visit::Done;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, session_id: &str) -> Option<&SpawnNode> {
        self.index.get(session_id).map(|idx| &self.nodes[*idx])
    }

    pub fn parent_of(&self, session_id: &str) -> Option<&SpawnNode> {
        let idx = *self.index.get(session_id)?;
        self.parent[idx].map(|parent| &self.nodes[parent])
    }

    pub fn broken_edges(&self) -> &[BrokenEdge] {
        &self.broken
    }

    pub fn roots(&self) -> Vec<&SpawnNode> {
        self.nodes
            .iter()
            .zip(&self.parent)
            .filter(|(_, parent)| parent.is_none())
            .map(|(node, _)| node)
            .collect()
    }

    /// Parent/child pairs of the acyclic forest, ordered by child id.
    pub fn edges(&self) -> impl Iterator<Item = (&SpawnNode, &SpawnNode)> {
        self.parent
            .iter()
            .enumerate()
            .filter_map(|(child, parent)| {
                parent.map(|parent| (&self.nodes[parent], &self.nodes[child]))
            })
    }

    pub fn children(&self, session_id: &str) -> Vec<&SpawnNode> {
        let Some(&target) = self.index.get(session_id) else {
            return Vec::new();
        };
        self.parent
            .iter()
            .enumerate()
            .filter(|(_, parent)| **parent == Some(target))
            .map(|(child, _)| &self.nodes[child])
            .collect()
    }

    /// Every session spawned, directly or transitively, from `session_id`.
    pub fn descendants(&self, session_id: &str) -> Vec<&SpawnNode> {
        let Some(&root) = self.index.get(session_id) else {
            return Vec::new();
        };
        let mut adjacency: HashMap<usize, Vec<usize>> = HashMap::new();
        for (child, parent) in self.parent.iter().enumerate() {
            if let Some(parent) = parent {
                adjacency.entry(*parent).or_default().push(child);
            }
        }
        let mut result = Vec::new();
        let mut stack = vec![root];
        while let Some(idx) = stack.pop() {
            if let Some(children) = adjacency.get(&idx) {
                for child in children.iter().rev() {
                    result.push(&self.nodes[*child]);
                    stack.push(*child);
                }
            }
        }
        result
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffDirection {
    HumanToAgent,
    AgentToHuman,
    SameType,
}

impl HandoffDirection {
    pub fn classify(parent_is_agent: bool, child_is_agent: bool) -> Self {
        match (parent_is_agent, child_is_agent) {
            (false, true) => HandoffDirection::HumanToAgent,
            (true, false) => HandoffDirection::AgentToHuman,
            _ => HandoffDirection::SameType,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub tool_calls: u64,
    pub errors: u64,
}

impl SessionOutcome {
    pub fn error_rate(&self) -> f64 {
        if self.tool_calls == 0 {
            0.0
        } else {
            self.errors as f64 / self.tool_calls as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureHandoff {
    pub parent_session_id: String,
    pub child_session_id: String,
    pub direction: HandoffDirection,
    pub child_tool_calls: u64,
    pub child_errors: u64,
    pub child_error_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffSummary {
    pub direction: HandoffDirection,
    pub pairs: u64,
    pub child_errors: u64,
    pub mean_error_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandoffReport {
    pub handoffs: Vec<FailureHandoff>,
    pub summary: Vec<HandoffSummary>,
    pub broken_edges: Vec<BrokenEdge>,
}

/// Classifies every parent->child spawn accepted by `include` and attaches
/// the child's error outcome. Children without tool calls report zero.
pub fn detect_failure_handoffs<F>(
    forest: &SpawnForest,
    outcomes: &HashMap<String, SessionOutcome>,
    include: F,
) -> HandoffReport
where
    F: Fn(&SpawnNode) -> bool,
{
    let mut handoffs: Vec<FailureHandoff> = forest
        .edges()
        .filter(|(_, child)| include(child))
        .map(|(parent, child)| {
            let outcome = outcomes
                .get(&child.session_id)
                .copied()
                .unwrap_or_default();
            FailureHandoff {
                parent_session_id: parent.session_id.clone(),
                child_session_id: child.session_id.clone(),
                direction: HandoffDirection::classify(parent.is_agent, child.is_agent),
                child_tool_calls: outcome.tool_calls,
                child_errors: outcome.errors,
                child_error_rate: outcome.error_rate(),
            }
        })
        .collect();

    let mut grouped: BTreeMap<HandoffDirection, (u64, u64, f64)> = BTreeMap::new();
    for handoff in &handoffs {
        let entry = grouped.entry(handoff.direction).or_default();
        entry.0 += 1;
        entry.1 += handoff.child_errors;
        entry.2 += handoff.child_error_rate;
    }
    let summary = grouped
        .into_iter()
        .map(|(direction, (pairs, child_errors, rate_sum))| HandoffSummary {
            direction,
            pairs,
            child_errors,
            mean_error_rate: rate_sum / pairs as f64,
        })
        .collect();

    handoffs.sort_by(|a, b| {
        b.child_error_rate
            .partial_cmp(&a.child_error_rate)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.child_errors.cmp(&a.child_errors))
            .then_with(|| a.child_session_id.cmp(&b.child_session_id))
    });

    HandoffReport {
        handoffs,
        summary,
        broken_edges: forest.broken_edges().to_vec(),
    }
}
