//! Graph validation: run this after loading a document or in tests after
//! every edit.
//!
//! Rules enforced:
//! 1. Non-null step labels must be unique.
//! 2. Every connection must reference existing steps on both ends.
//! 3. Each step's `input_connections` must mirror the connection store.
//! 4. The selection may only name existing steps and comments.
//! 5. The directed graph must be acyclic (topological sort must succeed).
//!
//! Returns the step ids in topological order on success.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use crate::model::{Connection, GraphSnapshot, StepId};
use crate::GraphError;

/// Validate a graph snapshot and return its steps in topological order.
///
/// # Errors
/// - [`GraphError::DuplicateLabel`] if two steps share a label.
/// - [`GraphError::UnknownStepReference`] if a connection dangles.
/// - [`GraphError::ConnectionMismatch`] if a step disagrees with the connection store.
/// - [`GraphError::UnknownSelection`] if the selection names a missing element.
/// - [`GraphError::CycleDetected`] if the graph is not acyclic.
pub fn validate_graph(graph: &GraphSnapshot) -> Result<Vec<StepId>, GraphError> {
    // -----------------------------------------------------------------------
    // 1. Labels
    // -----------------------------------------------------------------------
    let mut labels: HashSet<&str> = HashSet::new();
    for step in graph.steps.values() {
        if let Some(label) = step.label.as_deref() {
            if !labels.insert(label) {
                return Err(GraphError::DuplicateLabel(label.to_owned()));
            }
        }
    }

    // -----------------------------------------------------------------------
    // 2. Connection endpoints
    // -----------------------------------------------------------------------
    for connection in &graph.connections {
        if !graph.steps.contains_key(&connection.output.step_id) {
            return Err(GraphError::UnknownStepReference {
                step_id: connection.output.step_id,
                side: "output",
            });
        }
        if !graph.steps.contains_key(&connection.input.step_id) {
            return Err(GraphError::UnknownStepReference {
                step_id: connection.input.step_id,
                side: "input",
            });
        }
    }

    // -----------------------------------------------------------------------
    // 3. input_connections mirror the store
    // -----------------------------------------------------------------------
    let from_store: BTreeSet<Connection> = graph.connections.iter().cloned().collect();
    let from_steps: BTreeSet<Connection> = graph.steps.values().flat_map(|s| s.connections()).collect();
    if let Some(connection) = from_steps.symmetric_difference(&from_store).next() {
        return Err(GraphError::ConnectionMismatch {
            step_id: connection.input.step_id,
            input_name: connection.input.input_name.clone(),
        });
    }

    // -----------------------------------------------------------------------
    // 4. Selection
    // -----------------------------------------------------------------------
    let selected_steps = graph.selection.steps.iter().chain(graph.selection.active_step.iter());
    for id in selected_steps {
        if !graph.steps.contains_key(id) {
            return Err(GraphError::UnknownSelection { kind: "step", id: *id });
        }
    }
    for id in &graph.selection.comments {
        if !graph.comments.contains_key(id) {
            return Err(GraphError::UnknownSelection { kind: "comment", id: *id });
        }
    }

    // -----------------------------------------------------------------------
    // 5. Topological sort (Kahn's algorithm)
    // -----------------------------------------------------------------------
    let mut adjacency: BTreeMap<StepId, Vec<StepId>> = BTreeMap::new();
    let mut in_degree: BTreeMap<StepId, usize> = BTreeMap::new();

    for id in graph.steps.keys() {
        adjacency.entry(*id).or_default();
        in_degree.entry(*id).or_insert(0);
    }

    for connection in &graph.connections {
        adjacency
            .entry(connection.output.step_id)
            .or_default()
            .push(connection.input.step_id);
        *in_degree.entry(connection.input.step_id).or_insert(0) += 1;
    }

    // Seed the queue with steps that have no incoming connections.
    let mut queue: VecDeque<StepId> = in_degree
        .iter()
        .filter(|(_, &d)| d == 0)
        .map(|(&id, _)| id)
        .collect();

    let mut sorted: Vec<StepId> = Vec::with_capacity(graph.steps.len());

    while let Some(step_id) = queue.pop_front() {
        sorted.push(step_id);

        if let Some(neighbours) = adjacency.get(&step_id) {
            for &neighbour in neighbours {
                let deg = in_degree.entry(neighbour).or_insert(0);
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(neighbour);
                }
            }
        }
    }

    if sorted.len() != graph.steps.len() {
        return Err(GraphError::CycleDetected);
    }

    Ok(sorted)
}
