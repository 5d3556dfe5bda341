//! `GraphStores`: the four stores bundled together.
//!
//! Anything that touches more than one store goes through here, which is
//! what keeps the cross-store invariants: a connection never outlives
//! either of its steps, a step's `input_connections` mirror the
//! connection store, and removed elements leave the selection.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, warn};

use crate::model::{
    Bounds, Comment, CommentId, Connection, GraphSnapshot, PartialGraph, Position, Step, StepId,
};
use crate::store::{CommentStore, ConnectionStore, SelectionStore, StepStore};

/// Handles to every store of one graph instance.
#[derive(Debug, Clone, Default)]
pub struct GraphStores {
    pub steps: StepStore,
    pub connections: ConnectionStore,
    pub comments: CommentStore,
    pub selection: SelectionStore,
}

impl GraphStores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build stores holding the graph described by `document`.
    pub fn from_document(document: &PartialGraph) -> Self {
        let stores = Self::new();
        stores.load(document);
        stores
    }

    // -----------------------------------------------------------------------
    // Steps
    // -----------------------------------------------------------------------

    /// Insert `step` without any connections.  Its `input_connections` are
    /// rebuilt as connections are added.
    pub fn add_step(&self, mut step: Step) {
        step.input_connections.clear();
        self.steps.add(step);
    }

    /// Remove a step together with every connection touching it.
    ///
    /// Returns the removed step and connections so callers can restore them.
    pub fn remove_step(&self, id: StepId) -> Option<(Step, Vec<Connection>)> {
        let connections = self.connections.for_step(id);
        for connection in &connections {
            self.remove_connection(connection);
        }
        self.selection.forget_step(id);
        let step = self.steps.remove(id)?;
        debug!(step_id = id, removed_connections = connections.len(), "step removed");
        Some((step, connections))
    }

    // -----------------------------------------------------------------------
    // Connections
    // -----------------------------------------------------------------------

    /// Add `connection`, replacing whatever ended on the same input.
    ///
    /// Connections referring to a missing step are refused, since they
    /// would dangle.
    pub fn add_connection(&self, connection: Connection) -> bool {
        if !self.steps.contains(connection.input.step_id) || !self.steps.contains(connection.output.step_id) {
            warn!(?connection, "refusing connection to a missing step");
            return false;
        }
        self.steps.attach(&connection);
        if let Some(previous) = self.connections.add(connection.clone()) {
            if previous != connection {
                self.steps.detach(&previous);
            }
        }
        true
    }

    pub fn remove_connection(&self, connection: &Connection) -> bool {
        let removed = self.connections.remove(connection);
        if removed {
            self.steps.detach(connection);
        }
        removed
    }

    // -----------------------------------------------------------------------
    // Comments
    // -----------------------------------------------------------------------

    pub fn add_comment(&self, comment: Comment) {
        self.comments.add(comment);
    }

    pub fn remove_comment(&self, id: CommentId) -> Option<Comment> {
        self.selection.forget_comment(id);
        self.comments.remove(id)
    }

    // -----------------------------------------------------------------------
    // Whole-graph operations
    // -----------------------------------------------------------------------

    /// Every label in use by a step.
    pub fn labels(&self) -> HashSet<String> {
        self.steps.labels()
    }

    /// Empty all four stores and reset id allocation.
    pub fn clear(&self) {
        self.connections.clear();
        self.steps.clear();
        self.comments.clear();
        self.selection.restore(Default::default());
    }

    /// Replace the current graph with `document`.
    pub fn load(&self, document: &PartialGraph) {
        self.clear();
        for step in document.steps.values() {
            self.add_step(step.clone());
        }
        for step in document.steps.values() {
            for connection in step.connections() {
                self.add_connection(connection);
            }
        }
        for comment in &document.comments {
            self.add_comment(comment.clone());
        }
        debug!(
            steps = self.steps.len(),
            connections = self.connections.len(),
            comments = self.comments.len(),
            "graph loaded"
        );
    }

    /// The whole graph as a serializable document.
    pub fn to_document(&self) -> PartialGraph {
        PartialGraph {
            steps: self.steps.all(),
            comments: self.comments.all().into_values().collect(),
        }
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            steps: self.steps.all(),
            connections: self.connections.all(),
            comments: self.comments.all(),
            selection: self.selection.snapshot(),
        }
    }

    // -----------------------------------------------------------------------
    // Selection helpers
    // -----------------------------------------------------------------------

    /// Serialize the selected steps and comments.
    ///
    /// Only connections between two selected steps are kept in the
    /// steps' `input_connections`.
    pub fn selection_partial_graph(&self) -> PartialGraph {
        let selection = self.selection.snapshot();
        let mut steps: BTreeMap<StepId, Step> = BTreeMap::new();

        for id in &selection.steps {
            match self.steps.get(*id) {
                Some(step) => {
                    steps.insert(*id, step);
                }
                None => warn!(step_id = id, "selected step does not exist"),
            }
        }
        for step in steps.values_mut() {
            for sources in step.input_connections.values_mut() {
                sources.retain(|o| selection.steps.contains(&o.step_id));
            }
            step.input_connections.retain(|_, sources| !sources.is_empty());
        }

        let comments = selection
            .comments
            .iter()
            .filter_map(|id| self.comments.get(*id))
            .collect();

        PartialGraph { steps, comments }
    }

    /// Box around every selected element, or `None` for an empty selection.
    ///
    /// Steps contribute their anchor position; comments their full rectangle.
    pub fn selection_bounds(&self) -> Option<Bounds> {
        let selection = self.selection.snapshot();
        let mut points = Vec::new();

        for id in &selection.steps {
            if let Some(step) = self.steps.get(*id) {
                points.push(step.position);
            }
        }
        for id in &selection.comments {
            if let Some(comment) = self.comments.get(*id) {
                let [x, y] = comment.position;
                let [w, h] = comment.size;
                points.push(Position::new(x, y));
                points.push(Position::new(x + w, y + h));
            }
        }

        let (first, rest) = points.split_first()?;
        let mut bounds = Bounds::at(*first);
        for point in rest {
            bounds.include(*point);
        }
        Some(bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OutputTerminal, Selection, StepType};

    fn stores_with_chain() -> GraphStores {
        // 0 → 1 → 2
        let stores = GraphStores::new();
        for id in 0..3 {
            let mut step = Step::new(StepType::Tool, format!("tool {id}")).at(id as f64 * 100.0, 0.0);
            step.id = id;
            stores.add_step(step);
        }
        stores.add_connection(Connection::new(0, "out", 1, "in"));
        stores.add_connection(Connection::new(1, "out", 2, "in"));
        stores
    }

    #[test]
    fn adding_connection_updates_input_connections() {
        let stores = stores_with_chain();
        let step = stores.steps.get(1).unwrap();
        assert_eq!(
            step.input_connections["in"],
            vec![OutputTerminal { step_id: 0, output_name: "out".into() }]
        );
    }

    #[test]
    fn replacing_connection_detaches_previous_source() {
        let stores = stores_with_chain();
        stores.add_connection(Connection::new(0, "out", 2, "in"));
        let step = stores.steps.get(2).unwrap();
        assert_eq!(step.input_connections["in"].len(), 1);
        assert_eq!(step.input_connections["in"][0].step_id, 0);
        assert_eq!(stores.connections.len(), 2);
    }

    #[test]
    fn connection_to_missing_step_is_refused() {
        let stores = stores_with_chain();
        assert!(!stores.add_connection(Connection::new(0, "out", 42, "in")));
        assert_eq!(stores.connections.len(), 2);
    }

    #[test]
    fn removing_step_removes_its_connections() {
        let stores = stores_with_chain();
        let (_, removed) = stores.remove_step(1).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(stores.connections.is_empty());
        assert!(stores.steps.get(2).unwrap().input_connections.is_empty());
    }

    #[test]
    fn selection_partial_graph_keeps_only_internal_connections() {
        let stores = stores_with_chain();
        stores.selection.restore(Selection::of([1, 2], []));

        let partial = stores.selection_partial_graph();
        assert_eq!(partial.steps.len(), 2);
        assert!(partial.steps[&1].input_connections.is_empty());
        assert_eq!(partial.steps[&2].input_connections["in"][0].step_id, 1);
    }

    #[test]
    fn document_round_trips_through_load() {
        let stores = stores_with_chain();
        let reloaded = GraphStores::from_document(&stores.to_document());
        assert_eq!(reloaded.snapshot(), stores.snapshot());
    }

    #[test]
    fn selection_bounds_cover_steps_and_comments() {
        let stores = stores_with_chain();
        let mut comment = Comment::text("note");
        comment.id = 0;
        comment.position = [250.0, 100.0];
        comment.size = [50.0, 50.0];
        stores.add_comment(comment);
        stores.selection.restore(Selection::of([0], [0]));

        let bounds = stores.selection_bounds().unwrap();
        assert_eq!(bounds.left, 0.0);
        assert_eq!(bounds.right, 300.0);
        assert_eq!(bounds.bottom, 150.0);
        assert!(GraphStores::new().selection_bounds().is_none());
    }
}
