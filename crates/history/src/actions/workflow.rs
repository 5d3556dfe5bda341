//! Actions over many elements at once: dragging a selection, pasting a
//! partial graph, duplicating and deleting the selection.

use std::collections::{BTreeMap, BTreeSet};

use graph::{
    unique_label, Comment, CommentId, Connection, GraphStores, PartialGraph, Position, Selection, Step,
    StepId,
};
use tracing::{debug, warn};

use crate::action::{DataAttributes, LazyCell, LazyId, LazyUndoRedoAction, UndoRedoAction};
use crate::HistoryError;

// ---------------------------------------------------------------------------
// Move
// ---------------------------------------------------------------------------

/// Drag a group of steps and comments by a common offset.
#[derive(Debug, Clone)]
pub struct LazyMoveMultipleAction {
    stores: GraphStores,
    step_starts: Vec<(StepId, Position)>,
    comment_starts: Vec<(CommentId, [f64; 2])>,
    cell: LazyCell<Position>,
}

impl LazyMoveMultipleAction {
    /// Start positions are read now, so build this when the drag begins.
    pub fn new(stores: &GraphStores, selection: &Selection, offset: Position) -> Self {
        let step_starts = selection
            .steps
            .iter()
            .filter_map(|id| stores.steps.get(*id).map(|s| (*id, s.position)))
            .collect();
        let comment_starts = selection
            .comments
            .iter()
            .filter_map(|id| stores.comments.get(*id).map(|c| (*id, c.position)))
            .collect();
        Self {
            stores: stores.clone(),
            step_starts,
            comment_starts,
            cell: LazyCell::new(Position::default(), offset),
        }
    }

    pub fn change_offset(&self, offset: Position) -> Result<(), HistoryError> {
        self.cell.set_to(offset, || self.name())?;
        self.move_by(offset);
        Ok(())
    }

    fn move_by(&self, offset: Position) {
        for (id, start) in &self.step_starts {
            self.stores.steps.set_position(*id, start.offset_by(offset));
        }
        for (id, [x, y]) in &self.comment_starts {
            self.stores
                .comments
                .set_position(*id, [x + offset.left, y + offset.top]);
        }
    }
}

impl UndoRedoAction for LazyMoveMultipleAction {
    fn name(&self) -> String {
        "move steps and comments".into()
    }

    fn run(&mut self) {
        self.move_by(self.cell.to());
    }

    fn undo(&mut self) {
        self.move_by(self.cell.from());
    }

    fn data_attributes(&self) -> DataAttributes {
        DataAttributes::from([
            ("steps", self.step_starts.len().to_string()),
            ("comments", self.comment_starts.len().to_string()),
        ])
    }
}

impl LazyUndoRedoAction for LazyMoveMultipleAction {
    fn lazy_id(&self) -> LazyId {
        self.cell.id()
    }

    fn queued(&mut self) {
        self.run();
    }

    fn set_open(&mut self, open: bool) {
        self.cell.set_open(open);
    }

    fn commit(&mut self) {
        self.cell.commit();
    }

    fn is_committed(&self) -> bool {
        self.cell.is_committed()
    }
}

// ---------------------------------------------------------------------------
// Copy
// ---------------------------------------------------------------------------

/// How a partial graph is merged into the stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyOptions {
    /// Give every pasted step and comment a fresh id.  Connections to steps
    /// outside the pasted graph are dropped.
    pub reassign_ids: bool,
    /// Recreate the connections recorded in the steps' `input_connections`.
    pub create_connections: bool,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            reassign_ids: true,
            create_connections: true,
        }
    }
}

/// What a copy actually added, fixed by its first run.
#[derive(Debug, Clone, Default)]
struct Inserted {
    steps: Vec<Step>,
    comments: Vec<Comment>,
    connections: Vec<Connection>,
}

/// Paste a partial graph at an offset.
pub struct CopyIntoWorkflowAction {
    stores: GraphStores,
    data: PartialGraph,
    offset: Position,
    options: CopyOptions,
    inserted: Option<Inserted>,
}

impl CopyIntoWorkflowAction {
    pub fn new(stores: &GraphStores, data: PartialGraph, offset: Position, options: CopyOptions) -> Self {
        Self {
            stores: stores.clone(),
            data,
            offset,
            options,
            inserted: None,
        }
    }

    /// Ids of the steps added, once the action has run.
    pub fn step_ids(&self) -> Vec<StepId> {
        self.inserted
            .iter()
            .flat_map(|i| i.steps.iter().map(|s| s.id))
            .collect()
    }

    /// Ids of the comments added, once the action has run.
    pub fn comment_ids(&self) -> Vec<CommentId> {
        self.inserted
            .iter()
            .flat_map(|i| i.comments.iter().map(|c| c.id))
            .collect()
    }

    /// Work out final ids, positions and connections against the current stores.
    fn prepare(&self) -> Inserted {
        let reassign = self.options.reassign_ids;

        let mut next_step = self.stores.steps.next_id();
        let step_ids: BTreeMap<StepId, StepId> = self
            .data
            .steps
            .keys()
            .map(|id| {
                let new_id = if reassign { next_step } else { *id };
                next_step = next_step.saturating_add(1);
                (*id, new_id)
            })
            .collect();

        let mut steps = Vec::with_capacity(self.data.steps.len());
        let mut connections = Vec::new();
        for (old_id, step) in &self.data.steps {
            let mut step = step.clone();
            step.id = step_ids[old_id];
            step.position = step.position.offset_by(self.offset);
            if reassign {
                for sources in step.input_connections.values_mut() {
                    sources.retain_mut(|source| match step_ids.get(&source.step_id) {
                        Some(new_id) => {
                            source.step_id = *new_id;
                            true
                        }
                        None => false,
                    });
                }
                step.input_connections.retain(|_, sources| !sources.is_empty());
            }
            if self.options.create_connections {
                connections.extend(step.connections());
            }
            steps.push(step);
        }

        let mut next_comment = self.stores.comments.next_id();
        let comments = self
            .data
            .comments
            .iter()
            .map(|comment| {
                let mut comment = comment.clone();
                if reassign {
                    comment.id = next_comment;
                    next_comment = next_comment.saturating_add(1);
                }
                let [x, y] = comment.position;
                comment.position = [x + self.offset.left, y + self.offset.top];
                comment
            })
            .collect();

        Inserted {
            steps,
            comments,
            connections,
        }
    }
}

impl UndoRedoAction for CopyIntoWorkflowAction {
    fn name(&self) -> String {
        "copy into workflow".into()
    }

    fn run(&mut self) {
        let inserted = match &self.inserted {
            Some(inserted) => inserted.clone(),
            None => {
                let prepared = self.prepare();
                self.inserted = Some(prepared.clone());
                prepared
            }
        };

        for step in &inserted.steps {
            if self.stores.steps.contains(step.id) {
                warn!(step_id = step.id, "copy overwrites an existing step");
            }
            self.stores.add_step(step.clone());
        }
        for connection in &inserted.connections {
            self.stores.add_connection(connection.clone());
        }
        for comment in &inserted.comments {
            self.stores.add_comment(comment.clone());
        }
        debug!(
            steps = inserted.steps.len(),
            comments = inserted.comments.len(),
            "partial graph copied"
        );
    }

    fn undo(&mut self) {
        let Some(inserted) = &self.inserted else {
            warn!("undo of a copy that never ran");
            return;
        };
        for comment in &inserted.comments {
            self.stores.remove_comment(comment.id);
        }
        for step in &inserted.steps {
            self.stores.remove_step(step.id);
        }
    }

    fn data_attributes(&self) -> DataAttributes {
        DataAttributes::from([
            ("steps", self.data.steps.len().to_string()),
            ("comments", self.data.comments.len().to_string()),
        ])
    }
}

// ---------------------------------------------------------------------------
// Duplicate
// ---------------------------------------------------------------------------

/// Copy the current selection next to itself.
pub struct DuplicateSelectionAction {
    copy: CopyIntoWorkflowAction,
}

impl DuplicateSelectionAction {
    /// Snapshot the selection now and relabel the copies so every label
    /// stays unique.
    pub fn new(stores: &GraphStores, offset: Position) -> Self {
        let mut data = stores.selection_partial_graph();
        let mut labels = stores.labels();
        for step in data.steps.values_mut() {
            if let Some(label) = &step.label {
                step.label = Some(unique_label(label, &mut labels));
            }
        }
        Self {
            copy: CopyIntoWorkflowAction::new(stores, data, offset, CopyOptions::default()),
        }
    }

    /// A verbatim copy of the selection with its original ids, labels and
    /// positions, used to restore deleted elements.
    pub(crate) fn for_deletion(stores: &GraphStores) -> Self {
        let options = CopyOptions {
            reassign_ids: false,
            create_connections: false,
        };
        Self {
            copy: CopyIntoWorkflowAction::new(stores, stores.selection_partial_graph(), Position::default(), options),
        }
    }

    pub fn step_ids(&self) -> Vec<StepId> {
        self.copy.step_ids()
    }

    pub fn comment_ids(&self) -> Vec<CommentId> {
        self.copy.comment_ids()
    }
}

impl UndoRedoAction for DuplicateSelectionAction {
    fn name(&self) -> String {
        "duplicate selection".into()
    }

    fn run(&mut self) {
        self.copy.run();
    }

    fn undo(&mut self) {
        self.copy.undo();
    }

    fn data_attributes(&self) -> DataAttributes {
        self.copy.data_attributes()
    }
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

/// Delete every selected step and comment.
pub struct DeleteSelectionAction {
    stores: GraphStores,
    restore: DuplicateSelectionAction,
    connections: Vec<Connection>,
    selection: Selection,
}

impl DeleteSelectionAction {
    pub fn new(stores: &GraphStores) -> Self {
        let selection = stores.selection.snapshot();
        let connections: BTreeSet<Connection> = selection
            .steps
            .iter()
            .flat_map(|id| stores.connections.for_step(*id))
            .collect();
        Self {
            stores: stores.clone(),
            restore: DuplicateSelectionAction::for_deletion(stores),
            connections: connections.into_iter().collect(),
            selection,
        }
    }

    /// Every connection that touched a deleted step.
    pub(crate) fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub(crate) fn step_ids(&self) -> &BTreeSet<StepId> {
        &self.selection.steps
    }
}

impl UndoRedoAction for DeleteSelectionAction {
    fn name(&self) -> String {
        "delete selection".into()
    }

    fn run(&mut self) {
        for id in &self.selection.comments {
            self.stores.remove_comment(*id);
        }
        for id in &self.selection.steps {
            self.stores.remove_step(*id);
        }
        self.stores.selection.clear();
    }

    fn undo(&mut self) {
        self.restore.run();
        for connection in &self.connections {
            self.stores.add_connection(connection.clone());
        }
        self.stores.selection.restore(self.selection.clone());
    }

    fn data_attributes(&self) -> DataAttributes {
        DataAttributes::from([
            ("steps", self.selection.steps.len().to_string()),
            ("comments", self.selection.comments.len().to_string()),
            ("connections", self.connections.len().to_string()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UndoRedoStore;
    use graph::{validate_graph, StepType};

    /// in(0) → cat(1) → sort(2), plus a text comment 0.
    fn pipeline() -> GraphStores {
        let stores = GraphStores::new();
        let steps = [
            (StepType::DataInput, "input", "reads"),
            (StepType::Tool, "cat", "joined"),
            (StepType::Tool, "sort", "sorted"),
        ];
        for (id, (step_type, name, label)) in steps.into_iter().enumerate() {
            let mut step = Step::new(step_type, name).with_label(label).at(id as f64 * 200.0, 0.0);
            step.id = id as StepId;
            stores.add_step(step);
        }
        stores.add_connection(Connection::new(0, "output", 1, "input1"));
        stores.add_connection(Connection::new(1, "out_file1", 2, "input"));
        let mut comment = Comment::text("cleanup");
        comment.position = [0.0, 100.0];
        stores.add_comment(comment);
        stores
    }

    #[test]
    fn move_multiple_coalesces_into_one_entry() {
        let stores = pipeline();
        let before = stores.snapshot();
        let mut history = UndoRedoStore::default();

        let drag = LazyMoveMultipleAction::new(&stores, &Selection::of([1, 2], [0]), Position::new(5.0, 0.0));
        history.apply_lazy_action(drag.clone());
        drag.change_offset(Position::new(20.0, 10.0)).unwrap();
        drag.change_offset(Position::new(40.0, 30.0)).unwrap();
        history.flush_lazy_action();

        assert_eq!(history.undo_len(), 1);
        assert_eq!(stores.steps.get(2).unwrap().position, Position::new(440.0, 30.0));
        assert_eq!(stores.comments.get(0).unwrap().position, [40.0, 130.0]);
        assert_eq!(stores.steps.get(0).unwrap().position, Position::new(0.0, 0.0));

        history.undo();
        assert_eq!(stores.snapshot(), before);
        assert!(drag.change_offset(Position::new(1.0, 1.0)).is_err());
    }

    #[test]
    fn copy_reassigns_ids_and_keeps_internal_connections() {
        let stores = pipeline();
        stores.selection.restore(Selection::of([0, 1], []));
        let data = stores.selection_partial_graph();
        let mut history = UndoRedoStore::default();

        history.apply_action(CopyIntoWorkflowAction::new(
            &stores,
            data,
            Position::new(0.0, 300.0),
            CopyOptions::default(),
        ));

        assert_eq!(stores.steps.len(), 5);
        let pasted = stores.steps.get(4).unwrap();
        assert_eq!(pasted.position, Position::new(200.0, 300.0));
        assert_eq!(pasted.input_connections["input1"][0].step_id, 3);
        assert_eq!(stores.connections.len(), 3);
        validate_graph(&stores.snapshot()).expect_err("copied labels collide");
    }

    #[test]
    fn copy_drops_connections_to_steps_outside_the_copy() {
        let stores = pipeline();
        stores.selection.restore(Selection::of([2], []));
        let mut data = stores.selection_partial_graph();
        // Put the external edge back in, as a clipboard from elsewhere might.
        data.steps.get_mut(&2).unwrap().input_connections = stores.steps.get(2).unwrap().input_connections;

        let mut copy = CopyIntoWorkflowAction::new(&stores, data, Position::default(), CopyOptions::default());
        copy.run();
        let pasted = stores.steps.get(copy.step_ids()[0]).unwrap();
        assert!(pasted.input_connections.is_empty());
        assert_eq!(stores.connections.len(), 2);
    }

    #[test]
    fn copy_undo_removes_exactly_what_it_added_and_redo_reuses_ids() {
        let stores = pipeline();
        let before = stores.snapshot();
        let data = stores.to_document();
        let mut history = UndoRedoStore::default();

        history.apply_action(CopyIntoWorkflowAction::new(
            &stores,
            data,
            Position::new(0.0, 500.0),
            CopyOptions::default(),
        ));
        let after = stores.snapshot();

        history.undo();
        assert_eq!(stores.snapshot(), before);
        history.redo();
        assert_eq!(stores.snapshot(), after);
    }

    #[test]
    fn duplicate_relabels_every_copy() {
        let stores = pipeline();
        stores.selection.restore(Selection::of([0, 1, 2], [0]));
        let mut history = UndoRedoStore::default();

        history.apply_action(DuplicateSelectionAction::new(&stores, Position::new(0.0, 200.0)));

        let labels = stores.labels();
        for label in ["reads", "joined", "sorted", "reads 2", "joined 2", "sorted 2"] {
            assert!(labels.contains(label), "missing {label}");
        }
        assert_eq!(stores.comments.len(), 2);
        validate_graph(&stores.snapshot()).expect("duplicated graph is valid");
    }

    #[test]
    fn delete_selection_round_trips() {
        let stores = pipeline();
        stores.selection.restore(Selection {
            active_step: Some(1),
            ..Selection::of([1], [0])
        });
        let before = stores.snapshot();
        let mut history = UndoRedoStore::default();

        history.apply_action(DeleteSelectionAction::new(&stores));
        assert_eq!(stores.steps.len(), 2);
        assert!(stores.comments.is_empty());
        assert!(stores.connections.is_empty());
        assert!(stores.selection.snapshot().is_empty());
        assert_eq!(stores.selection.active_step(), None);
        validate_graph(&stores.snapshot()).expect("no dangling connections");

        history.undo();
        assert_eq!(stores.snapshot(), before);

        history.redo();
        assert_eq!(stores.steps.len(), 2);
        history.undo();
        assert_eq!(stores.snapshot(), before);
    }

    #[test]
    fn delete_of_empty_selection_changes_nothing() {
        let stores = pipeline();
        let before = stores.snapshot();
        let mut history = UndoRedoStore::default();

        history.apply_action(DeleteSelectionAction::new(&stores));
        assert_eq!(stores.snapshot(), before);
        history.undo();
        assert_eq!(stores.snapshot(), before);
    }
}
