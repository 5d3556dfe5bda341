//! Actions that only change which elements are selected.

use graph::{CommentId, GraphStores, Selection, SelectionStore, StepId};

use crate::action::{DataAttributes, UndoRedoAction};

fn set_membership(store: &SelectionStore, steps: &[StepId], comments: &[CommentId], selected: bool) {
    for id in steps {
        store.set_step_selected(*id, selected);
    }
    for id in comments {
        store.set_comment_selected(*id, selected);
    }
}

fn count_attributes(steps: &[StepId], comments: &[CommentId]) -> DataAttributes {
    DataAttributes::from([
        ("steps", steps.len().to_string()),
        ("comments", comments.len().to_string()),
    ])
}

// ---------------------------------------------------------------------------
// Add / remove
// ---------------------------------------------------------------------------

/// Select a fixed set of steps and comments.
pub struct AddToSelectionAction {
    store: SelectionStore,
    steps: Vec<StepId>,
    comments: Vec<CommentId>,
}

impl AddToSelectionAction {
    pub fn new(stores: &GraphStores, selection: &Selection) -> Self {
        Self {
            store: stores.selection.clone(),
            steps: selection.steps.iter().copied().collect(),
            comments: selection.comments.iter().copied().collect(),
        }
    }
}

impl UndoRedoAction for AddToSelectionAction {
    fn name(&self) -> String {
        "add to selection".into()
    }

    fn run(&mut self) {
        set_membership(&self.store, &self.steps, &self.comments, true);
    }

    fn undo(&mut self) {
        set_membership(&self.store, &self.steps, &self.comments, false);
    }

    fn data_attributes(&self) -> DataAttributes {
        count_attributes(&self.steps, &self.comments)
    }
}

/// Deselect a fixed set of steps and comments.
pub struct RemoveFromSelectionAction {
    store: SelectionStore,
    steps: Vec<StepId>,
    comments: Vec<CommentId>,
}

impl RemoveFromSelectionAction {
    pub fn new(stores: &GraphStores, selection: &Selection) -> Self {
        Self {
            store: stores.selection.clone(),
            steps: selection.steps.iter().copied().collect(),
            comments: selection.comments.iter().copied().collect(),
        }
    }
}

impl UndoRedoAction for RemoveFromSelectionAction {
    fn name(&self) -> String {
        "remove from selection".into()
    }

    fn run(&mut self) {
        set_membership(&self.store, &self.steps, &self.comments, false);
    }

    fn undo(&mut self) {
        set_membership(&self.store, &self.steps, &self.comments, true);
    }

    fn data_attributes(&self) -> DataAttributes {
        count_attributes(&self.steps, &self.comments)
    }
}

// ---------------------------------------------------------------------------
// Clear
// ---------------------------------------------------------------------------

/// Deselect everything.  Undo restores the selection as it was when the
/// action was built, not whatever is selected at undo time.
pub struct ClearSelectionAction {
    store: SelectionStore,
    snapshot: Selection,
}

impl ClearSelectionAction {
    pub fn new(stores: &GraphStores) -> Self {
        Self {
            store: stores.selection.clone(),
            snapshot: stores.selection.snapshot(),
        }
    }
}

impl UndoRedoAction for ClearSelectionAction {
    fn name(&self) -> String {
        "clear selection".into()
    }

    fn run(&mut self) {
        self.store.clear();
    }

    fn undo(&mut self) {
        self.store.restore(self.snapshot.clone());
    }
}

// ---------------------------------------------------------------------------
// Toggle
// ---------------------------------------------------------------------------

pub struct ToggleStepSelectedAction {
    store: SelectionStore,
    step_id: StepId,
    was_selected: bool,
}

impl ToggleStepSelectedAction {
    pub fn new(stores: &GraphStores, step_id: StepId) -> Self {
        Self {
            store: stores.selection.clone(),
            step_id,
            was_selected: stores.selection.is_step_selected(step_id),
        }
    }
}

impl UndoRedoAction for ToggleStepSelectedAction {
    fn name(&self) -> String {
        if self.was_selected {
            "deselect step".into()
        } else {
            "select step".into()
        }
    }

    fn run(&mut self) {
        self.store.set_step_selected(self.step_id, !self.was_selected);
    }

    fn undo(&mut self) {
        self.store.set_step_selected(self.step_id, self.was_selected);
    }
}

pub struct ToggleCommentSelectedAction {
    store: SelectionStore,
    comment_id: CommentId,
    was_selected: bool,
}

impl ToggleCommentSelectedAction {
    pub fn new(stores: &GraphStores, comment_id: CommentId) -> Self {
        Self {
            store: stores.selection.clone(),
            comment_id,
            was_selected: stores.selection.is_comment_selected(comment_id),
        }
    }
}

impl UndoRedoAction for ToggleCommentSelectedAction {
    fn name(&self) -> String {
        if self.was_selected {
            "deselect comment".into()
        } else {
            "select comment".into()
        }
    }

    fn run(&mut self) {
        self.store.set_comment_selected(self.comment_id, !self.was_selected);
    }

    fn undo(&mut self) {
        self.store.set_comment_selected(self.comment_id, self.was_selected);
    }
}
