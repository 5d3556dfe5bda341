//! Actions on free-floating comments.

use graph::{Comment, CommentColor, CommentData, CommentId, CommentStore, GraphStores};

use crate::action::{DataAttributes, LazyCell, LazyId, LazyUndoRedoAction, UndoRedoAction};
use crate::HistoryError;

fn comment_type(comment: &Comment) -> &'static str {
    match comment.data {
        CommentData::Text { .. } => "text",
        CommentData::Markdown { .. } => "markdown",
        CommentData::Frame { .. } => "frame",
        CommentData::Freehand { .. } => "freehand",
    }
}

// ---------------------------------------------------------------------------
// Add / delete
// ---------------------------------------------------------------------------

/// Place a new comment.  The id is allocated on the first run and reused
/// by every redo.
pub struct AddCommentAction {
    stores: GraphStores,
    comment: Comment,
    allocated: bool,
}

impl AddCommentAction {
    pub fn new(stores: &GraphStores, comment: &Comment) -> Self {
        Self {
            stores: stores.clone(),
            comment: comment.clone(),
            allocated: false,
        }
    }

    /// Id of the comment, once the action has run.
    pub fn comment_id(&self) -> Option<CommentId> {
        self.allocated.then_some(self.comment.id)
    }
}

impl UndoRedoAction for AddCommentAction {
    fn name(&self) -> String {
        format!("add {} comment", comment_type(&self.comment))
    }

    fn run(&mut self) {
        if !self.allocated {
            self.comment.id = self.stores.comments.next_id();
            self.allocated = true;
        }
        self.stores.add_comment(self.comment.clone());
    }

    fn undo(&mut self) {
        self.stores.remove_comment(self.comment.id);
    }

    fn data_attributes(&self) -> DataAttributes {
        DataAttributes::from([("type", comment_type(&self.comment).to_owned())])
    }
}

pub struct DeleteCommentAction {
    stores: GraphStores,
    comment: Comment,
    was_selected: bool,
}

impl DeleteCommentAction {
    pub fn new(stores: &GraphStores, comment: &Comment) -> Self {
        Self {
            stores: stores.clone(),
            comment: comment.clone(),
            was_selected: stores.selection.is_comment_selected(comment.id),
        }
    }
}

impl UndoRedoAction for DeleteCommentAction {
    fn name(&self) -> String {
        format!("delete {} comment", comment_type(&self.comment))
    }

    fn run(&mut self) {
        self.stores.remove_comment(self.comment.id);
    }

    fn undo(&mut self) {
        self.stores.add_comment(self.comment.clone());
        if self.was_selected {
            self.stores.selection.set_comment_selected(self.comment.id, true);
        }
    }
}

/// Remove every freehand drawing from the canvas.
pub struct RemoveAllFreehandCommentsAction {
    stores: GraphStores,
    removed: Vec<Comment>,
    selected: Vec<CommentId>,
}

impl RemoveAllFreehandCommentsAction {
    pub fn new(stores: &GraphStores) -> Self {
        let removed: Vec<Comment> = stores
            .comments
            .all()
            .into_values()
            .filter(|c| c.data.is_freehand())
            .collect();
        let selected = removed
            .iter()
            .map(|c| c.id)
            .filter(|id| stores.selection.is_comment_selected(*id))
            .collect();
        Self {
            stores: stores.clone(),
            removed,
            selected,
        }
    }
}

impl UndoRedoAction for RemoveAllFreehandCommentsAction {
    fn name(&self) -> String {
        "remove all freehand comments".into()
    }

    fn run(&mut self) {
        for comment in &self.removed {
            self.stores.remove_comment(comment.id);
        }
    }

    fn undo(&mut self) {
        for comment in &self.removed {
            self.stores.add_comment(comment.clone());
        }
        for id in &self.selected {
            self.stores.selection.set_comment_selected(*id, true);
        }
    }

    fn data_attributes(&self) -> DataAttributes {
        DataAttributes::from([("comments", self.removed.len().to_string())])
    }
}

// ---------------------------------------------------------------------------
// Color
// ---------------------------------------------------------------------------

pub struct ChangeColorAction {
    comments: CommentStore,
    comment_id: CommentId,
    from: CommentColor,
    to: CommentColor,
}

impl ChangeColorAction {
    pub fn new(stores: &GraphStores, comment: &Comment, color: CommentColor) -> Self {
        Self {
            comments: stores.comments.clone(),
            comment_id: comment.id,
            from: comment.color,
            to: color,
        }
    }
}

impl UndoRedoAction for ChangeColorAction {
    fn name(&self) -> String {
        "change comment color".into()
    }

    fn run(&mut self) {
        self.comments.set_color(self.comment_id, self.to);
    }

    fn undo(&mut self) {
        self.comments.set_color(self.comment_id, self.from);
    }
}

// ---------------------------------------------------------------------------
// Lazy edits
// ---------------------------------------------------------------------------

/// One coalescing edit of a single comment field.
#[derive(Debug, Clone)]
struct CommentEdit<T> {
    comments: CommentStore,
    comment_id: CommentId,
    cell: LazyCell<T>,
    apply: fn(&CommentStore, CommentId, T),
}

impl<T: Clone> CommentEdit<T> {
    fn new(stores: &GraphStores, comment_id: CommentId, from: T, to: T, apply: fn(&CommentStore, CommentId, T)) -> Self {
        Self {
            comments: stores.comments.clone(),
            comment_id,
            cell: LazyCell::new(from, to),
            apply,
        }
    }

    fn change(&self, value: T, name: &str) -> Result<(), HistoryError> {
        self.cell.set_to(value.clone(), || name.to_owned())?;
        (self.apply)(&self.comments, self.comment_id, value);
        Ok(())
    }

    fn apply_to(&self) {
        (self.apply)(&self.comments, self.comment_id, self.cell.to());
    }

    fn apply_from(&self) {
        (self.apply)(&self.comments, self.comment_id, self.cell.from());
    }
}

/// Drag a comment.
#[derive(Debug, Clone)]
pub struct LazyChangePositionAction {
    edit: CommentEdit<[f64; 2]>,
}

impl LazyChangePositionAction {
    pub fn new(stores: &GraphStores, comment: &Comment, position: [f64; 2]) -> Self {
        Self {
            edit: CommentEdit::new(stores, comment.id, comment.position, position, CommentStore::set_position),
        }
    }

    pub fn change_position(&self, position: [f64; 2]) -> Result<(), HistoryError> {
        self.edit.change(position, "change comment position")
    }
}

impl UndoRedoAction for LazyChangePositionAction {
    fn name(&self) -> String {
        "change comment position".into()
    }

    fn run(&mut self) {
        self.edit.apply_to();
    }

    fn undo(&mut self) {
        self.edit.apply_from();
    }
}

impl LazyUndoRedoAction for LazyChangePositionAction {
    fn lazy_id(&self) -> LazyId {
        self.edit.cell.id()
    }

    fn queued(&mut self) {
        self.edit.apply_to();
    }

    fn set_open(&mut self, open: bool) {
        self.edit.cell.set_open(open);
    }

    fn commit(&mut self) {
        self.edit.cell.commit();
    }

    fn is_committed(&self) -> bool {
        self.edit.cell.is_committed()
    }
}

/// Resize a comment.
#[derive(Debug, Clone)]
pub struct LazyChangeSizeAction {
    edit: CommentEdit<[f64; 2]>,
}

impl LazyChangeSizeAction {
    pub fn new(stores: &GraphStores, comment: &Comment, size: [f64; 2]) -> Self {
        Self {
            edit: CommentEdit::new(stores, comment.id, comment.size, size, CommentStore::set_size),
        }
    }

    pub fn change_size(&self, size: [f64; 2]) -> Result<(), HistoryError> {
        self.edit.change(size, "resize comment")
    }
}

impl UndoRedoAction for LazyChangeSizeAction {
    fn name(&self) -> String {
        "resize comment".into()
    }

    fn run(&mut self) {
        self.edit.apply_to();
    }

    fn undo(&mut self) {
        self.edit.apply_from();
    }
}

impl LazyUndoRedoAction for LazyChangeSizeAction {
    fn lazy_id(&self) -> LazyId {
        self.edit.cell.id()
    }

    fn queued(&mut self) {
        self.edit.apply_to();
    }

    fn set_open(&mut self, open: bool) {
        self.edit.cell.set_open(open);
    }

    fn commit(&mut self) {
        self.edit.cell.commit();
    }

    fn is_committed(&self) -> bool {
        self.edit.cell.is_committed()
    }
}

/// Edit a comment's content: typing text, drawing a stroke.
#[derive(Debug, Clone)]
pub struct LazyChangeDataAction {
    edit: CommentEdit<CommentData>,
}

impl LazyChangeDataAction {
    pub fn new(stores: &GraphStores, comment: &Comment, data: CommentData) -> Self {
        Self {
            edit: CommentEdit::new(stores, comment.id, comment.data.clone(), data, CommentStore::set_data),
        }
    }

    pub fn change_data(&self, data: CommentData) -> Result<(), HistoryError> {
        self.edit.change(data, "edit comment")
    }
}

impl UndoRedoAction for LazyChangeDataAction {
    fn name(&self) -> String {
        "edit comment".into()
    }

    fn run(&mut self) {
        self.edit.apply_to();
    }

    fn undo(&mut self) {
        self.edit.apply_from();
    }
}

impl LazyUndoRedoAction for LazyChangeDataAction {
    fn lazy_id(&self) -> LazyId {
        self.edit.cell.id()
    }

    fn queued(&mut self) {
        self.edit.apply_to();
    }

    fn set_open(&mut self, open: bool) {
        self.edit.cell.set_open(open);
    }

    fn commit(&mut self) {
        self.edit.cell.commit();
    }

    fn is_committed(&self) -> bool {
        self.edit.cell.is_committed()
    }
}
