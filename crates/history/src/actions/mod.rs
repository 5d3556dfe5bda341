//! Concrete actions, grouped by what they edit.

pub mod comment;
pub mod selection;
pub mod step;
pub mod subworkflow;
pub mod workflow;

pub use comment::{
    AddCommentAction, ChangeColorAction, DeleteCommentAction, LazyChangeDataAction, LazyChangePositionAction,
    LazyChangeSizeAction, RemoveAllFreehandCommentsAction,
};
pub use selection::{
    AddToSelectionAction, ClearSelectionAction, RemoveFromSelectionAction, ToggleCommentSelectedAction,
    ToggleStepSelectedAction,
};
pub use step::{
    ConnectAction, DisconnectAction, InsertStepAction, LazyMutateStepAction, RemoveStepAction, StepTextField,
    UpdateStepAction,
};
pub use subworkflow::{ExtractSubworkflowAction, InputMapping, OutputMapping};
pub use workflow::{
    CopyIntoWorkflowAction, CopyOptions, DeleteSelectionAction, DuplicateSelectionAction, LazyMoveMultipleAction,
};
