//! `history` crate: undoable editing of a workflow graph.
//!
//! Every edit is an action object handed to the [`UndoRedoStore`], which
//! runs it once and keeps it around to undo and redo.  Continuous gestures
//! (dragging, resizing, typing) use lazy actions that coalesce into a single
//! entry; extracting a subworkflow is an async action that awaits the server.

pub mod action;
pub mod actions;
pub mod error;
pub mod store;

pub use action::{AsyncUndoRedoAction, DataAttributes, LazyCell, LazyId, LazyUndoRedoAction, UndoRedoAction};
pub use error::HistoryError;
pub use store::{ActionId, HistoryConfig, UndoRedoStore};
