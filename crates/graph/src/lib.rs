//! `graph` crate: the workflow canvas data model and its stores.
//!
//! Steps, connections, comments and selection state each live in their own
//! id-keyed store; [`GraphStores`] bundles the four and owns every
//! operation that has to keep them consistent with one another.

pub mod error;
pub mod label;
pub mod model;
pub mod store;
pub mod stores;
pub mod validate;

pub use error::GraphError;
pub use label::unique_label;
pub use model::{
    Bounds, Comment, CommentColor, CommentData, CommentId, Connection, GraphSnapshot, InputTerminal,
    OutputTerminal, PartialGraph, Position, Selection, Step, StepId, StepInput, StepOutput, StepType,
};
pub use store::{CommentStore, ConnectionStore, SelectionStore, StepStore};
pub use stores::GraphStores;
pub use validate::validate_graph;
