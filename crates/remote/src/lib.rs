//! `remote` crate: the network collaborators of the editor.
//!
//! The history engine only ever talks to the server through the
//! [`WorkflowService`] and [`ModuleService`] traits, so tests and the CLI can
//! swap in [`mock::MockWorkflowService`].

pub mod error;
pub mod mock;
pub mod traits;

pub use error::RemoteError;
pub use mock::{MockBehaviour, MockWorkflowService};
pub use traits::{
    ModuleDescription, ModuleDescriptor, ModuleService, StoredWorkflow, SubworkflowRequest,
    WorkflowService,
};
