//! Service traits: the network contracts the editor depends on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use graph::{PartialGraph, StepInput, StepOutput, StepType};

use crate::RemoteError;

/// Payload for storing a sub-graph as its own workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubworkflowRequest {
    pub name: String,
    pub graph: PartialGraph,
}

/// Identifies a stored workflow created by [`WorkflowService::create_subworkflow`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredWorkflow {
    pub remote_id: String,
    pub name: String,
}

/// What to ask the module service about: a step type plus its content reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub content_id: String,
}

/// Resolved schema of a module: its ports and configuration form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDescription {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<StepInput>,
    #[serde(default)]
    pub outputs: Vec<StepOutput>,
    #[serde(default)]
    pub config_form: Value,
}

/// Creates and deletes stored workflows on the server.
#[async_trait]
pub trait WorkflowService: Send + Sync {
    /// Store `request.graph` as a new workflow.
    async fn create_subworkflow(&self, request: SubworkflowRequest) -> Result<StoredWorkflow, RemoteError>;

    /// Delete a stored workflow created earlier.
    async fn delete_subworkflow(&self, remote_id: &str) -> Result<(), RemoteError>;
}

/// Resolves the dynamic inputs/outputs of a module.
#[async_trait]
pub trait ModuleService: Send + Sync {
    async fn resolve_module(&self, descriptor: &ModuleDescriptor) -> Result<ModuleDescription, RemoteError>;
}
