//! `MockWorkflowService`: a test double for both remote services.
//!
//! Useful in unit and integration tests, and for the CLI's offline replay,
//! where no server is available.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::{
    ModuleDescription, ModuleDescriptor, ModuleService, RemoteError, StoredWorkflow,
    SubworkflowRequest, WorkflowService,
};

/// Behaviour injected into `MockWorkflowService` at construction time.
#[derive(Debug, Clone)]
pub enum MockBehaviour {
    /// Every call succeeds.
    Succeed,
    /// `create_subworkflow` fails with the given error.
    FailCreate(RemoteError),
    /// `resolve_module` fails with the given error.
    FailResolve(RemoteError),
}

/// A mock server that records every call it receives.
#[derive(Debug, Clone)]
pub struct MockWorkflowService {
    /// What the service will do when called.
    pub behaviour: MockBehaviour,
    /// Returned by every successful `resolve_module` call.
    pub module: ModuleDescription,
    /// All creation requests seen (in call order).
    pub created: Arc<Mutex<Vec<SubworkflowRequest>>>,
    /// Ids passed to `delete_subworkflow` (in call order).
    pub deleted: Arc<Mutex<Vec<String>>>,
    /// All module lookups seen (in call order).
    pub resolved: Arc<Mutex<Vec<ModuleDescriptor>>>,
    stored: Arc<Mutex<HashSet<String>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockWorkflowService {
    fn with_behaviour(behaviour: MockBehaviour, module: ModuleDescription) -> Self {
        Self {
            behaviour,
            module,
            created: Arc::default(),
            deleted: Arc::default(),
            resolved: Arc::default(),
            stored: Arc::default(),
        }
    }

    /// A service that always succeeds and describes every module as `module`.
    pub fn succeeding(module: ModuleDescription) -> Self {
        Self::with_behaviour(MockBehaviour::Succeed, module)
    }

    /// A service whose workflow creation always fails.
    pub fn failing_create(error: RemoteError) -> Self {
        Self::with_behaviour(MockBehaviour::FailCreate(error), Self::empty_module())
    }

    /// A service that stores workflows but cannot resolve modules.
    pub fn failing_resolve(error: RemoteError) -> Self {
        Self::with_behaviour(MockBehaviour::FailResolve(error), Self::empty_module())
    }

    fn empty_module() -> ModuleDescription {
        ModuleDescription {
            name: "module".into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            config_form: Value::Null,
        }
    }

    pub fn create_count(&self) -> usize {
        lock(&self.created).len()
    }

    pub fn deleted_ids(&self) -> Vec<String> {
        lock(&self.deleted).clone()
    }

    pub fn last_request(&self) -> Option<SubworkflowRequest> {
        lock(&self.created).last().cloned()
    }

    /// Ids of workflows created and not yet deleted.
    pub fn stored_ids(&self) -> HashSet<String> {
        lock(&self.stored).clone()
    }
}

#[async_trait]
impl WorkflowService for MockWorkflowService {
    async fn create_subworkflow(&self, request: SubworkflowRequest) -> Result<StoredWorkflow, RemoteError> {
        let name = request.name.clone();
        lock(&self.created).push(request);

        if let MockBehaviour::FailCreate(error) = &self.behaviour {
            return Err(error.clone());
        }

        let remote_id = Uuid::new_v4().simple().to_string();
        lock(&self.stored).insert(remote_id.clone());
        debug!(%remote_id, %name, "mock stored workflow");
        Ok(StoredWorkflow { remote_id, name })
    }

    async fn delete_subworkflow(&self, remote_id: &str) -> Result<(), RemoteError> {
        lock(&self.deleted).push(remote_id.to_owned());
        if lock(&self.stored).remove(remote_id) {
            Ok(())
        } else {
            Err(RemoteError::Rejected(format!("no stored workflow '{remote_id}'")))
        }
    }
}

#[async_trait]
impl ModuleService for MockWorkflowService {
    async fn resolve_module(&self, descriptor: &ModuleDescriptor) -> Result<ModuleDescription, RemoteError> {
        lock(&self.resolved).push(descriptor.clone());
        match &self.behaviour {
            MockBehaviour::FailResolve(error) => Err(error.clone()),
            _ => Ok(self.module.clone()),
        }
    }
}
