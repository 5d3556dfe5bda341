//! Moving the selection into a newly stored subworkflow.
//!
//! The first run talks to the server twice: once to store the selected
//! sub-graph, once to learn the ports of the new subworkflow step.  Every
//! local change after that is replayable without the network.

use std::sync::Arc;

use async_trait::async_trait;
use graph::{Connection, GraphStores, InputTerminal, OutputTerminal, Step, StepId, StepType};
use remote::{ModuleDescriptor, ModuleService, SubworkflowRequest, WorkflowService};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::action::{AsyncUndoRedoAction, DataAttributes, UndoRedoAction};
use crate::actions::{DeleteSelectionAction, InsertStepAction};
use crate::HistoryError;

/// A connection that entered the selection at `step_id.input_name` is
/// re-attached to `new_input` on the subworkflow step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputMapping {
    pub step_id: StepId,
    pub input_name: String,
    pub new_input: String,
}

/// A connection that left the selection from `step_id.output_name` now
/// starts at `new_output` on the subworkflow step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputMapping {
    pub step_id: StepId,
    pub output_name: String,
    pub new_output: String,
}

/// State of a successful first run.
struct Extracted {
    insert: InsertStepAction,
    delete: DeleteSelectionAction,
    step_id: StepId,
}

pub struct ExtractSubworkflowAction {
    stores: GraphStores,
    workflows: Arc<dyn WorkflowService>,
    modules: Arc<dyn ModuleService>,
    name: String,
    inputs: Vec<InputMapping>,
    outputs: Vec<OutputMapping>,
    extracted: Option<Extracted>,
}

impl ExtractSubworkflowAction {
    pub fn new(
        stores: &GraphStores,
        workflows: Arc<dyn WorkflowService>,
        modules: Arc<dyn ModuleService>,
        name: impl Into<String>,
        inputs: Vec<InputMapping>,
        outputs: Vec<OutputMapping>,
    ) -> Self {
        Self {
            stores: stores.clone(),
            workflows,
            modules,
            name: name.into(),
            inputs,
            outputs,
            extracted: None,
        }
    }

    /// Id of the subworkflow step, once the extraction has succeeded.
    pub fn step_id(&self) -> Option<StepId> {
        self.extracted.as_ref().map(|e| e.step_id)
    }

    /// Wire the subworkflow step into the connections that crossed the
    /// selection boundary.  Ports missing from the step are skipped.
    fn reconnect(&self, step: &Step, delete: &DeleteSelectionAction) {
        let removed = delete.step_ids();
        let mut created = 0;

        for connection in delete.connections() {
            let from_inside = removed.contains(&connection.output.step_id);
            let into_inside = removed.contains(&connection.input.step_id);

            let rewired = match (from_inside, into_inside) {
                (false, true) => self
                    .inputs
                    .iter()
                    .find(|m| m.step_id == connection.input.step_id && m.input_name == connection.input.input_name)
                    .map(|m| Connection {
                        input: InputTerminal {
                            step_id: step.id,
                            input_name: m.new_input.clone(),
                        },
                        output: connection.output.clone(),
                    }),
                (true, false) => self
                    .outputs
                    .iter()
                    .find(|m| m.step_id == connection.output.step_id && m.output_name == connection.output.output_name)
                    .map(|m| Connection {
                        input: connection.input.clone(),
                        output: OutputTerminal {
                            step_id: step.id,
                            output_name: m.new_output.clone(),
                        },
                    }),
                _ => continue,
            };

            let Some(rewired) = rewired else {
                debug!(?connection, "no mapping for boundary connection");
                continue;
            };
            let known_port = if into_inside {
                step.has_input(&rewired.input.input_name)
            } else {
                step.has_output(&rewired.output.output_name)
            };
            if !known_port {
                warn!(?rewired, "subworkflow step has no such port; connection skipped");
                continue;
            }
            if self.stores.add_connection(rewired) {
                created += 1;
            }
        }
        debug!(step_id = step.id, created, "subworkflow step reconnected");
    }

    /// Best effort: a failure here leaves an orphan on the server only.
    async fn discard_remote(&self, remote_id: &str) {
        if let Err(err) = self.workflows.delete_subworkflow(remote_id).await {
            warn!(remote_id, error = %err, "could not delete orphaned subworkflow");
        }
    }
}

#[async_trait]
impl AsyncUndoRedoAction for ExtractSubworkflowAction {
    fn name(&self) -> String {
        format!("extract subworkflow {}", self.name)
    }

    async fn run(&mut self) -> Result<(), HistoryError> {
        let Some(bounds) = self.stores.selection_bounds() else {
            return Err(HistoryError::EmptySelection);
        };
        let request = SubworkflowRequest {
            name: self.name.clone(),
            graph: self.stores.selection_partial_graph(),
        };
        let mut delete = DeleteSelectionAction::new(&self.stores);

        let stored = self.workflows.create_subworkflow(request).await?;
        info!(remote_id = %stored.remote_id, "subworkflow stored");

        let mut template = Step::new(StepType::Subworkflow, stored.name.clone());
        template.content_id = Some(stored.remote_id.clone());
        template.position = bounds.center();
        let mut insert = InsertStepAction::new(&self.stores, &template);
        insert.run();
        delete.run();

        let descriptor = ModuleDescriptor {
            step_type: StepType::Subworkflow,
            content_id: stored.remote_id.clone(),
        };
        let module = match self.modules.resolve_module(&descriptor).await {
            Ok(module) => module,
            Err(err) => {
                warn!(remote_id = %stored.remote_id, error = %err, "module lookup failed; rolling back");
                delete.undo();
                insert.undo();
                self.discard_remote(&stored.remote_id).await;
                return Err(err.into());
            }
        };

        let mut step = insert.step().clone();
        step.name = module.name;
        step.inputs = module.inputs;
        step.outputs = module.outputs;
        step.config_form = module.config_form;
        self.stores.steps.update(step.clone());
        insert.set_step(step.clone());

        self.stores.selection.set_active_step(Some(step.id));
        self.reconnect(&step, &delete);

        self.extracted = Some(Extracted {
            insert,
            delete,
            step_id: step.id,
        });
        Ok(())
    }

    fn undo(&mut self) {
        let Some(extracted) = &mut self.extracted else {
            warn!("undo of an extraction that never completed");
            return;
        };
        extracted.insert.undo();
        extracted.delete.undo();
    }

    fn redo(&mut self) {
        let Some(mut extracted) = self.extracted.take() else {
            warn!("redo of an extraction that never completed");
            return;
        };
        extracted.insert.redo();
        extracted.delete.redo();
        self.stores.selection.set_active_step(Some(extracted.step_id));
        let step = extracted.insert.step().clone();
        self.reconnect(&step, &extracted.delete);
        self.extracted = Some(extracted);
    }

    fn data_attributes(&self) -> DataAttributes {
        DataAttributes::from([
            ("inputs", self.inputs.len().to_string()),
            ("outputs", self.outputs.len().to_string()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph::{Selection, StepInput, StepOutput};
    use remote::{MockWorkflowService, ModuleDescription, RemoteError};
    use serde_json::json;

    fn module() -> ModuleDescription {
        ModuleDescription {
            name: "cleanup".into(),
            inputs: vec![StepInput {
                name: "raw".into(),
                ..Default::default()
            }],
            outputs: vec![StepOutput {
                name: "clean".into(),
                ..Default::default()
            }],
            config_form: json!({ "inputs": [] }),
        }
    }

    /// 0 → 1 → 2 → 3; steps 1 and 2 selected.
    fn line() -> GraphStores {
        let stores = GraphStores::new();
        for id in 0..4 {
            let mut step = Step::new(StepType::Tool, "tool").at(id as f64 * 100.0, 0.0);
            step.id = id;
            stores.add_step(step);
        }
        for id in 0..3 {
            stores.add_connection(Connection::new(id, "out", id + 1, "in"));
        }
        stores.selection.restore(Selection::of([1, 2], []));
        stores
    }

    fn extraction(stores: &GraphStores, service: &MockWorkflowService) -> ExtractSubworkflowAction {
        let service = Arc::new(service.clone());
        ExtractSubworkflowAction::new(
            stores,
            service.clone(),
            service,
            "cleanup",
            vec![InputMapping {
                step_id: 1,
                input_name: "in".into(),
                new_input: "raw".into(),
            }],
            vec![OutputMapping {
                step_id: 2,
                output_name: "out".into(),
                new_output: "clean".into(),
            }],
        )
    }

    #[tokio::test]
    async fn run_replaces_selection_with_a_connected_subworkflow_step() {
        let stores = line();
        let service = MockWorkflowService::succeeding(module());
        let mut action = extraction(&stores, &service);

        action.run().await.unwrap();

        let id = action.step_id().unwrap();
        let step = stores.steps.get(id).unwrap();
        assert_eq!(step.step_type, StepType::Subworkflow);
        assert_eq!(step.position.left, 150.0);
        assert_eq!(stores.selection.active_step(), Some(id));
        assert!(!stores.steps.contains(1) && !stores.steps.contains(2));
        assert!(stores.connections.contains(&Connection::new(0, "out", id, "raw")));
        assert!(stores.connections.contains(&Connection::new(id, "clean", 3, "in")));
        assert_eq!(service.last_request().unwrap().graph.steps.len(), 2);
    }

    #[tokio::test]
    async fn unmapped_ports_are_not_connected() {
        let stores = line();
        let mut bare = module();
        bare.outputs.clear();
        let service = MockWorkflowService::succeeding(bare);
        let mut action = extraction(&stores, &service);

        action.run().await.unwrap();

        let id = action.step_id().unwrap();
        assert_eq!(stores.connections.for_step(id).len(), 1);
        assert!(stores.connections.for_step(3).is_empty());
    }

    #[tokio::test]
    async fn resolve_failure_rolls_back_and_deletes_the_remote_copy() {
        let stores = line();
        let before = stores.snapshot();
        let service = MockWorkflowService::failing_resolve(RemoteError::Unavailable("timeout".into()));
        let mut action = extraction(&stores, &service);

        let err = action.run().await.unwrap_err();
        assert_eq!(err, HistoryError::Remote(RemoteError::Unavailable("timeout".into())));
        assert_eq!(stores.snapshot(), before);
        assert_eq!(service.create_count(), 1);
        assert_eq!(service.deleted_ids().len(), 1);
        assert!(service.stored_ids().is_empty());
    }

    #[tokio::test]
    async fn empty_selection_is_refused_before_any_request() {
        let stores = line();
        stores.selection.restore(Selection::default());
        let service = MockWorkflowService::succeeding(module());
        let mut action = extraction(&stores, &service);

        assert_eq!(action.run().await.unwrap_err(), HistoryError::EmptySelection);
        assert_eq!(service.create_count(), 0);
    }
}
