//! A scripted editing session: graph stores, their history and the
//! offline remote services.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use graph::{GraphStores, PartialGraph, Selection, StepInput, StepOutput};
use history::actions::{
    AddToSelectionAction, ChangeColorAction, ClearSelectionAction, DeleteSelectionAction, DuplicateSelectionAction,
    ExtractSubworkflowAction, InputMapping, LazyMoveMultipleAction, OutputMapping,
};
use history::{HistoryConfig, UndoRedoStore};
use remote::{MockWorkflowService, ModuleDescription};

use crate::script::Operation;

pub struct Session {
    pub stores: GraphStores,
    pub history: UndoRedoStore,
    drag: Option<LazyMoveMultipleAction>,
}

impl Session {
    pub fn new(document: &PartialGraph, config: HistoryConfig) -> Self {
        Self {
            stores: GraphStores::from_document(document),
            history: UndoRedoStore::new(config),
            drag: None,
        }
    }

    /// Apply every operation in order, stopping at the first invalid one.
    pub async fn replay(&mut self, operations: &[Operation]) -> Result<()> {
        for (index, operation) in operations.iter().enumerate() {
            self.apply(operation)
                .await
                .with_context(|| format!("operation {} ({operation:?})", index + 1))?;
        }
        self.history.flush_lazy_action();
        info!(entries = self.history.undo_len(), "script replayed");
        Ok(())
    }

    pub async fn apply(&mut self, operation: &Operation) -> Result<()> {
        debug!(?operation, "applying");
        match operation {
            Operation::Select { steps, comments } => {
                let selection = Selection::of(steps.iter().copied(), comments.iter().copied());
                for id in &selection.steps {
                    if !self.stores.steps.contains(*id) {
                        bail!("no step with id {id}");
                    }
                }
                for id in &selection.comments {
                    if !self.stores.comments.contains(*id) {
                        bail!("no comment with id {id}");
                    }
                }
                self.history
                    .apply_action(AddToSelectionAction::new(&self.stores, &selection));
            }
            Operation::ClearSelection => {
                self.history.apply_action(ClearSelectionAction::new(&self.stores));
            }
            Operation::Duplicate { offset } => {
                self.history
                    .apply_action(DuplicateSelectionAction::new(&self.stores, *offset));
            }
            Operation::DeleteSelection => {
                self.history.apply_action(DeleteSelectionAction::new(&self.stores));
            }
            Operation::Move { offset } => match &self.drag {
                Some(drag) if self.history.is_queued(drag) => drag.change_offset(*offset)?,
                _ => {
                    let drag = LazyMoveMultipleAction::new(&self.stores, &self.stores.selection.snapshot(), *offset);
                    self.history.apply_lazy_action(drag.clone());
                    self.drag = Some(drag);
                }
            },
            Operation::Flush => {
                self.history.flush_lazy_action();
            }
            Operation::Undo => {
                if !self.history.undo() {
                    info!("nothing to undo");
                }
            }
            Operation::Redo => {
                if !self.history.redo() {
                    info!("nothing to redo");
                }
            }
            Operation::ChangeCommentColor { comment_id, color } => {
                let comment = self
                    .stores
                    .comments
                    .get(*comment_id)
                    .with_context(|| format!("no comment with id {comment_id}"))?;
                self.history
                    .apply_action(ChangeColorAction::new(&self.stores, &comment, *color));
            }
            Operation::ExtractSubworkflow { name, inputs, outputs } => {
                let service = Arc::new(MockWorkflowService::succeeding(offline_module(name, inputs, outputs)));
                let action = ExtractSubworkflowAction::new(
                    &self.stores,
                    service.clone(),
                    service,
                    name.clone(),
                    inputs.clone(),
                    outputs.clone(),
                );
                self.history.apply_async_action(action).await?;
            }
        }
        Ok(())
    }
}

/// The ports the offline server reports for an extracted subworkflow: exactly
/// the ones the mappings ask for.
fn offline_module(name: &str, inputs: &[InputMapping], outputs: &[OutputMapping]) -> ModuleDescription {
    ModuleDescription {
        name: name.to_owned(),
        inputs: inputs
            .iter()
            .map(|m| StepInput {
                name: m.new_input.clone(),
                ..Default::default()
            })
            .collect(),
        outputs: outputs
            .iter()
            .map(|m| StepOutput {
                name: m.new_output.clone(),
                ..Default::default()
            })
            .collect(),
        config_form: serde_json::Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parse_script;
    use graph::{validate_graph, Connection, Position, Step, StepType};

    fn document() -> PartialGraph {
        let stores = GraphStores::new();
        for (id, label) in [(0, "reads"), (1, "trimmed"), (2, "aligned")] {
            let mut step = Step::new(StepType::Tool, "tool").with_label(label).at(id as f64 * 100.0, 0.0);
            step.id = id;
            stores.add_step(step);
        }
        stores.add_connection(Connection::new(0, "out", 1, "in"));
        stores.add_connection(Connection::new(1, "out", 2, "in"));
        stores.to_document()
    }

    async fn replay(script: &str) -> Session {
        let mut session = Session::new(&document(), HistoryConfig::default());
        session.replay(&parse_script(script).unwrap()).await.unwrap();
        session
    }

    #[tokio::test]
    async fn consecutive_moves_are_one_history_entry() {
        let session = replay(
            r#"[
                { "op": "select", "steps": [1, 2] },
                { "op": "move", "offset": { "left": 5, "top": 0 } },
                { "op": "move", "offset": { "left": 10, "top": 0 } },
                { "op": "move", "offset": { "left": 15, "top": 5 } }
            ]"#,
        )
        .await;

        assert_eq!(session.history.undo_len(), 2);
        assert_eq!(session.stores.steps.get(2).unwrap().position, Position::new(215.0, 5.0));
        assert_eq!(session.stores.steps.get(0).unwrap().position, Position::new(0.0, 0.0));
    }

    #[tokio::test]
    async fn flush_starts_a_new_drag() {
        let session = replay(
            r#"[
                { "op": "select", "steps": [0] },
                { "op": "move", "offset": { "left": 5, "top": 0 } },
                { "op": "flush" },
                { "op": "move", "offset": { "left": 5, "top": 0 } },
                { "op": "undo" }
            ]"#,
        )
        .await;

        assert_eq!(session.history.undo_len(), 2);
        assert_eq!(session.stores.steps.get(0).unwrap().position, Position::new(5.0, 0.0));
    }

    #[tokio::test]
    async fn duplicate_then_delete_then_undo() {
        let session = replay(
            r#"[
                { "op": "select", "steps": [1, 2] },
                { "op": "duplicate", "offset": { "left": 0, "top": 100 } },
                { "op": "delete-selection" },
                { "op": "undo" }
            ]"#,
        )
        .await;

        assert_eq!(session.stores.steps.len(), 5);
        assert!(session.stores.labels().contains("aligned 2"));
        validate_graph(&session.stores.snapshot()).expect("valid after replay");
    }

    #[tokio::test]
    async fn extract_runs_against_the_offline_service() {
        let session = replay(
            r#"[
                { "op": "select", "steps": [1] },
                { "op": "extract-subworkflow", "name": "trim",
                  "inputs": [{ "step_id": 1, "input_name": "in", "new_input": "raw" }],
                  "outputs": [{ "step_id": 1, "output_name": "out", "new_output": "trimmed" }] }
            ]"#,
        )
        .await;

        let snapshot = session.stores.snapshot();
        assert_eq!(snapshot.steps.len(), 3);
        assert_eq!(snapshot.connections.len(), 2);
        validate_graph(&snapshot).expect("valid after extraction");
    }

    #[tokio::test]
    async fn selecting_a_missing_step_fails() {
        let mut session = Session::new(&document(), HistoryConfig::default());
        let ops = parse_script(r#"[{ "op": "select", "steps": [42] }]"#).unwrap();
        let err = session.replay(&ops).await.unwrap_err();
        assert!(format!("{err:#}").contains("no step with id 42"));
        assert_eq!(session.history.undo_len(), 0);
    }
}
