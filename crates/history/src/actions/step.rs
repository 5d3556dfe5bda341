//! Actions on individual steps and connections.

use std::collections::BTreeMap;

use graph::{Connection, GraphStores, OutputTerminal, Step, StepId, StepStore};
use tracing::warn;

use crate::action::{DataAttributes, LazyCell, LazyId, LazyUndoRedoAction, UndoRedoAction};
use crate::HistoryError;

// ---------------------------------------------------------------------------
// Insert / remove
// ---------------------------------------------------------------------------

/// Add a new step.  The id is allocated on the first run and reused by
/// every redo.
pub struct InsertStepAction {
    stores: GraphStores,
    step: Step,
    allocated: bool,
}

impl InsertStepAction {
    pub fn new(stores: &GraphStores, step: &Step) -> Self {
        Self {
            stores: stores.clone(),
            step: step.clone(),
            allocated: false,
        }
    }

    /// Id of the inserted step, once the action has run.
    pub fn step_id(&self) -> Option<StepId> {
        self.allocated.then_some(self.step.id)
    }

    /// The step as inserted.  Its id is only meaningful after the first run.
    pub(crate) fn step(&self) -> &Step {
        &self.step
    }

    /// Replace what redo re-inserts, e.g. after the step's ports were resolved.
    pub(crate) fn set_step(&mut self, step: Step) {
        debug_assert_eq!(step.id, self.step.id);
        self.step = step;
    }
}

impl UndoRedoAction for InsertStepAction {
    fn name(&self) -> String {
        format!("insert {}", self.step.name)
    }

    fn run(&mut self) {
        if !self.allocated {
            self.step.id = self.stores.steps.next_id();
            self.allocated = true;
        }
        self.stores.add_step(self.step.clone());
    }

    fn undo(&mut self) {
        self.stores.remove_step(self.step.id);
    }

    fn data_attributes(&self) -> DataAttributes {
        DataAttributes::from([
            ("type", format!("{:?}", self.step.step_type)),
            ("content_id", self.step.content_id.clone().unwrap_or_default()),
        ])
    }
}

/// Delete one step together with its connections.
pub struct RemoveStepAction {
    stores: GraphStores,
    step: Step,
    connections: Vec<Connection>,
    was_selected: bool,
    was_active: bool,
}

impl RemoveStepAction {
    pub fn new(stores: &GraphStores, step: &Step) -> Self {
        Self {
            stores: stores.clone(),
            step: step.clone(),
            connections: Vec::new(),
            was_selected: stores.selection.is_step_selected(step.id),
            was_active: stores.selection.active_step() == Some(step.id),
        }
    }
}

impl UndoRedoAction for RemoveStepAction {
    fn name(&self) -> String {
        format!("remove {}", self.step.label.as_deref().unwrap_or(&self.step.name))
    }

    fn run(&mut self) {
        match self.stores.remove_step(self.step.id) {
            Some((step, connections)) => {
                self.step = step;
                self.connections = connections;
            }
            None => warn!(step_id = self.step.id, "removing a step that is already gone"),
        }
    }

    fn undo(&mut self) {
        self.stores.add_step(self.step.clone());
        for connection in &self.connections {
            self.stores.add_connection(connection.clone());
        }
        if self.was_selected {
            self.stores.selection.set_step_selected(self.step.id, true);
        }
        if self.was_active {
            self.stores.selection.set_active_step(Some(self.step.id));
        }
    }
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

/// Replace a step's attributes wholesale.  Connections are not touched.
pub struct UpdateStepAction {
    steps: StepStore,
    from: Step,
    to: Step,
}

impl UpdateStepAction {
    pub fn new(stores: &GraphStores, from: &Step, mut to: Step) -> Self {
        to.id = from.id;
        to.input_connections = from.input_connections.clone();
        Self {
            steps: stores.steps.clone(),
            from: from.clone(),
            to,
        }
    }

    fn live_connections(&self) -> BTreeMap<String, Vec<OutputTerminal>> {
        self.steps
            .get(self.from.id)
            .map(|s| s.input_connections)
            .unwrap_or_default()
    }
}

impl UndoRedoAction for UpdateStepAction {
    fn name(&self) -> String {
        format!("update {}", self.from.label.as_deref().unwrap_or(&self.from.name))
    }

    fn run(&mut self) {
        let input_connections = self.live_connections();
        self.steps.update(Step { input_connections, ..self.to.clone() });
    }

    fn undo(&mut self) {
        let input_connections = self.live_connections();
        self.steps.update(Step { input_connections, ..self.from.clone() });
    }
}

// ---------------------------------------------------------------------------
// Lazy text edits
// ---------------------------------------------------------------------------

/// Free-text step attribute edited by typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepTextField {
    Label,
    Annotation,
}

impl StepTextField {
    fn apply(self, steps: &StepStore, id: StepId, value: Option<String>) {
        steps.modify(id, |step| match self {
            StepTextField::Label => step.label = value,
            StepTextField::Annotation => step.annotation = value,
        });
    }

    fn read(self, step: &Step) -> Option<String> {
        match self {
            StepTextField::Label => step.label.clone(),
            StepTextField::Annotation => step.annotation.clone(),
        }
    }
}

/// Type into a step's label or annotation.
#[derive(Debug, Clone)]
pub struct LazyMutateStepAction {
    steps: StepStore,
    step_id: StepId,
    field: StepTextField,
    cell: LazyCell<Option<String>>,
}

impl LazyMutateStepAction {
    pub fn new(stores: &GraphStores, step: &Step, field: StepTextField, value: Option<String>) -> Self {
        Self {
            steps: stores.steps.clone(),
            step_id: step.id,
            field,
            cell: LazyCell::new(field.read(step), value),
        }
    }

    pub fn change_value(&self, value: Option<String>) -> Result<(), HistoryError> {
        self.cell.set_to(value.clone(), || self.name())?;
        self.field.apply(&self.steps, self.step_id, value);
        Ok(())
    }
}

impl UndoRedoAction for LazyMutateStepAction {
    fn name(&self) -> String {
        match self.field {
            StepTextField::Label => "change step label".into(),
            StepTextField::Annotation => "change step annotation".into(),
        }
    }

    fn run(&mut self) {
        self.field.apply(&self.steps, self.step_id, self.cell.to());
    }

    fn undo(&mut self) {
        self.field.apply(&self.steps, self.step_id, self.cell.from());
    }
}

impl LazyUndoRedoAction for LazyMutateStepAction {
    fn lazy_id(&self) -> LazyId {
        self.cell.id()
    }

    fn queued(&mut self) {
        self.run();
    }

    fn set_open(&mut self, open: bool) {
        self.cell.set_open(open);
    }

    fn commit(&mut self) {
        self.cell.commit();
    }

    fn is_committed(&self) -> bool {
        self.cell.is_committed()
    }
}

// ---------------------------------------------------------------------------
// Connections
// ---------------------------------------------------------------------------

/// Connect an output to an input, displacing whatever was connected there.
/// Connecting an existing connection changes nothing, in either direction.
pub struct ConnectAction {
    stores: GraphStores,
    connection: Connection,
    displaced: Option<Connection>,
    added: bool,
}

impl ConnectAction {
    pub fn new(stores: &GraphStores, connection: Connection) -> Self {
        Self {
            stores: stores.clone(),
            connection,
            displaced: None,
            added: false,
        }
    }
}

impl UndoRedoAction for ConnectAction {
    fn name(&self) -> String {
        "connect steps".into()
    }

    fn run(&mut self) {
        if self.stores.connections.contains(&self.connection) {
            self.displaced = None;
            self.added = false;
            return;
        }
        self.displaced = self.stores.connections.get(&self.connection.input);
        self.added = self.stores.add_connection(self.connection.clone());
    }

    fn undo(&mut self) {
        if !self.added {
            return;
        }
        self.stores.remove_connection(&self.connection);
        if let Some(displaced) = &self.displaced {
            self.stores.add_connection(displaced.clone());
        }
    }
}

pub struct DisconnectAction {
    stores: GraphStores,
    connection: Connection,
    removed: bool,
}

impl DisconnectAction {
    pub fn new(stores: &GraphStores, connection: Connection) -> Self {
        Self {
            stores: stores.clone(),
            connection,
            removed: false,
        }
    }
}

impl UndoRedoAction for DisconnectAction {
    fn name(&self) -> String {
        "disconnect steps".into()
    }

    fn run(&mut self) {
        self.removed = self.stores.remove_connection(&self.connection);
    }

    fn undo(&mut self) {
        if self.removed {
            self.stores.add_connection(self.connection.clone());
        }
    }
}
