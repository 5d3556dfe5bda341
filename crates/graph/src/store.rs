//! Id-keyed stores for steps, connections, comments and selection state.
//!
//! Each store is a cheap `Clone` handle to shared state, so commands can
//! capture the stores they mutate at construction time.  Every accessor
//! returns owned clones; no caller ever holds a reference into a store.
//!
//! The stores are deliberately dumb: keeping the four of them consistent
//! with each other (connections follow their steps, selection forgets
//! removed elements) is the job of [`crate::GraphStores`].

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::warn;

use crate::model::{
    Comment, CommentColor, CommentData, CommentId, Connection, InputTerminal, OutputTerminal,
    Position, Selection, Step, StepId,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// StepStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct StepTable {
    steps: BTreeMap<StepId, Step>,
    next_id: StepId,
}

/// Steps keyed by id.
#[derive(Debug, Clone, Default)]
pub struct StepStore {
    inner: Arc<Mutex<StepTable>>,
}

impl StepStore {
    /// The id the next inserted step should get.  Never goes backwards,
    /// so ids freed by a removal are not handed out again.
    pub fn next_id(&self) -> StepId {
        lock(&self.inner).next_id
    }

    /// Insert or replace `step` under its own id.
    pub fn add(&self, step: Step) {
        let mut table = lock(&self.inner);
        table.next_id = table.next_id.max(step.id.saturating_add(1));
        table.steps.insert(step.id, step);
    }

    /// Full replace of an existing step.  Unknown ids are ignored.
    pub fn update(&self, step: Step) {
        let mut table = lock(&self.inner);
        match table.steps.get_mut(&step.id) {
            Some(slot) => *slot = step,
            None => warn!("update of unknown step {}", step.id),
        }
    }

    pub fn remove(&self, id: StepId) -> Option<Step> {
        lock(&self.inner).steps.remove(&id)
    }

    pub fn get(&self, id: StepId) -> Option<Step> {
        lock(&self.inner).steps.get(&id).cloned()
    }

    pub fn contains(&self, id: StepId) -> bool {
        lock(&self.inner).steps.contains_key(&id)
    }

    pub fn all(&self) -> BTreeMap<StepId, Step> {
        lock(&self.inner).steps.clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every non-null label currently in use.
    pub fn labels(&self) -> HashSet<String> {
        lock(&self.inner)
            .steps
            .values()
            .filter_map(|s| s.label.clone())
            .collect()
    }

    pub fn set_position(&self, id: StepId, position: Position) {
        self.modify(id, |step| step.position = position);
    }

    /// Apply `f` to the step with `id`, if present.
    pub fn modify(&self, id: StepId, f: impl FnOnce(&mut Step)) {
        let mut table = lock(&self.inner);
        match table.steps.get_mut(&id) {
            Some(step) => f(step),
            None => warn!("modification of unknown step {id}"),
        }
    }

    pub(crate) fn attach(&self, connection: &Connection) {
        let mut table = lock(&self.inner);
        if let Some(step) = table.steps.get_mut(&connection.input.step_id) {
            let sources = step
                .input_connections
                .entry(connection.input.input_name.clone())
                .or_default();
            if !sources.contains(&connection.output) {
                sources.push(connection.output.clone());
            }
        }
    }

    pub(crate) fn detach(&self, connection: &Connection) {
        let mut table = lock(&self.inner);
        if let Some(step) = table.steps.get_mut(&connection.input.step_id) {
            let name = &connection.input.input_name;
            if let Some(sources) = step.input_connections.get_mut(name) {
                sources.retain(|o| o != &connection.output);
                if sources.is_empty() {
                    step.input_connections.remove(name);
                }
            }
        }
    }

    pub(crate) fn clear(&self) {
        let mut table = lock(&self.inner);
        table.steps.clear();
        table.next_id = 0;
    }
}

// ---------------------------------------------------------------------------
// ConnectionStore
// ---------------------------------------------------------------------------

/// Connections keyed by their input terminal.
#[derive(Debug, Clone, Default)]
pub struct ConnectionStore {
    inner: Arc<Mutex<BTreeMap<InputTerminal, OutputTerminal>>>,
}

impl ConnectionStore {
    /// Insert `connection`, returning whatever previously ended on the same
    /// input terminal.
    pub fn add(&self, connection: Connection) -> Option<Connection> {
        let Connection { input, output } = connection;
        lock(&self.inner)
            .insert(input.clone(), output)
            .map(|output| Connection { input, output })
    }

    /// Remove `connection` if it is present exactly as given.
    pub fn remove(&self, connection: &Connection) -> bool {
        let mut table = lock(&self.inner);
        if table.get(&connection.input) == Some(&connection.output) {
            table.remove(&connection.input);
            true
        } else {
            false
        }
    }

    pub fn get(&self, input: &InputTerminal) -> Option<Connection> {
        lock(&self.inner).get(input).map(|output| Connection {
            input: input.clone(),
            output: output.clone(),
        })
    }

    pub fn contains(&self, connection: &Connection) -> bool {
        lock(&self.inner).get(&connection.input) == Some(&connection.output)
    }

    /// Every connection with either end on `step_id`.
    pub fn for_step(&self, step_id: StepId) -> Vec<Connection> {
        self.all().into_iter().filter(|c| c.touches(step_id)).collect()
    }

    pub fn all(&self) -> Vec<Connection> {
        lock(&self.inner)
            .iter()
            .map(|(input, output)| Connection {
                input: input.clone(),
                output: output.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn clear(&self) {
        lock(&self.inner).clear();
    }
}

// ---------------------------------------------------------------------------
// CommentStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct CommentTable {
    comments: BTreeMap<CommentId, Comment>,
    next_id: CommentId,
}

/// Comments keyed by id.
#[derive(Debug, Clone, Default)]
pub struct CommentStore {
    inner: Arc<Mutex<CommentTable>>,
}

impl CommentStore {
    pub fn next_id(&self) -> CommentId {
        lock(&self.inner).next_id
    }

    pub fn add(&self, comment: Comment) {
        let mut table = lock(&self.inner);
        table.next_id = table.next_id.max(comment.id.saturating_add(1));
        table.comments.insert(comment.id, comment);
    }

    pub fn update(&self, comment: Comment) {
        let mut table = lock(&self.inner);
        match table.comments.get_mut(&comment.id) {
            Some(slot) => *slot = comment,
            None => warn!("update of unknown comment {}", comment.id),
        }
    }

    pub fn remove(&self, id: CommentId) -> Option<Comment> {
        lock(&self.inner).comments.remove(&id)
    }

    pub fn get(&self, id: CommentId) -> Option<Comment> {
        lock(&self.inner).comments.get(&id).cloned()
    }

    pub fn contains(&self, id: CommentId) -> bool {
        lock(&self.inner).comments.contains_key(&id)
    }

    pub fn all(&self) -> BTreeMap<CommentId, Comment> {
        lock(&self.inner).comments.clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_position(&self, id: CommentId, position: [f64; 2]) {
        self.modify(id, |c| c.position = position);
    }

    pub fn set_size(&self, id: CommentId, size: [f64; 2]) {
        self.modify(id, |c| c.size = size);
    }

    pub fn set_color(&self, id: CommentId, color: CommentColor) {
        self.modify(id, |c| c.color = color);
    }

    pub fn set_data(&self, id: CommentId, data: CommentData) {
        self.modify(id, |c| c.data = data);
    }

    pub fn modify(&self, id: CommentId, f: impl FnOnce(&mut Comment)) {
        let mut table = lock(&self.inner);
        match table.comments.get_mut(&id) {
            Some(comment) => f(comment),
            None => warn!("modification of unknown comment {id}"),
        }
    }

    pub(crate) fn clear(&self) {
        let mut table = lock(&self.inner);
        table.comments.clear();
        table.next_id = 0;
    }
}

// ---------------------------------------------------------------------------
// SelectionStore
// ---------------------------------------------------------------------------

/// Which steps and comments are multi-selected, and which step is active.
#[derive(Debug, Clone, Default)]
pub struct SelectionStore {
    inner: Arc<Mutex<Selection>>,
}

impl SelectionStore {
    pub fn set_step_selected(&self, id: StepId, selected: bool) {
        let mut selection = lock(&self.inner);
        if selected {
            selection.steps.insert(id);
        } else {
            selection.steps.remove(&id);
        }
    }

    pub fn set_comment_selected(&self, id: CommentId, selected: bool) {
        let mut selection = lock(&self.inner);
        if selected {
            selection.comments.insert(id);
        } else {
            selection.comments.remove(&id);
        }
    }

    pub fn is_step_selected(&self, id: StepId) -> bool {
        lock(&self.inner).steps.contains(&id)
    }

    pub fn is_comment_selected(&self, id: CommentId) -> bool {
        lock(&self.inner).comments.contains(&id)
    }

    pub fn active_step(&self) -> Option<StepId> {
        lock(&self.inner).active_step
    }

    pub fn set_active_step(&self, id: Option<StepId>) {
        lock(&self.inner).active_step = id;
    }

    /// Drop the multi-selection.  The active step is kept.
    pub fn clear(&self) {
        let mut selection = lock(&self.inner);
        selection.steps.clear();
        selection.comments.clear();
    }

    pub fn snapshot(&self) -> Selection {
        lock(&self.inner).clone()
    }

    /// Replace the whole selection state, active step included.
    pub fn restore(&self, selection: Selection) {
        *lock(&self.inner) = selection;
    }

    pub(crate) fn forget_step(&self, id: StepId) {
        let mut selection = lock(&self.inner);
        selection.steps.remove(&id);
        if selection.active_step == Some(id) {
            selection.active_step = None;
        }
    }

    pub(crate) fn forget_comment(&self, id: CommentId) {
        lock(&self.inner).comments.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StepType;

    fn step(id: StepId) -> Step {
        let mut step = Step::new(StepType::Tool, format!("step {id}"));
        step.id = id;
        step
    }

    #[test]
    fn step_ids_never_go_backwards() {
        let store = StepStore::default();
        store.add(step(4));
        assert_eq!(store.next_id(), 5);
        store.remove(4);
        assert_eq!(store.next_id(), 5);
        store.add(step(1));
        assert_eq!(store.next_id(), 5);
    }

    #[test]
    fn handles_share_state() {
        let store = StepStore::default();
        let other = store.clone();
        store.add(step(1));
        assert!(other.contains(1));
    }

    #[test]
    fn returned_steps_are_copies() {
        let store = StepStore::default();
        store.add(step(1));
        let mut copy = store.get(1).unwrap();
        copy.name = "changed".into();
        assert_eq!(store.get(1).unwrap().name, "step 1");
    }

    #[test]
    fn connection_on_occupied_input_replaces_previous() {
        let store = ConnectionStore::default();
        assert!(store.add(Connection::new(1, "out", 3, "in")).is_none());
        let replaced = store.add(Connection::new(2, "out", 3, "in"));
        assert_eq!(replaced, Some(Connection::new(1, "out", 3, "in")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn one_output_can_feed_many_inputs() {
        let store = ConnectionStore::default();
        store.add(Connection::new(1, "out", 2, "in"));
        store.add(Connection::new(1, "out", 3, "in"));
        assert_eq!(store.for_step(1).len(), 2);
    }

    #[test]
    fn remove_requires_exact_match() {
        let store = ConnectionStore::default();
        store.add(Connection::new(1, "out", 2, "in"));
        assert!(!store.remove(&Connection::new(9, "out", 2, "in")));
        assert!(store.remove(&Connection::new(1, "out", 2, "in")));
        assert!(store.is_empty());
    }

    #[test]
    fn forgetting_active_step_clears_it() {
        let store = SelectionStore::default();
        store.set_step_selected(2, true);
        store.set_active_step(Some(2));
        store.forget_step(2);
        assert!(!store.is_step_selected(2));
        assert_eq!(store.active_step(), None);
    }
}
