//! The history store.
//!
//! `UndoRedoStore` is the single entry point for editing a graph:
//! 1. Applies an action and pushes it onto the undo stack.
//! 2. Keeps at most one lazy action open and commits it on flush.
//! 3. Moves actions between the undo and redo stacks on `undo`/`redo`.
//! 4. Awaits async actions and only records them once they completed.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use crate::action::{AsyncUndoRedoAction, DataAttributes, LazyUndoRedoAction, UndoRedoAction};
use crate::HistoryError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for the history store.
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// Oldest entries are dropped once the undo stack grows past this.
    pub max_undo_actions: usize,
    /// An open lazy action idle for this long is flushed by
    /// [`UndoRedoStore::flush_idle_lazy_action`].
    pub lazy_action_timeout: Duration,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_undo_actions: 100,
            lazy_action_timeout: Duration::from_millis(1000),
        }
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// Handle to one committed history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActionId(u64);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct HistoryEntry {
    id: ActionId,
    action: Box<dyn UndoRedoAction>,
}

struct PendingLazy {
    action: Box<dyn LazyUndoRedoAction>,
    touched: Instant,
}

/// Commits a flushed lazy action as an ordinary entry.
struct CommittedLazy(Box<dyn LazyUndoRedoAction>);

impl UndoRedoAction for CommittedLazy {
    fn name(&self) -> String {
        self.0.name()
    }

    fn run(&mut self) {
        self.0.run();
    }

    fn undo(&mut self) {
        self.0.undo();
    }

    fn redo(&mut self) {
        self.0.redo();
    }

    fn data_attributes(&self) -> DataAttributes {
        self.0.data_attributes()
    }
}

/// Commits a completed async action as an ordinary entry.
struct CompletedAsync<A>(A);

impl<A: AsyncUndoRedoAction> UndoRedoAction for CompletedAsync<A> {
    fn name(&self) -> String {
        self.0.name()
    }

    // Only reached through `redo`; the first run happened asynchronously.
    fn run(&mut self) {
        self.0.redo();
    }

    fn undo(&mut self) {
        self.0.undo();
    }

    fn redo(&mut self) {
        self.0.redo();
    }

    fn data_attributes(&self) -> DataAttributes {
        self.0.data_attributes()
    }
}

// ---------------------------------------------------------------------------
// UndoRedoStore
// ---------------------------------------------------------------------------

/// Linear undo/redo history of one editing session.
pub struct UndoRedoStore {
    config: HistoryConfig,
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    pending: Option<PendingLazy>,
    next_id: u64,
}

impl Default for UndoRedoStore {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl UndoRedoStore {
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            config,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            pending: None,
            next_id: 1,
        }
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Run `action` and record it.  Commits any open lazy action first and
    /// discards the redo stack.
    pub fn apply_action<A: UndoRedoAction + 'static>(&mut self, mut action: A) -> ActionId {
        self.flush_lazy_action();
        self.clear_redo_stack();
        debug!(action = %action.name(), attributes = ?action.data_attributes(), "applying action");
        action.run();
        self.push(Box::new(action))
    }

    /// Open `action` as the current lazy action.
    ///
    /// If `action` is already the open one this only re-arms its idle
    /// timeout; the caller extends it through its own mutator.  An action
    /// that was already flushed into the history is refused and `false` is
    /// returned; start a new action for the next gesture instead.
    pub fn apply_lazy_action<A: LazyUndoRedoAction + 'static>(&mut self, mut action: A) -> bool {
        let now = Instant::now();
        if let Some(pending) = self.pending.as_mut() {
            if pending.action.lazy_id() == action.lazy_id() {
                pending.touched = now;
                return true;
            }
        }
        if action.is_committed() {
            warn!(action = %action.name(), "refusing to reopen a committed lazy action");
            return false;
        }

        self.flush_lazy_action();
        self.clear_redo_stack();
        debug!(action = %action.name(), "queueing lazy action");
        action.set_open(true);
        action.queued();
        self.pending = Some(PendingLazy {
            action: Box::new(action),
            touched: now,
        });
        true
    }

    /// Whether `action` is the open lazy action.
    pub fn is_queued<A: LazyUndoRedoAction + ?Sized>(&self, action: &A) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|p| p.action.lazy_id() == action.lazy_id())
    }

    /// Name of the open lazy action, if any.
    pub fn pending_lazy_action(&self) -> Option<String> {
        self.pending.as_ref().map(|p| p.action.name())
    }

    /// Commit the open lazy action as one history entry.  No-op when none is open.
    pub fn flush_lazy_action(&mut self) -> Option<ActionId> {
        let PendingLazy { mut action, .. } = self.pending.take()?;
        action.commit();
        action.run();
        debug!(action = %action.name(), "flushed lazy action");
        Some(self.push(Box::new(CommittedLazy(action))))
    }

    /// Flush the open lazy action if it has not been touched for
    /// `lazy_action_timeout`.  Returns whether anything was flushed.
    pub fn flush_idle_lazy_action(&mut self, now: Instant) -> bool {
        let idle = self
            .pending
            .as_ref()
            .is_some_and(|p| now.saturating_duration_since(p.touched) >= self.config.lazy_action_timeout);
        if idle {
            self.flush_lazy_action();
        }
        idle
    }

    /// Run an async action to completion and record it.
    ///
    /// The store is mutably borrowed until the action finishes, so nothing
    /// else can be applied, undone or redone while it is in flight.  On
    /// failure the action has already restored the graph; nothing is
    /// recorded and the redo stack is left alone.
    #[instrument(skip_all, fields(action = %action.name()))]
    pub async fn apply_async_action<A: AsyncUndoRedoAction + 'static>(
        &mut self,
        mut action: A,
    ) -> Result<ActionId, HistoryError> {
        self.flush_lazy_action();

        if let Err(err) = action.run().await {
            warn!("async action failed and was rolled back: {err}");
            return Err(err);
        }

        self.clear_redo_stack();
        info!(attributes = ?action.data_attributes(), "async action completed");
        Ok(self.push(Box::new(CompletedAsync(action))))
    }

    /// Revert the most recent entry.  Returns `false` when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        self.flush_lazy_action();
        let Some(mut entry) = self.undo_stack.pop() else {
            return false;
        };
        debug!(id = %entry.id, action = %entry.action.name(), "undo");
        entry.action.undo();
        self.redo_stack.push(entry);
        true
    }

    /// Re-apply the most recently undone entry.  Returns `false` when there
    /// is nothing to redo.
    pub fn redo(&mut self) -> bool {
        self.flush_lazy_action();
        let Some(mut entry) = self.redo_stack.pop() else {
            return false;
        };
        debug!(id = %entry.id, action = %entry.action.name(), "redo");
        entry.action.redo();
        self.undo_stack.push(entry);
        true
    }

    /// Undo entries until `id` is the most recent applied one.
    ///
    /// Does nothing when `id` is not on the undo stack.  Returns the number
    /// of entries undone.
    pub fn undo_to(&mut self, id: ActionId) -> usize {
        self.flush_lazy_action();
        if !self.undo_stack.iter().any(|e| e.id == id) {
            return 0;
        }
        let mut undone = 0;
        while self.undo_stack.last().is_some_and(|e| e.id != id) {
            self.undo();
            undone += 1;
        }
        undone
    }

    /// Redo entries until `id` has been re-applied.
    ///
    /// Does nothing when `id` is not on the redo stack.  Returns the number
    /// of entries redone.
    pub fn redo_to(&mut self, id: ActionId) -> usize {
        self.flush_lazy_action();
        let mut redone = 0;
        while self.redo_stack.iter().any(|e| e.id == id) {
            self.redo();
            redone += 1;
        }
        redone
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty() || self.pending.is_some()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// Applied entries, oldest first.
    pub fn undo_names(&self) -> Vec<(ActionId, String)> {
        self.undo_stack.iter().map(|e| (e.id, e.action.name())).collect()
    }

    /// Undone entries, next-to-redo last.
    pub fn redo_names(&self) -> Vec<(ActionId, String)> {
        self.redo_stack.iter().map(|e| (e.id, e.action.name())).collect()
    }

    /// Forget everything, e.g. when a different graph is loaded.  The open
    /// lazy action is dropped without being committed.
    pub fn reset(&mut self) {
        if let Some(mut pending) = self.pending.take() {
            pending.action.set_open(false);
        }
        self.undo_stack.clear();
        self.redo_stack.clear();
        info!("history reset");
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn push(&mut self, action: Box<dyn UndoRedoAction>) -> ActionId {
        let id = ActionId(self.next_id);
        self.next_id += 1;
        self.undo_stack.push(HistoryEntry { id, action });

        if self.undo_stack.len() > self.config.max_undo_actions {
            let overflow = self.undo_stack.len() - self.config.max_undo_actions;
            self.undo_stack.drain(..overflow);
        }
        id
    }

    fn clear_redo_stack(&mut self) {
        self.redo_stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{LazyCell, LazyId};
    use std::sync::{Arc, Mutex};

    /// Adds `amount` to a shared counter.
    struct Add {
        value: Arc<Mutex<i64>>,
        amount: i64,
    }

    impl UndoRedoAction for Add {
        fn name(&self) -> String {
            format!("add {}", self.amount)
        }

        fn run(&mut self) {
            *self.value.lock().unwrap() += self.amount;
        }

        fn undo(&mut self) {
            *self.value.lock().unwrap() -= self.amount;
        }
    }

    /// Sets a shared counter, coalescing changes.
    #[derive(Clone)]
    struct LazySet {
        value: Arc<Mutex<i64>>,
        cell: LazyCell<i64>,
    }

    impl LazySet {
        fn new(value: &Arc<Mutex<i64>>, to: i64) -> Self {
            let from = *value.lock().unwrap();
            Self {
                value: value.clone(),
                cell: LazyCell::new(from, to),
            }
        }

        fn change_value(&self, to: i64) -> Result<(), HistoryError> {
            self.cell.set_to(to, || self.name())?;
            *self.value.lock().unwrap() = to;
            Ok(())
        }
    }

    impl UndoRedoAction for LazySet {
        fn name(&self) -> String {
            "set value".into()
        }

        fn run(&mut self) {
            *self.value.lock().unwrap() = self.cell.to();
        }

        fn undo(&mut self) {
            *self.value.lock().unwrap() = self.cell.from();
        }
    }

    impl LazyUndoRedoAction for LazySet {
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

    fn add(value: &Arc<Mutex<i64>>, amount: i64) -> Add {
        Add { value: value.clone(), amount }
    }

    #[test]
    fn undo_and_redo_move_entries_between_stacks() {
        let value = Arc::new(Mutex::new(0));
        let mut history = UndoRedoStore::default();

        history.apply_action(add(&value, 2));
        history.apply_action(add(&value, 3));
        assert_eq!(*value.lock().unwrap(), 5);

        assert!(history.undo());
        assert_eq!(*value.lock().unwrap(), 2);
        assert_eq!((history.undo_len(), history.redo_len()), (1, 1));

        assert!(history.redo());
        assert_eq!(*value.lock().unwrap(), 5);
        assert_eq!((history.undo_len(), history.redo_len()), (2, 0));
    }

    #[test]
    fn undo_and_redo_on_empty_stacks_are_no_ops() {
        let mut history = UndoRedoStore::default();
        assert!(!history.undo());
        assert!(!history.redo());
        assert!(!history.can_undo());
    }

    #[test]
    fn new_action_clears_redo_stack() {
        let value = Arc::new(Mutex::new(0));
        let mut history = UndoRedoStore::default();

        history.apply_action(add(&value, 1));
        history.undo();
        history.apply_action(add(&value, 10));

        assert!(!history.can_redo());
        assert!(!history.redo());
        assert_eq!(*value.lock().unwrap(), 10);
    }

    #[test]
    fn lazy_action_changes_coalesce_into_one_entry() {
        let value = Arc::new(Mutex::new(0));
        let mut history = UndoRedoStore::default();

        let set = LazySet::new(&value, 1);
        history.apply_lazy_action(set.clone());
        assert_eq!(*value.lock().unwrap(), 1, "queued applies the optimistic value");

        for to in 2..=10 {
            assert!(history.is_queued(&set));
            set.change_value(to).unwrap();
        }
        assert_eq!(history.undo_len(), 0);

        history.flush_lazy_action();
        assert_eq!(history.undo_len(), 1);
        assert_eq!(*value.lock().unwrap(), 10);

        history.undo();
        assert_eq!(*value.lock().unwrap(), 0);
        history.redo();
        assert_eq!(*value.lock().unwrap(), 10);
    }

    #[test]
    fn flushed_lazy_action_refuses_changes() {
        let value = Arc::new(Mutex::new(0));
        let mut history = UndoRedoStore::default();

        let set = LazySet::new(&value, 1);
        history.apply_lazy_action(set.clone());
        history.flush_lazy_action();

        assert!(!history.is_queued(&set));
        assert!(matches!(set.change_value(7), Err(HistoryError::LazyActionNotOpen(_))));
        assert_eq!(*value.lock().unwrap(), 1);
    }

    #[test]
    fn reapplying_flushed_lazy_action_is_refused() {
        let value = Arc::new(Mutex::new(0));
        let mut history = UndoRedoStore::default();

        let set = LazySet::new(&value, 1);
        assert!(history.apply_lazy_action(set.clone()));
        history.flush_lazy_action();

        assert!(!history.apply_lazy_action(set.clone()));
        assert!(!history.is_queued(&set));
        assert!(set.change_value(2).is_err());
        assert!(history.flush_lazy_action().is_none());

        assert_eq!(history.undo_len(), 1);
        history.undo();
        assert_eq!(*value.lock().unwrap(), 0);
        history.redo();
        assert_eq!(*value.lock().unwrap(), 1);
    }

    #[test]
    fn flush_without_open_action_is_a_no_op() {
        let mut history = UndoRedoStore::default();
        assert!(history.flush_lazy_action().is_none());
        assert_eq!(history.undo_len(), 0);
    }

    #[test]
    fn second_lazy_action_commits_the_first() {
        let value = Arc::new(Mutex::new(0));
        let mut history = UndoRedoStore::default();

        history.apply_lazy_action(LazySet::new(&value, 1));
        let second = LazySet::new(&value, 2);
        history.apply_lazy_action(second.clone());

        assert_eq!(history.undo_len(), 1);
        assert!(history.is_queued(&second));
    }

    #[test]
    fn reapplying_open_lazy_action_does_not_requeue() {
        let value = Arc::new(Mutex::new(0));
        let mut history = UndoRedoStore::default();

        let set = LazySet::new(&value, 1);
        history.apply_lazy_action(set.clone());
        set.change_value(4).unwrap();
        history.apply_lazy_action(set.clone());

        assert_eq!(*value.lock().unwrap(), 4);
        assert_eq!(history.undo_len(), 0);
    }

    #[test]
    fn undo_flushes_open_lazy_action_first() {
        let value = Arc::new(Mutex::new(0));
        let mut history = UndoRedoStore::default();

        history.apply_action(add(&value, 5));
        history.apply_lazy_action(LazySet::new(&value, 9));
        history.undo();

        assert_eq!(*value.lock().unwrap(), 5);
        assert_eq!(history.undo_len(), 1);
        assert_eq!(history.redo_names()[0].1, "set value");
    }

    #[test]
    fn idle_lazy_action_is_flushed_after_timeout() {
        let value = Arc::new(Mutex::new(0));
        let mut history = UndoRedoStore::new(HistoryConfig {
            lazy_action_timeout: Duration::from_millis(50),
            ..HistoryConfig::default()
        });

        history.apply_lazy_action(LazySet::new(&value, 3));
        assert!(!history.flush_idle_lazy_action(Instant::now()));
        assert!(history.flush_idle_lazy_action(Instant::now() + Duration::from_millis(60)));
        assert_eq!(history.undo_len(), 1);
    }

    #[test]
    fn oldest_entries_are_dropped_past_the_limit() {
        let value = Arc::new(Mutex::new(0));
        let mut history = UndoRedoStore::new(HistoryConfig {
            max_undo_actions: 3,
            ..HistoryConfig::default()
        });

        for amount in 1..=5 {
            history.apply_action(add(&value, amount));
        }
        let names: Vec<_> = history.undo_names().into_iter().map(|(_, n)| n).collect();
        assert_eq!(names, vec!["add 3", "add 4", "add 5"]);
    }

    #[test]
    fn undo_to_and_redo_to_walk_the_history() {
        let value = Arc::new(Mutex::new(0));
        let mut history = UndoRedoStore::default();

        let first = history.apply_action(add(&value, 1));
        history.apply_action(add(&value, 10));
        let third = history.apply_action(add(&value, 100));

        assert_eq!(history.undo_to(first), 2);
        assert_eq!(*value.lock().unwrap(), 1);

        assert_eq!(history.redo_to(third), 2);
        assert_eq!(*value.lock().unwrap(), 111);

        assert_eq!(history.redo_to(third), 0);
    }

    #[test]
    fn reset_drops_everything() {
        let value = Arc::new(Mutex::new(0));
        let mut history = UndoRedoStore::default();

        history.apply_action(add(&value, 1));
        history.undo();
        let set = LazySet::new(&value, 2);
        history.apply_lazy_action(set.clone());
        history.reset();

        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert!(set.change_value(3).is_err());
    }
}
