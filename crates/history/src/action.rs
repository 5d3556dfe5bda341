//! The action traits every undoable edit implements.
//!
//! - [`UndoRedoAction`] is a plain synchronous edit.
//! - [`LazyUndoRedoAction`] is an edit that stays open while a gesture is in
//!   progress and is committed as one history entry when flushed.
//! - [`AsyncUndoRedoAction`] is an edit whose first run awaits the network.
//!   Once that run has finished, undo and redo are synchronous.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::HistoryError;

/// Structured telemetry attached to an action.  Never affects behaviour.
pub type DataAttributes = BTreeMap<&'static str, String>;

/// A reversible edit.
pub trait UndoRedoAction: Send {
    /// Human readable name for history listings.
    fn name(&self) -> String;

    /// Perform the edit for the first time.
    fn run(&mut self);

    /// Restore the state observed before `run`.
    fn undo(&mut self);

    /// Re-apply the edit after an `undo`.
    fn redo(&mut self) {
        self.run();
    }

    fn data_attributes(&self) -> DataAttributes {
        DataAttributes::new()
    }
}

impl<A: UndoRedoAction + ?Sized> UndoRedoAction for Box<A> {
    fn name(&self) -> String {
        (**self).name()
    }

    fn run(&mut self) {
        (**self).run();
    }

    fn undo(&mut self) {
        (**self).undo();
    }

    fn redo(&mut self) {
        (**self).redo();
    }

    fn data_attributes(&self) -> DataAttributes {
        (**self).data_attributes()
    }
}

/// Identity of a lazy action, shared by all clones of its handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LazyId(u64);

impl LazyId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// An edit that coalesces a burst of changes into one history entry.
///
/// Implementors are cheap `Clone` handles: the caller keeps one clone to
/// call the type's mutator on, the history store owns another.
pub trait LazyUndoRedoAction: UndoRedoAction {
    fn lazy_id(&self) -> LazyId;

    /// Apply the current target value when the action becomes the open one.
    fn queued(&mut self);

    /// Open or close the action for mutation.  Driven by the history store.
    fn set_open(&mut self, open: bool);

    /// Close the action for good once its history entry is recorded.
    fn commit(&mut self);

    fn is_committed(&self) -> bool;
}

impl<A: LazyUndoRedoAction + ?Sized> LazyUndoRedoAction for Box<A> {
    fn lazy_id(&self) -> LazyId {
        (**self).lazy_id()
    }

    fn queued(&mut self) {
        (**self).queued();
    }

    fn set_open(&mut self, open: bool) {
        (**self).set_open(open);
    }

    fn commit(&mut self) {
        (**self).commit();
    }

    fn is_committed(&self) -> bool {
        (**self).is_committed()
    }
}

/// An edit whose first run suspends on remote calls.
///
/// `run` either completes every phase or leaves the graph as it found it
/// and returns the error.
#[async_trait]
pub trait AsyncUndoRedoAction: Send {
    fn name(&self) -> String;

    async fn run(&mut self) -> Result<(), HistoryError>;

    fn undo(&mut self);

    fn redo(&mut self);

    fn data_attributes(&self) -> DataAttributes {
        DataAttributes::new()
    }
}

// ---------------------------------------------------------------------------
// LazyCell
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct LazyState<T> {
    from: T,
    to: T,
    open: bool,
    committed: bool,
}

/// Shared from/to pair backing a lazy action.
///
/// `from` is fixed at construction; `to` may only change while the owning
/// action is open.  A committed cell stays closed.
#[derive(Debug, Clone)]
pub struct LazyCell<T> {
    id: LazyId,
    state: Arc<Mutex<LazyState<T>>>,
}

impl<T: Clone> LazyCell<T> {
    pub fn new(from: T, to: T) -> Self {
        Self {
            id: LazyId::next(),
            state: Arc::new(Mutex::new(LazyState {
                from,
                to,
                open: false,
                committed: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LazyState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> LazyId {
        self.id
    }

    pub fn from(&self) -> T {
        self.lock().from.clone()
    }

    pub fn to(&self) -> T {
        self.lock().to.clone()
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    pub fn set_open(&self, open: bool) {
        let mut state = self.lock();
        state.open = open && !state.committed;
    }

    pub fn commit(&self) {
        let mut state = self.lock();
        state.open = false;
        state.committed = true;
    }

    pub fn is_committed(&self) -> bool {
        self.lock().committed
    }

    /// Replace the target value.  Fails, changing nothing, when closed.
    pub fn set_to(&self, value: T, action_name: impl FnOnce() -> String) -> Result<(), HistoryError> {
        let mut state = self.lock();
        if !state.open {
            return Err(HistoryError::LazyActionNotOpen(action_name()));
        }
        state.to = value;
        Ok(())
    }
}
