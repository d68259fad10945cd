//! Update Scheduler
//!
//! Components never re-render synchronously when they ask for a state
//! change. The request is queued here and applied by the next flush, so any
//! number of changes made in one synchronous turn cost a single render per
//! component.
//!
//! # Batches
//!
//! The scheduler owns two queues for the batch in flight:
//!
//! - the **state-change queue**: `(component, change)` entries in arrival
//!   order
//! - the **render queue**: the set of components to re-render, in first
//!   arrival order
//!
//! The first request of a batch marks a flush as pending and releases a
//! [`tokio::sync::Notify`] permit. Later requests join the same batch
//! without scheduling anything else. Whoever drives the reconciler (see
//! [`run_scheduled`](crate::reconciler::run_scheduled)) waits on that permit
//! and flushes; embedders with their own loop can call
//! [`Reconciler::flush`](crate::Reconciler::flush) directly.
//!
//! A flush takes the whole batch at once, so requests made while it runs
//! (from lifecycle hooks, typically) start the next batch.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexSet;
use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::component::ComponentId;
use crate::error::ComponentError;
use crate::vnode::{Props, State};

type UpdateFn = Box<dyn FnOnce(&State, &Props) -> Result<State, ComponentError>>;

/// A requested change to a component's state.
pub enum StateChange {
    /// Shallow-merge these entries into the state.
    Merge(State),

    /// Compute entries from `(prev_state, props)` and shallow-merge them.
    Update(UpdateFn),
}

impl StateChange {
    /// A plain mapping change.
    pub fn merge<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<serde_json::Value>,
    {
        StateChange::Merge(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// A functional updater.
    pub fn update<F>(f: F) -> Self
    where
        F: FnOnce(&State, &Props) -> State + 'static,
    {
        StateChange::Update(Box::new(move |prev, props| Ok(f(prev, props))))
    }

    /// A functional updater that may fail. A failure aborts the flush.
    pub fn try_update<F>(f: F) -> Self
    where
        F: FnOnce(&State, &Props) -> Result<State, ComponentError> + 'static,
    {
        StateChange::Update(Box::new(f))
    }

    /// Resolve the change into the entries to merge.
    pub(crate) fn resolve(self, prev: &State, props: &Props) -> Result<State, ComponentError> {
        match self {
            StateChange::Merge(entries) => Ok(entries),
            StateChange::Update(f) => f(prev, props),
        }
    }
}

impl From<State> for StateChange {
    fn from(entries: State) -> Self {
        StateChange::Merge(entries)
    }
}

impl fmt::Debug for StateChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateChange::Merge(entries) => f.debug_tuple("Merge").field(entries).finish(),
            StateChange::Update(_) => f.write_str("Update(..)"),
        }
    }
}

/// One entry of the state-change queue.
#[derive(Debug)]
pub(crate) struct PendingChange {
    pub(crate) component: ComponentId,
    pub(crate) change: StateChange,
}

/// The queues of one batch, handed to the flush as a unit.
#[derive(Debug, Default)]
pub(crate) struct Batch {
    pub(crate) changes: VecDeque<PendingChange>,
    pub(crate) render: IndexSet<ComponentId>,
}

/// Outcome of one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// State changes merged into their component.
    pub applied: usize,
    /// Render passes performed.
    pub rendered: usize,
    /// Changes and renders dropped because their component was gone.
    pub skipped: usize,
}

#[derive(Default)]
struct Shared {
    batch: RefCell<Batch>,
    flush_pending: Cell<bool>,
    notify: Notify,
}

/// Owner of the batch queues.
///
/// Each [`Reconciler`](crate::Reconciler) has its own scheduler, so
/// independent reconcilers never share a batch.
pub struct Scheduler {
    shared: Rc<Shared>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            shared: Rc::new(Shared::default()),
        }
    }

    /// A handle components use to request state changes.
    pub fn updater(&self) -> Updater {
        Updater {
            shared: Rc::clone(&self.shared),
        }
    }

    /// Whether a batch is waiting for its flush.
    pub fn is_flush_pending(&self) -> bool {
        self.shared.flush_pending.get()
    }

    /// Take the batch in flight, leaving empty queues behind.
    pub(crate) fn take_batch(&self) -> Batch {
        self.shared.flush_pending.set(false);
        let batch = std::mem::take(&mut *self.shared.batch.borrow_mut());
        debug!(
            changes = batch.changes.len(),
            renders = batch.render.len(),
            "flush started"
        );
        batch
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable handle for requesting state changes.
#[derive(Clone)]
pub struct Updater {
    shared: Rc<Shared>,
}

impl Updater {
    /// Queue `change` for `component`.
    ///
    /// The first request of a batch schedules the flush; the component is
    /// added to the render queue once no matter how many changes it gets.
    pub fn request_state_change(&self, component: ComponentId, change: StateChange) {
        let mut batch = self.shared.batch.borrow_mut();

        if batch.changes.is_empty() && !self.shared.flush_pending.get() {
            self.shared.flush_pending.set(true);
            self.shared.notify.notify_one();
            debug!(%component, "flush scheduled");
        }

        trace!(%component, ?change, "state change queued");
        batch.changes.push_back(PendingChange { component, change });
        batch.render.insert(component);
    }

    /// Resolves once a flush has been scheduled.
    ///
    /// The signal is a single stored permit. If the batch was flushed
    /// without waiting here, the permit outlives it and the next call
    /// resolves at once; check [`Scheduler::is_flush_pending`] after waking.
    pub async fn flush_requested(&self) {
        self.shared.notify.notified().await;
    }

    /// Number of queued state changes.
    pub fn pending_changes(&self) -> usize {
        self.shared.batch.borrow().changes.len()
    }

    /// Number of components queued for a render pass.
    pub fn pending_renders(&self) -> usize {
        self.shared.batch.borrow().render.len()
    }
}

impl fmt::Debug for Updater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Updater")
            .field("pending_changes", &self.pending_changes())
            .finish()
    }
}
