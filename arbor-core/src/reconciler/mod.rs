//! Reconciler
//!
//! The reconciler keeps a live host tree in sync with a stream of tree
//! descriptions. It is split by concern:
//!
//! - `diff`: the node differ, one live node against one description
//! - `children`: keyed and positional matching of child lists
//! - `attributes`: property sets of a single node
//! - `lifecycle`: component instances, render passes and unmounting
//!
//! # Side Tables
//!
//! Host nodes are opaque, so everything the engine needs to remember about
//! a node lives in maps owned by the reconciler:
//!
//! - `owners`: base node of a component chain to its outermost instance.
//!   This is a lookup, not ownership; instances live in `instances`.
//! - `keys`: live node to the key of the description that produced it.
//!
//! # Re-entrancy
//!
//! Rendering a component reconciles its output, which may mount more
//! components, which render in turn. Instances are `Rc<RefCell<_>>` and a
//! borrow is never held across a nested reconciliation, so the recursion
//! never observes a locked instance.
//!
//! # Flushing
//!
//! State changes queue in the [`Scheduler`]. [`Reconciler::flush`] drains a
//! batch synchronously; [`run_scheduled`] waits for the scheduler's signal
//! first, which is the deferred flush when running on a tokio `LocalSet`.

mod attributes;
mod children;
mod diff;
mod lifecycle;

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use tracing::{debug, trace};

use crate::component::{ComponentId, ComponentInstance};
use crate::config::ReconcilerConfig;
use crate::error::RenderError;
use crate::host::Host;
use crate::scheduler::{Batch, FlushReport, PendingChange, Scheduler, StateChange, Updater};
use crate::vnode::{Key, Props, State, VNode};

type InstanceRef<N> = Rc<RefCell<ComponentInstance<N>>>;

/// Where a node is being reconciled, from the component system's view.
#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    /// Component instance whose base currently occupies the slot.
    existing: Option<ComponentId>,
    /// Component rendering the slot as its root output, if any.
    outer: Option<ComponentId>,
}

impl Slot {
    fn child(existing: Option<ComponentId>) -> Self {
        Self {
            existing,
            outer: None,
        }
    }
}

/// Virtual-DOM reconciler over a [`Host`].
pub struct Reconciler<H: Host> {
    host: H,
    config: ReconcilerConfig,
    scheduler: Scheduler,
    updater: Updater,
    instances: HashMap<ComponentId, InstanceRef<H::Node>>,
    owners: HashMap<H::Node, ComponentId>,
    keys: HashMap<H::Node, Key>,
}

impl<H: Host> Reconciler<H> {
    /// Create a reconciler with the default configuration.
    pub fn new(host: H) -> Self {
        Self::with_config(host, ReconcilerConfig::default())
    }

    pub fn with_config(host: H, config: ReconcilerConfig) -> Self {
        let scheduler = Scheduler::new();
        let updater = scheduler.updater();
        Self {
            host,
            config,
            scheduler,
            updater,
            instances: HashMap::new(),
            owners: HashMap::new(),
            keys: HashMap::new(),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Handle for requesting state changes on this reconciler's components.
    pub fn updater(&self) -> Updater {
        self.updater.clone()
    }

    /// Whether state changes are waiting for a flush.
    pub fn is_flush_pending(&self) -> bool {
        self.scheduler.is_flush_pending()
    }

    /// Reconcile `vnode` against `existing` (or nothing) and make sure the
    /// result is a child of `container`.
    pub fn mount(
        &mut self,
        vnode: &VNode,
        container: &H::Node,
        existing: Option<&H::Node>,
    ) -> Result<H::Node, RenderError> {
        let slot = Slot::child(existing.and_then(|node| self.owner_of(node)));
        let root = self.diff_node(existing.cloned(), vnode, slot)?;

        if self.host.parent(&root).as_ref() != Some(container) {
            self.host.append_child(container, &root)?;
        }
        debug!(root = ?root, "mounted tree");
        Ok(root)
    }

    /// Remove a mounted tree, unmounting every component inside it.
    pub fn unmount_root(&mut self, root: &H::Node) -> Result<(), RenderError> {
        self.host.remove_node(root)?;
        self.release_subtree(root)
    }

    /// Queue a state change for a component, as the component itself would.
    pub fn set_state(&self, component: ComponentId, change: impl Into<StateChange>) {
        self.updater.request_state_change(component, change.into());
    }

    /// Apply the pending batch: merge every queued state change in arrival
    /// order, then render each affected component exactly once.
    ///
    /// A failing updater aborts the flush; the rest of the batch is dropped
    /// and the changes already merged stay merged.
    pub fn flush(&mut self) -> Result<FlushReport, RenderError> {
        let Batch {
            mut changes,
            render,
        } = self.scheduler.take_batch();
        let mut report = FlushReport::default();
        let mut touched = Vec::new();

        let applied = self.apply_changes(&mut changes, &mut report, &mut touched);

        for id in touched {
            if let Some(instance) = self.instances.get(&id) {
                instance.borrow_mut().prev_state = None;
            }
        }
        applied?;

        for id in render {
            if self.instances.contains_key(&id) {
                self.render_pass(id)?;
                report.rendered += 1;
            } else {
                trace!(%id, "skipping render of unmounted component");
                report.skipped += 1;
            }
        }

        debug!(
            applied = report.applied,
            rendered = report.rendered,
            skipped = report.skipped,
            "flush finished"
        );
        Ok(report)
    }

    fn apply_changes(
        &self,
        changes: &mut VecDeque<PendingChange>,
        report: &mut FlushReport,
        touched: &mut Vec<ComponentId>,
    ) -> Result<(), RenderError> {
        while let Some(PendingChange { component, change }) = changes.pop_front() {
            let Some(instance) = self.instances.get(&component) else {
                trace!(%component, "dropping state change for unmounted component");
                report.skipped += 1;
                continue;
            };

            let mut guard = instance.borrow_mut();
            let ComponentInstance {
                props,
                state,
                prev_state,
                ..
            } = &mut *guard;

            if prev_state.is_none() {
                touched.push(component);
            }
            let prev = prev_state.get_or_insert_with(|| state.clone());
            let entries = change
                .resolve(prev, props)
                .map_err(|source| RenderError::Updater { component, source })?;

            state.extend(entries);
            *prev_state = Some(state.clone());
            report.applied += 1;
        }
        Ok(())
    }

    /// Current state of a mounted component.
    pub fn state(&self, component: ComponentId) -> Option<State> {
        self.instances
            .get(&component)
            .map(|instance| instance.borrow().state.clone())
    }

    /// Current props of a mounted component.
    pub fn props(&self, component: ComponentId) -> Option<Props> {
        self.instances
            .get(&component)
            .map(|instance| instance.borrow().props.clone())
    }

    /// The live node a mounted component last produced.
    pub fn base_of(&self, component: ComponentId) -> Option<H::Node> {
        self.instances
            .get(&component)
            .and_then(|instance| instance.borrow().base.clone())
    }

    /// The outermost component whose output is `node`.
    pub fn component_of(&self, node: &H::Node) -> Option<ComponentId> {
        self.owner_of(node)
    }

    pub fn is_mounted(&self, component: ComponentId) -> bool {
        self.instances.contains_key(&component)
    }

    /// Number of mounted component instances.
    pub fn mounted_count(&self) -> usize {
        self.instances.len()
    }

    fn owner_of(&self, node: &H::Node) -> Option<ComponentId> {
        self.owners.get(node).copied()
    }

    fn instance(&self, id: ComponentId) -> Result<InstanceRef<H::Node>, RenderError> {
        self.instances
            .get(&id)
            .cloned()
            .ok_or(RenderError::NotMounted(id))
    }

    /// Unmount every component in a discarded subtree and drop the side
    /// table entries of its nodes.
    fn release_subtree(&mut self, root: &H::Node) -> Result<(), RenderError> {
        let mut stack = vec![root.clone()];
        while let Some(node) = stack.pop() {
            if let Some(id) = self.owner_of(&node) {
                self.unmount(id)?;
            }
            self.forget(&node);
            stack.extend(self.host.child_nodes(&node).into_iter().rev());
        }
        Ok(())
    }

    /// Release a node that was replaced in place. Whoever rendered it has
    /// already moved on to the replacement; only what hangs below it goes.
    fn release_replaced(&mut self, node: &H::Node) -> Result<(), RenderError> {
        self.forget(node);
        for child in self.host.child_nodes(node) {
            self.release_subtree(&child)?;
        }
        Ok(())
    }

    fn forget(&mut self, node: &H::Node) {
        self.owners.remove(node);
        self.keys.remove(node);
    }
}

/// Wait for the scheduler to request a flush, then run it.
///
/// Meant for a current-thread tokio runtime or a `LocalSet`: the flush runs
/// once the task that queued the first state change yields.
///
/// A batch flushed directly through [`Reconciler::flush`] leaves its signal
/// behind; such a wakeup finds nothing pending and keeps waiting.
pub async fn run_scheduled<H: Host>(
    reconciler: &RefCell<Reconciler<H>>,
) -> Result<FlushReport, RenderError> {
    let updater = reconciler.borrow().updater();
    loop {
        updater.flush_requested().await;
        if reconciler.borrow().is_flush_pending() {
            break;
        }
        trace!("ignoring signal of an already flushed batch");
    }
    reconciler.borrow_mut().flush()
}

/// Flush every scheduled batch until a flush fails.
pub async fn drive<H: Host>(reconciler: Rc<RefCell<Reconciler<H>>>) -> Result<(), RenderError> {
    loop {
        run_scheduled(&reconciler).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Component, ComponentType, Context, FromProps};
    use crate::error::ComponentError;
    use crate::host::{MemoryHost, MemoryNode};
    use crate::vnode::{element, ComponentNode};
    use serde_json::Value;

    struct Counter;

    impl Component for Counter {
        fn initial_state(&self, _props: &Props) -> State {
            let mut state = State::new();
            state.insert("x".into(), Value::from(0));
            state
        }

        fn render(&mut self, cx: &Context<'_>) -> VNode {
            element("span").child(cx.state()["x"].to_string()).into()
        }
    }

    impl FromProps for Counter {
        fn from_props(_props: &Props) -> Self {
            Counter
        }
    }

    fn mount_counter() -> (Reconciler<MemoryHost>, MemoryNode, ComponentId) {
        let mut reconciler = Reconciler::new(MemoryHost::new());
        let container = reconciler.host_mut().create_element("div").unwrap();
        let vnode = ComponentNode::new(ComponentType::of::<Counter>()).into();
        let root = reconciler.mount(&vnode, &container, None).unwrap();
        let id = reconciler.component_of(&root).unwrap();
        (reconciler, container, id)
    }

    #[test]
    fn mount_appends_into_container() {
        let (reconciler, container, id) = mount_counter();
        assert_eq!(reconciler.host().inner_markup(container), "<span>0</span>");
        assert!(reconciler.is_mounted(id));
    }

    #[test]
    fn flush_merges_changes_and_renders_once() {
        let (mut reconciler, container, id) = mount_counter();

        reconciler.set_state(id, StateChange::merge([("x", 1)]));
        reconciler.set_state(
            id,
            StateChange::update(|prev, _| {
                let mut out = State::new();
                out.insert("y".into(), Value::from(prev["x"].as_i64().unwrap() + 1));
                out
            }),
        );
        assert!(reconciler.is_flush_pending());

        let report = reconciler.flush().unwrap();

        assert_eq!(report.applied, 2);
        assert_eq!(report.rendered, 1);
        let state = reconciler.state(id).unwrap();
        assert_eq!(state["x"], Value::from(1));
        assert_eq!(state["y"], Value::from(2));
        assert_eq!(reconciler.host().inner_markup(container), "<span>1</span>");
    }

    #[test]
    fn prev_state_is_cleared_after_flush() {
        let (mut reconciler, _, id) = mount_counter();
        reconciler.set_state(id, StateChange::merge([("x", 5)]));
        reconciler.flush().unwrap();

        let instance = reconciler.instance(id).unwrap();
        assert!(instance.borrow().prev_state.is_none());
    }

    #[test]
    fn failing_updater_aborts_the_rest_of_the_batch() {
        let (mut reconciler, container, id) = mount_counter();

        reconciler.set_state(id, StateChange::merge([("x", 1)]));
        reconciler.set_state(id, StateChange::try_update(|_, _| Err(ComponentError::new("bad"))));
        reconciler.set_state(id, StateChange::merge([("x", 3)]));

        let err = reconciler.flush().unwrap_err();
        assert!(matches!(err, RenderError::Updater { component, .. } if component == id));

        // The first change stuck, the third was dropped, nothing re-rendered.
        assert_eq!(reconciler.state(id).unwrap()["x"], Value::from(1));
        assert!(!reconciler.is_flush_pending());
        assert_eq!(reconciler.host().inner_markup(container), "<span>0</span>");
    }

    #[test]
    fn changes_for_unmounted_components_are_skipped() {
        let (mut reconciler, container, id) = mount_counter();
        let root = reconciler.base_of(id).unwrap();

        reconciler.set_state(id, StateChange::merge([("x", 1)]));
        reconciler.unmount_root(&root).unwrap();
        let report = reconciler.flush().unwrap();

        assert_eq!(report, FlushReport { applied: 0, rendered: 0, skipped: 2 });
        assert_eq!(reconciler.host().inner_markup(container), "");
        assert_eq!(reconciler.mounted_count(), 0);
    }
}
