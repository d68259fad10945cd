//! Component Lifecycle Manager
//!
//! Maps component descriptions to persistent instances and drives their
//! hooks.
//!
//! # Slots
//!
//! A component is reconciled in a [`Slot`]: the instance currently
//! occupying the position (if any) and the component that renders the
//! position as its own root (if any). When the description's type equals
//! the existing instance's type, the instance is updated; otherwise the old
//! instance is unmounted and a fresh one is mounted in its place.
//!
//! # Nested Roots
//!
//! When component `A` renders component `B` at its root, both share one
//! base node. `A.inner` points at `B` and `B.outer` at `A`; the `owners`
//! table maps the shared node to `A`, the outermost instance. Re-rendering
//! `B` alone may produce a new node, in which case every outer instance
//! still pointing at the old node adopts the new one.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, trace};

use super::{Reconciler, Slot};
use crate::component::{ComponentId, ComponentInstance};
use crate::error::{Hook, RenderError};
use crate::host::Host;
use crate::vnode::{ComponentNode, Props};

impl<H: Host> Reconciler<H> {
    pub(super) fn diff_component(
        &mut self,
        live: Option<H::Node>,
        description: &ComponentNode,
        slot: Slot,
    ) -> Result<H::Node, RenderError> {
        if let Some(id) = slot.existing {
            let same_type = self
                .instances
                .get(&id)
                .is_some_and(|instance| instance.borrow().kind == description.kind);

            if same_type {
                trace!(%id, component = description.kind.name(), "updating component");
                if let Some(instance) = self.instances.get(&id) {
                    instance.borrow_mut().refresh_kind(&description.kind);
                }
                self.set_props(id, description.props.clone())?;
                return self.rendered_base(id);
            }
            self.unmount(id)?;
        }

        let instance = ComponentInstance::new(&description.kind, &description.props, slot.outer);
        let id = instance.id;
        debug!(%id, component = description.kind.name(), "mounting component");
        self.instances.insert(id, Rc::new(RefCell::new(instance)));
        if let Some(outer) = slot.outer.and_then(|outer| self.instances.get(&outer)) {
            outer.borrow_mut().inner = Some(id);
        }

        if let Err(err) = self.set_props(id, description.props.clone()) {
            self.discard(id);
            return Err(err);
        }
        let base = self.rendered_base(id)?;

        // The fresh base takes the stale node's place.
        if let Some(stale) = live.filter(|stale| *stale != base) {
            if let Some(parent) = self.host.parent(&stale) {
                self.host.replace_child(&parent, &base, &stale)?;
            }
            self.release_replaced(&stale)?;
        }

        Ok(base)
    }

    /// Hand new props to an instance and re-render it.
    fn set_props(&mut self, id: ComponentId, props: Props) -> Result<(), RenderError> {
        let instance = self.instance(id)?;
        {
            let mut instance = instance.borrow_mut();
            if instance.base.is_none() {
                instance.call_hook(Hook::WillMount, &self.updater, None)?;
            } else {
                instance.call_hook(Hook::WillReceiveProps, &self.updater, Some(&props))?;
            }
            instance.props = props;
        }
        self.render_pass(id)
    }

    /// Render an instance and reconcile its output against its base.
    pub(super) fn render_pass(&mut self, id: ComponentId) -> Result<(), RenderError> {
        let instance = self.instance(id)?;
        let (output, previous, inner) = {
            let mut instance = instance.borrow_mut();
            let output = instance.render(&self.updater);
            if instance.base.is_some() {
                instance.call_hook(Hook::WillUpdate, &self.updater, None)?;
            }
            (output, instance.base.clone(), instance.inner)
        };

        let slot = Slot {
            existing: inner,
            outer: Some(id),
        };
        let base = self.diff_node(previous.clone(), &output, slot)?;

        {
            let mut instance = instance.borrow_mut();
            if previous.is_some() {
                instance.call_hook(Hook::DidUpdate, &self.updater, None)?;
            } else {
                instance.call_hook(Hook::DidMount, &self.updater, None)?;
            }
            instance.base = Some(base.clone());
        }
        trace!(%id, ?base, "render pass finished");

        self.adopt(id, previous, base);
        Ok(())
    }

    /// Record `base` as the output of `id` and of every outer instance that
    /// shared the previous base, then move the node's side table entries.
    fn adopt(&mut self, id: ComponentId, previous: Option<H::Node>, base: H::Node) {
        let mut top = id;
        let mut cursor = self.instances.get(&id).and_then(|i| i.borrow().outer);
        while let Some(outer) = cursor {
            let Some(instance) = self.instances.get(&outer) else {
                break;
            };
            let mut instance = instance.borrow_mut();
            if instance.inner != Some(top) {
                break;
            }
            instance.base = Some(base.clone());
            top = outer;
            cursor = instance.outer;
        }

        if let Some(previous) = previous.filter(|previous| *previous != base) {
            if self.owners.get(&previous) == Some(&top) {
                self.owners.remove(&previous);
            }
            if let Some(key) = self.keys.remove(&previous) {
                self.keys.insert(base.clone(), key);
            }
        }
        self.owners.insert(base, top);
    }

    /// Unmount an instance and the chain of instances rendered at its root.
    ///
    /// Hooks run outermost first. The base node is left where it is; callers
    /// replace or remove it.
    pub(super) fn unmount(&mut self, id: ComponentId) -> Result<(), RenderError> {
        let Some(instance) = self.instances.remove(&id) else {
            return Ok(());
        };

        let (base, inner, outer) = {
            let mut instance = instance.borrow_mut();
            debug!(%id, component = instance.kind.name(), "unmounting component");
            instance.call_hook(Hook::WillUnmount, &self.updater, None)?;
            (instance.base.take(), instance.inner.take(), instance.outer)
        };

        if let Some(inner) = inner {
            self.unmount(inner)?;
        }
        self.unlink(id, base, outer);
        Ok(())
    }

    /// Drop a fresh instance whose mount failed part way.
    ///
    /// It never finished mounting, so `will_unmount` does not run for it.
    /// Components it already mounted at its root are unmounted normally.
    fn discard(&mut self, id: ComponentId) {
        let Some(instance) = self.instances.remove(&id) else {
            return;
        };
        let (base, inner, outer) = {
            let mut instance = instance.borrow_mut();
            (instance.base.take(), instance.inner.take(), instance.outer)
        };
        debug!(%id, "discarding component that failed to mount");

        if let Some(inner) = inner {
            if let Err(err) = self.unmount(inner) {
                debug!(%inner, %err, "unmounting root component of a failed mount failed");
            }
        }
        self.unlink(id, base, outer);
    }

    /// Detach a removed instance from its outer component and the owner table.
    fn unlink(&mut self, id: ComponentId, base: Option<H::Node>, outer: Option<ComponentId>) {
        if let Some(outer) = outer.and_then(|outer| self.instances.get(&outer)) {
            let mut outer = outer.borrow_mut();
            if outer.inner == Some(id) {
                outer.inner = None;
            }
        }
        if let Some(base) = base {
            if self.owners.get(&base) == Some(&id) {
                self.owners.remove(&base);
            }
        }
    }

    fn rendered_base(&self, id: ComponentId) -> Result<H::Node, RenderError> {
        self.instance(id)?
            .borrow()
            .base
            .clone()
            .ok_or(RenderError::NotMounted(id))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use serde_json::Value;

    use crate::component::{Component, ComponentType, Context, FromProps};
    use crate::error::{ComponentError, HookResult, RenderError};
    use crate::host::{Host, MemoryHost, MemoryNode};
    use crate::scheduler::StateChange;
    use crate::vnode::{element, ComponentNode, Props, VNode};
    use crate::Reconciler;

    thread_local! {
        static EVENTS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    }

    fn log(event: impl Into<String>) {
        EVENTS.with(|events| events.borrow_mut().push(event.into()));
    }

    fn take_events() -> Vec<String> {
        EVENTS.with(|events| std::mem::take(&mut *events.borrow_mut()))
    }

    /// Logs every hook it receives.
    struct Probe {
        name: &'static str,
    }

    impl Component for Probe {
        fn render(&mut self, cx: &Context<'_>) -> VNode {
            log(format!("{}.render", self.name));
            let label = cx.props().get("label").and_then(Value::as_str).unwrap_or("");
            element("p").child(label.to_owned()).into()
        }

        fn will_mount(&mut self, _cx: &Context<'_>) -> HookResult {
            log(format!("{}.will_mount", self.name));
            Ok(())
        }

        fn did_mount(&mut self, _cx: &Context<'_>) -> HookResult {
            log(format!("{}.did_mount", self.name));
            Ok(())
        }

        fn will_receive_props(&mut self, _cx: &Context<'_>, next: &Props) -> HookResult {
            log(format!("{}.will_receive_props({})", self.name, next["label"]));
            Ok(())
        }

        fn will_update(&mut self, _cx: &Context<'_>) -> HookResult {
            log(format!("{}.will_update", self.name));
            Ok(())
        }

        fn did_update(&mut self, _cx: &Context<'_>) -> HookResult {
            log(format!("{}.did_update", self.name));
            Ok(())
        }

        fn will_unmount(&mut self, _cx: &Context<'_>) -> HookResult {
            log(format!("{}.will_unmount", self.name));
            Ok(())
        }
    }

    struct ProbeA;
    struct ProbeB;

    macro_rules! probe_type {
        ($ty:ident, $name:literal) => {
            impl Component for $ty {
                fn render(&mut self, cx: &Context<'_>) -> VNode {
                    Probe { name: $name }.render(cx)
                }
                fn will_mount(&mut self, cx: &Context<'_>) -> HookResult {
                    Probe { name: $name }.will_mount(cx)
                }
                fn did_mount(&mut self, cx: &Context<'_>) -> HookResult {
                    Probe { name: $name }.did_mount(cx)
                }
                fn will_receive_props(&mut self, cx: &Context<'_>, next: &Props) -> HookResult {
                    Probe { name: $name }.will_receive_props(cx, next)
                }
                fn will_update(&mut self, cx: &Context<'_>) -> HookResult {
                    Probe { name: $name }.will_update(cx)
                }
                fn did_update(&mut self, cx: &Context<'_>) -> HookResult {
                    Probe { name: $name }.did_update(cx)
                }
                fn will_unmount(&mut self, cx: &Context<'_>) -> HookResult {
                    Probe { name: $name }.will_unmount(cx)
                }
            }

            impl FromProps for $ty {
                fn from_props(_props: &Props) -> Self {
                    $ty
                }
            }
        };
    }

    probe_type!(ProbeA, "A");
    probe_type!(ProbeB, "B");

    fn probe<C: FromProps>(label: &str) -> VNode {
        ComponentNode::new(ComponentType::of::<C>())
            .prop("label", label)
            .into()
    }

    fn setup() -> (Reconciler<MemoryHost>, MemoryNode) {
        take_events();
        let mut reconciler = Reconciler::new(MemoryHost::new());
        let container = reconciler.host_mut().create_element("div").unwrap();
        (reconciler, container)
    }

    #[test]
    fn mount_runs_will_mount_render_did_mount() {
        let (mut reconciler, container) = setup();
        reconciler.mount(&probe::<ProbeA>("x"), &container, None).unwrap();

        assert_eq!(take_events(), ["A.will_mount", "A.render", "A.did_mount"]);
        assert_eq!(reconciler.host().inner_markup(container), "<p>x</p>");
    }

    #[test]
    fn same_type_receives_props_and_keeps_its_node() {
        let (mut reconciler, container) = setup();
        let root = reconciler.mount(&probe::<ProbeA>("x"), &container, None).unwrap();
        let id = reconciler.component_of(&root).unwrap();
        take_events();

        let again = reconciler
            .mount(&probe::<ProbeA>("y"), &container, Some(&root))
            .unwrap();

        assert_eq!(again, root);
        assert_eq!(reconciler.component_of(&again), Some(id));
        assert_eq!(
            take_events(),
            [
                "A.will_receive_props(\"y\")",
                "A.render",
                "A.will_update",
                "A.did_update"
            ]
        );
        assert_eq!(reconciler.host().inner_markup(container), "<p>y</p>");
    }

    #[test]
    fn type_change_unmounts_then_mounts() {
        let (mut reconciler, container) = setup();
        let root = reconciler.mount(&probe::<ProbeA>("x"), &container, None).unwrap();
        let a = reconciler.component_of(&root).unwrap();
        take_events();

        let next = reconciler
            .mount(&probe::<ProbeB>("x"), &container, Some(&root))
            .unwrap();

        assert_eq!(
            take_events(),
            ["A.will_unmount", "B.will_mount", "B.render", "B.did_mount"]
        );
        assert!(!reconciler.is_mounted(a));
        assert_ne!(next, root);
        assert_eq!(reconciler.host().child_nodes(&container), vec![next]);
    }

    #[test]
    fn component_replaced_by_element_is_unmounted() {
        let (mut reconciler, container) = setup();
        let tree: VNode = element("div").child(probe::<ProbeA>("x")).into();
        let root = reconciler.mount(&tree, &container, None).unwrap();
        take_events();

        let next: VNode = element("div").child(element("p").child("plain")).into();
        reconciler.mount(&next, &container, Some(&root)).unwrap();

        assert_eq!(take_events(), ["A.will_unmount"]);
        assert_eq!(reconciler.mounted_count(), 0);
        assert_eq!(reconciler.host().to_markup(root), "<div><p>plain</p></div>");
    }

    struct Wrapper;

    impl Component for Wrapper {
        fn render(&mut self, cx: &Context<'_>) -> VNode {
            let inner = cx.props().get("inner").and_then(Value::as_str).unwrap_or("a");
            if inner == "a" {
                probe::<ProbeA>("wrapped")
            } else {
                probe::<ProbeB>("wrapped")
            }
        }
    }

    impl FromProps for Wrapper {
        fn from_props(_props: &Props) -> Self {
            Wrapper
        }
    }

    fn wrapper(inner: &str) -> VNode {
        ComponentNode::new(ComponentType::of::<Wrapper>())
            .prop("inner", inner)
            .into()
    }

    #[test]
    fn nested_root_components_share_one_node() {
        let (mut reconciler, container) = setup();
        let root = reconciler.mount(&wrapper("a"), &container, None).unwrap();
        let outer = reconciler.component_of(&root).unwrap();
        take_events();

        // Updating the wrapper must update, not remount, the inner component.
        let again = reconciler.mount(&wrapper("a"), &container, Some(&root)).unwrap();

        assert_eq!(again, root);
        assert_eq!(reconciler.component_of(&root), Some(outer));
        assert_eq!(
            take_events(),
            [
                "A.will_receive_props(\"wrapped\")",
                "A.render",
                "A.will_update",
                "A.did_update"
            ]
        );
        assert_eq!(reconciler.mounted_count(), 2);
    }

    #[test]
    fn inner_type_change_replaces_node_in_place() {
        let (mut reconciler, container) = setup();
        let root = reconciler.mount(&wrapper("a"), &container, None).unwrap();
        let outer = reconciler.component_of(&root).unwrap();
        take_events();

        let next = reconciler.mount(&wrapper("b"), &container, Some(&root)).unwrap();

        assert_eq!(
            take_events(),
            ["A.will_unmount", "B.will_mount", "B.render", "B.did_mount"]
        );
        assert_ne!(next, root);
        assert_eq!(reconciler.host().child_nodes(&container), vec![next]);
        assert_eq!(reconciler.component_of(&next), Some(outer));
        assert_eq!(reconciler.base_of(outer), Some(next));
        assert_eq!(reconciler.mounted_count(), 2);
    }

    /// Renders a tag chosen by its own state.
    struct Switch;

    impl Component for Switch {
        fn render(&mut self, cx: &Context<'_>) -> VNode {
            let tag = cx.state().get("tag").and_then(Value::as_str).unwrap_or("p");
            element(tag).child("body").into()
        }
    }

    impl FromProps for Switch {
        fn from_props(_props: &Props) -> Self {
            Switch
        }
    }

    struct Frame;

    impl Component for Frame {
        fn render(&mut self, _cx: &Context<'_>) -> VNode {
            ComponentNode::new(ComponentType::of::<Switch>()).into()
        }
    }

    impl FromProps for Frame {
        fn from_props(_props: &Props) -> Self {
            Frame
        }
    }

    #[test]
    fn inner_rerender_moves_outer_base() {
        let (mut reconciler, container) = setup();
        let vnode: VNode = ComponentNode::new(ComponentType::of::<Frame>()).into();
        let root = reconciler.mount(&vnode, &container, None).unwrap();
        let frame = reconciler.component_of(&root).unwrap();
        let inner = reconciler.instance(frame).unwrap().borrow().inner.unwrap();

        reconciler.set_state(inner, StateChange::merge([("tag", "section")]));
        reconciler.flush().unwrap();

        let base = reconciler.base_of(inner).unwrap();
        assert_ne!(base, root);
        assert_eq!(reconciler.base_of(frame), Some(base));
        assert_eq!(reconciler.component_of(&base), Some(frame));
        assert_eq!(reconciler.component_of(&root), None);
        assert_eq!(
            reconciler.host().inner_markup(container),
            "<section>body</section>"
        );
    }

    struct Faulty;

    impl Component for Faulty {
        fn render(&mut self, _cx: &Context<'_>) -> VNode {
            VNode::empty()
        }

        fn did_mount(&mut self, _cx: &Context<'_>) -> HookResult {
            Err(ComponentError::new("mount failed"))
        }
    }

    impl FromProps for Faulty {
        fn from_props(_props: &Props) -> Self {
            Faulty
        }
    }

    #[test]
    fn failing_hook_propagates() {
        let (mut reconciler, container) = setup();
        let vnode: VNode = ComponentNode::new(ComponentType::of::<Faulty>()).into();

        let err = reconciler.mount(&vnode, &container, None).unwrap_err();

        assert!(matches!(
            err,
            RenderError::Hook { hook: crate::error::Hook::DidMount, .. }
        ));
    }

    #[test]
    fn function_components_share_the_lifecycle() {
        let (mut reconciler, container) = setup();
        let calls = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&calls);
        let kind = ComponentType::from_fn(move |props: &Props| {
            *counter.borrow_mut() += 1;
            element("em").child(props["n"].to_string()).into()
        });

        let first: VNode = ComponentNode::new(kind.clone()).prop("n", 1).into();
        let root = reconciler.mount(&first, &container, None).unwrap();
        let id = reconciler.component_of(&root).unwrap();

        let second: VNode = ComponentNode::new(kind).prop("n", 2).into();
        let again = reconciler.mount(&second, &container, Some(&root)).unwrap();

        assert_eq!(again, root);
        assert_eq!(reconciler.component_of(&again), Some(id));
        assert_eq!(*calls.borrow(), 2);
        assert_eq!(reconciler.host().inner_markup(container), "<em>2</em>");
    }

    fn labelled(label: &'static str) -> VNode {
        let kind = ComponentType::from_fn(move |_: &Props| element("p").child(label).into());
        ComponentNode::new(kind).into()
    }

    #[test]
    fn function_component_update_renders_the_new_function() {
        let (mut reconciler, container) = setup();
        let root = reconciler.mount(&labelled("first"), &container, None).unwrap();
        let id = reconciler.component_of(&root).unwrap();

        let again = reconciler
            .mount(&labelled("second"), &container, Some(&root))
            .unwrap();

        assert_eq!(again, root);
        assert_eq!(reconciler.component_of(&again), Some(id));
        assert_eq!(reconciler.host().inner_markup(container), "<p>second</p>");
    }

    struct Refusing;

    impl Component for Refusing {
        fn render(&mut self, _cx: &Context<'_>) -> VNode {
            element("p").into()
        }

        fn will_mount(&mut self, _cx: &Context<'_>) -> HookResult {
            Err(ComponentError::new("not today"))
        }
    }

    impl FromProps for Refusing {
        fn from_props(_props: &Props) -> Self {
            Refusing
        }
    }

    #[test]
    fn failed_mount_leaves_no_instance_behind() {
        let (mut reconciler, container) = setup();
        let vnode: VNode = ComponentNode::new(ComponentType::of::<Refusing>()).into();

        let err = reconciler.mount(&vnode, &container, None).unwrap_err();

        assert!(matches!(
            err,
            RenderError::Hook { hook: crate::error::Hook::WillMount, .. }
        ));
        assert_eq!(reconciler.mounted_count(), 0);
    }

    #[test]
    fn failed_inner_mount_clears_the_outer_link() {
        let (mut reconciler, container) = setup();
        let kind = ComponentType::from_fn(|_: &Props| {
            ComponentNode::new(ComponentType::of::<Refusing>()).into()
        });
        let vnode: VNode = ComponentNode::new(kind).into();

        assert!(reconciler.mount(&vnode, &container, None).is_err());
        assert_eq!(reconciler.mounted_count(), 0);
    }
}
