//! Components
//!
//! A component is anything that can turn its props and state into a
//! [`VNode`]. Two flavors exist:
//!
//! - **Class-like** components implement [`Component`] (and [`FromProps`] to
//!   be constructible by the reconciler). They may keep fields of their own
//!   and override any lifecycle hook.
//! - **Function** components are plain `Fn(&Props) -> VNode` values. They are
//!   wrapped once at mount time in a [`FunctionComponent`] adapter, so the
//!   rest of the engine only ever sees the [`Component`] trait.
//!
//! # Identity
//!
//! Two component descriptions have the same type when their
//! [`ComponentType`]s compare equal. For class-like components that is the
//! Rust type; for function components it is the type of the function value,
//! which is unique per `fn` item and per closure expression.
//!
//! # Lifecycle
//!
//! ```text
//! Absent --will_mount/render/did_mount--> Mounted
//! Mounted --will_receive_props/render/will_update/did_update--> Updated
//! Mounted | Updated --will_unmount--> Unmounted
//! ```
//!
//! Every hook has a no-op default. A hook returning an error aborts the
//! render pass it belongs to.

use std::any::{type_name, TypeId};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Hook, HookResult, RenderError};
use crate::scheduler::{StateChange, Updater};
use crate::vnode::{Props, State, VNode};

/// Unique identifier for a mounted component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u64);

impl ComponentId {
    /// Generate a new unique component ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ComponentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// What a component sees while rendering or running a hook.
pub struct Context<'a> {
    id: ComponentId,
    props: &'a Props,
    state: &'a State,
    updater: &'a Updater,
}

impl<'a> Context<'a> {
    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn props(&self) -> &'a Props {
        self.props
    }

    pub fn state(&self) -> &'a State {
        self.state
    }

    /// Request a state change for this component.
    ///
    /// The change is queued and applied by the next flush; nothing is
    /// re-rendered synchronously.
    pub fn set_state(&self, change: impl Into<StateChange>) {
        self.updater.request_state_change(self.id, change.into());
    }

    /// A handle that can request state changes after this call returns,
    /// e.g. from an event callback.
    pub fn updater(&self) -> Updater {
        self.updater.clone()
    }
}

/// The capability set every component implements.
pub trait Component: 'static {
    /// State the instance starts with.
    fn initial_state(&self, _props: &Props) -> State {
        State::new()
    }

    /// Describe the component's output for its current props and state.
    fn render(&mut self, cx: &Context<'_>) -> VNode;

    fn will_mount(&mut self, _cx: &Context<'_>) -> HookResult {
        Ok(())
    }

    fn did_mount(&mut self, _cx: &Context<'_>) -> HookResult {
        Ok(())
    }

    /// Called before new props replace `cx.props()`.
    fn will_receive_props(&mut self, _cx: &Context<'_>, _next: &Props) -> HookResult {
        Ok(())
    }

    fn will_update(&mut self, _cx: &Context<'_>) -> HookResult {
        Ok(())
    }

    fn did_update(&mut self, _cx: &Context<'_>) -> HookResult {
        Ok(())
    }

    fn will_unmount(&mut self, _cx: &Context<'_>) -> HookResult {
        Ok(())
    }
}

/// Construction of a class-like component from its initial props.
pub trait FromProps: Component + Sized {
    fn from_props(props: &Props) -> Self;
}

/// Adapter that gives a render function the [`Component`] interface.
pub struct FunctionComponent {
    render: Rc<dyn Fn(&Props) -> VNode>,
}

impl Component for FunctionComponent {
    fn render(&mut self, cx: &Context<'_>) -> VNode {
        (self.render)(cx.props())
    }
}

type Factory = Rc<dyn Fn(&Props) -> Box<dyn Component>>;

/// The type tag of a component description.
#[derive(Clone)]
pub struct ComponentType {
    id: TypeId,
    name: &'static str,
    factory: Factory,
    /// Function components carry their render function in the factory, so
    /// a live instance must pick up the factory of each new description.
    stateless: bool,
}

impl ComponentType {
    /// Type tag for a class-like component.
    pub fn of<C: FromProps>() -> Self {
        Self {
            id: TypeId::of::<C>(),
            name: type_name::<C>(),
            factory: Rc::new(|props| Box::new(C::from_props(props))),
            stateless: false,
        }
    }

    /// Type tag for a function component.
    pub fn from_fn<F>(render: F) -> Self
    where
        F: Fn(&Props) -> VNode + 'static,
    {
        let render: Rc<dyn Fn(&Props) -> VNode> = Rc::new(render);
        Self {
            id: TypeId::of::<F>(),
            name: type_name::<F>(),
            factory: Rc::new(move |_| {
                Box::new(FunctionComponent {
                    render: Rc::clone(&render),
                })
            }),
            stateless: true,
        }
    }

    /// Readable type name, used in logs and errors.
    pub fn name(&self) -> &'static str {
        self.name
    }

    fn construct(&self, props: &Props) -> Box<dyn Component> {
        (self.factory)(props)
    }
}

impl PartialEq for ComponentType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ComponentType {}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComponentType").field(&self.name).finish()
    }
}

// ----------------------------------------------------------------------------
// Instances
// ----------------------------------------------------------------------------

/// The persistent object backing one component slot.
pub(crate) struct ComponentInstance<N> {
    pub(crate) id: ComponentId,
    pub(crate) kind: ComponentType,
    pub(crate) props: Props,
    pub(crate) state: State,
    /// Snapshot taken on first touch within a flush; `None` between flushes.
    pub(crate) prev_state: Option<State>,
    pub(crate) base: Option<N>,
    /// Component this one renders directly at its root.
    pub(crate) inner: Option<ComponentId>,
    /// Component that renders this one directly at its root.
    pub(crate) outer: Option<ComponentId>,
    behavior: Box<dyn Component>,
}

impl<N> ComponentInstance<N> {
    pub(crate) fn new(kind: &ComponentType, props: &Props, outer: Option<ComponentId>) -> Self {
        let behavior = kind.construct(props);
        let state = behavior.initial_state(props);
        Self {
            id: ComponentId::new(),
            kind: kind.clone(),
            props: props.clone(),
            state,
            prev_state: None,
            base: None,
            inner: None,
            outer,
            behavior,
        }
    }

    /// Take over the type tag of a new description of the same type.
    ///
    /// Two closures from one expression share a type but may capture
    /// different values; a function component renders with the latest one.
    pub(crate) fn refresh_kind(&mut self, kind: &ComponentType) {
        if kind.stateless {
            self.behavior = kind.construct(&self.props);
        }
        self.kind = kind.clone();
    }

    pub(crate) fn render(&mut self, updater: &Updater) -> VNode {
        let cx = Context {
            id: self.id,
            props: &self.props,
            state: &self.state,
            updater,
        };
        self.behavior.render(&cx)
    }

    /// Run one lifecycle hook.
    pub(crate) fn call_hook(
        &mut self,
        hook: Hook,
        updater: &Updater,
        next_props: Option<&Props>,
    ) -> Result<(), RenderError> {
        let cx = Context {
            id: self.id,
            props: &self.props,
            state: &self.state,
            updater,
        };
        let behavior = &mut self.behavior;
        let result = match hook {
            Hook::WillMount => behavior.will_mount(&cx),
            Hook::DidMount => behavior.did_mount(&cx),
            Hook::WillReceiveProps => {
                behavior.will_receive_props(&cx, next_props.unwrap_or(cx.props))
            }
            Hook::WillUpdate => behavior.will_update(&cx),
            Hook::DidUpdate => behavior.did_update(&cx),
            Hook::WillUnmount => behavior.will_unmount(&cx),
        };
        result.map_err(|source| RenderError::Hook {
            component: self.kind.name(),
            hook,
            source,
        })
    }
}
