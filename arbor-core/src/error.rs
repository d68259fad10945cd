//! Error types for the Arbor reconciler.
//!
//! Nothing in the engine retries or rolls back. A failure aborts the
//! operation that triggered it (a mount, a render pass, or a flush) and is
//! returned to the caller; host mutations applied before the failure stay
//! applied.

use std::fmt;

use thiserror::Error;

use crate::component::ComponentId;

/// Faults raised by a [`Host`](crate::host::Host) adapter.
///
/// Malformed tree descriptions are not validated up front; they surface as
/// one of these when the host refuses the resulting call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("unknown node: {0}")]
    UnknownNode(String),

    #[error("invalid tag name: {0:?}")]
    InvalidTag(String),

    #[error("node {child} is not a child of {parent}")]
    NotAChild { parent: String, child: String },

    #[error("cannot insert {child} into {parent}")]
    HierarchyRequest { parent: String, child: String },
}

/// Error value produced by component hooks and state updaters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ComponentError {
    message: String,
}

impl ComponentError {
    /// Create an error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Result type returned by lifecycle hooks.
pub type HookResult = Result<(), ComponentError>;

/// The lifecycle hooks a component may implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    WillMount,
    DidMount,
    WillReceiveProps,
    WillUpdate,
    DidUpdate,
    WillUnmount,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Hook::WillMount => "will_mount",
            Hook::DidMount => "did_mount",
            Hook::WillReceiveProps => "will_receive_props",
            Hook::WillUpdate => "will_update",
            Hook::DidUpdate => "did_update",
            Hook::WillUnmount => "will_unmount",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by mounting, rendering and flushing.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Host(#[from] HostError),

    #[error("{hook} hook of {component} failed")]
    Hook {
        component: &'static str,
        hook: Hook,
        #[source]
        source: ComponentError,
    },

    #[error("state updater for component {component} failed")]
    Updater {
        component: ComponentId,
        #[source]
        source: ComponentError,
    },

    #[error("component {0} is not mounted")]
    NotMounted(ComponentId),
}

/// Errors raised while loading a [`ReconcilerConfig`](crate::config::ReconcilerConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid reconciler config: {0}")]
    Parse(#[from] serde_json::Error),
}
