//! Arbor Core
//!
//! This crate provides the reconciliation engine of the Arbor virtual DOM.
//! It implements:
//!
//! - Tree descriptions (elements, text, components)
//! - A node differ that patches a live host tree in place
//! - Keyed and positional children matching
//! - Stateful components with lifecycle hooks
//! - Batched state updates flushed once per turn
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `vnode`: Tree descriptions and their builders
//! - `host`: The host tree abstraction and an in-memory implementation
//! - `component`: The component capability set and instances
//! - `scheduler`: State-change queues and the flush signal
//! - `reconciler`: The differs and the lifecycle manager
//! - `config`: Reconciler tuning
//! - `error`: Error types
//!
//! # Example
//!
//! ```rust,ignore
//! use arbor_core::{element, Host, MemoryHost, Reconciler};
//!
//! let mut reconciler = Reconciler::new(MemoryHost::new());
//! let container = reconciler.host_mut().create_element("body")?;
//!
//! // First render creates the tree
//! let list = element("ul").child(element("li").key("a").child("first"));
//! let root = reconciler.mount(&list.into(), &container, None)?;
//!
//! // Later renders patch it in place
//! let list = element("ul")
//!     .child(element("li").key("b").child("second"))
//!     .child(element("li").key("a").child("first"));
//! reconciler.mount(&list.into(), &container, Some(&root))?;
//! ```

pub mod component;
pub mod config;
pub mod error;
pub mod host;
pub mod reconciler;
pub mod scheduler;
pub mod vnode;

pub use component::{Component, ComponentId, ComponentType, Context, FromProps};
pub use config::ReconcilerConfig;
pub use error::{ComponentError, ConfigError, Hook, HookResult, HostError, RenderError};
pub use host::{Host, MemoryHost, MemoryNode, Mutation};
pub use reconciler::{drive, run_scheduled, Reconciler};
pub use scheduler::{FlushReport, StateChange, Updater};
pub use vnode::{element, text, ComponentNode, Element, Key, Props, State, VNode};
