//! Host Adapter
//!
//! The reconciler never touches a platform tree directly. Everything it
//! needs from the host (creating nodes, setting one attribute, moving nodes
//! around, and a handful of read-only queries) goes through the [`Host`]
//! trait.
//!
//! # Node Handles
//!
//! `Host::Node` is an opaque handle. The reconciler compares handles for
//! identity and uses them as map keys for its side tables (component
//! back-references and child keys), so handles must be cheap to clone and
//! stable for the lifetime of the node.
//!
//! # Mutation Semantics
//!
//! The tree mutation primitives follow DOM semantics: inserting a node that
//! already has a parent moves it, it never duplicates it.

mod memory;

pub use memory::{MemoryHost, MemoryNode, Mutation};

use std::fmt::Debug;
use std::hash::Hash;

use serde_json::Value;

use crate::error::HostError;

/// Capability set the reconciler consumes from a host platform.
pub trait Host {
    /// Handle to a live node.
    type Node: Clone + Eq + Hash + Debug;

    /// Create a detached element.
    fn create_element(&mut self, tag: &str) -> Result<Self::Node, HostError>;

    /// Create a detached text node.
    fn create_text_node(&mut self, text: &str) -> Self::Node;

    /// Set one attribute; `None` clears it.
    fn set_attribute(
        &mut self,
        node: &Self::Node,
        name: &str,
        value: Option<&Value>,
    ) -> Result<(), HostError>;

    /// Replace the content of a text node.
    fn set_text_content(&mut self, node: &Self::Node, text: &str) -> Result<(), HostError>;

    /// Append `child` as the last child of `parent`.
    fn append_child(&mut self, parent: &Self::Node, child: &Self::Node) -> Result<(), HostError>;

    /// Insert `child` into `parent` right before `reference`.
    fn insert_before(
        &mut self,
        parent: &Self::Node,
        child: &Self::Node,
        reference: &Self::Node,
    ) -> Result<(), HostError>;

    /// Detach `child` from `parent`.
    fn remove_child(&mut self, parent: &Self::Node, child: &Self::Node) -> Result<(), HostError>;

    /// Put `new` where `old` currently sits in `parent`, detaching `old`.
    fn replace_child(
        &mut self,
        parent: &Self::Node,
        new: &Self::Node,
        old: &Self::Node,
    ) -> Result<(), HostError>;

    /// Whether the node is a text node.
    fn is_text(&self, node: &Self::Node) -> bool;

    /// Tag name of an element, `None` for text nodes.
    fn tag_name(&self, node: &Self::Node) -> Option<String>;

    /// Content of a text node, `None` for elements.
    fn text_content(&self, node: &Self::Node) -> Option<String>;

    /// Snapshot of the node's attributes in host order.
    fn attributes(&self, node: &Self::Node) -> Vec<(String, Value)>;

    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Snapshot of the node's children.
    fn child_nodes(&self, node: &Self::Node) -> Vec<Self::Node>;

    fn child_at(&self, parent: &Self::Node, index: usize) -> Option<Self::Node>;

    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;

    fn has_child_nodes(&self, node: &Self::Node) -> bool {
        self.child_at(node, 0).is_some()
    }

    /// Detach `node` from its parent, if it has one.
    fn remove_node(&mut self, node: &Self::Node) -> Result<(), HostError> {
        match self.parent(node) {
            Some(parent) => self.remove_child(&parent, node),
            None => Ok(()),
        }
    }
}
