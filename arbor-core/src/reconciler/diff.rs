//! Node Differ
//!
//! Reconciles one live node against one description and returns the node
//! that now represents it. The caller attaches the result if it is new.
//!
//! # Paths
//!
//! 1. **Text**: an existing text node is reused and only written when its
//!    content differs. Anything else is replaced in place by a new text
//!    node.
//! 2. **Component**: handed to the lifecycle manager.
//! 3. **Element**: a node with a matching tag is reused. Otherwise a new
//!    shell is created and the old node's children are moved onto it before
//!    the shell takes the old node's place, so a tag change rebuilds one
//!    node instead of a whole subtree. Children and attributes are then
//!    diffed against the (possibly new) node.
//!
//! A node that was the base of a component and is now described as plain
//! text or an element no longer belongs to that component, so the instance
//! in the slot is unmounted first.

use tracing::trace;

use super::{Reconciler, Slot};
use crate::error::RenderError;
use crate::host::Host;
use crate::vnode::{Element, VNode};

impl<H: Host> Reconciler<H> {
    pub(super) fn diff_node(
        &mut self,
        live: Option<H::Node>,
        vnode: &VNode,
        slot: Slot,
    ) -> Result<H::Node, RenderError> {
        match vnode {
            VNode::Text(text) => self.diff_text(live, text, slot),
            VNode::Component(component) => self.diff_component(live, component, slot),
            VNode::Element(element) => self.diff_element(live, element, slot),
        }
    }

    fn diff_text(
        &mut self,
        live: Option<H::Node>,
        text: &str,
        slot: Slot,
    ) -> Result<H::Node, RenderError> {
        if let Some(id) = slot.existing {
            self.unmount(id)?;
        }

        if let Some(node) = live.as_ref().filter(|node| self.host.is_text(node)) {
            if self.host.text_content(node).as_deref() != Some(text) {
                self.host.set_text_content(node, text)?;
            }
            return Ok(node.clone());
        }

        let out = self.host.create_text_node(text);
        if let Some(old) = live {
            trace!(?old, new = ?out, "replacing node with text");
            if let Some(parent) = self.host.parent(&old) {
                self.host.replace_child(&parent, &out, &old)?;
            }
            self.release_replaced(&old)?;
        }
        Ok(out)
    }

    fn diff_element(
        &mut self,
        live: Option<H::Node>,
        element: &Element,
        slot: Slot,
    ) -> Result<H::Node, RenderError> {
        if let Some(id) = slot.existing {
            self.unmount(id)?;
        }

        let out = match live {
            Some(node) if self.is_same_tag(&node, &element.tag) => node,
            previous => {
                let out = self.host.create_element(&element.tag)?;
                if let Some(old) = previous {
                    trace!(?old, new = ?out, tag = %element.tag, "rebuilding element shell");
                    for child in self.host.child_nodes(&old) {
                        self.host.append_child(&out, &child)?;
                    }
                    if let Some(parent) = self.host.parent(&old) {
                        self.host.replace_child(&parent, &out, &old)?;
                    }
                    self.forget(&old);
                }
                out
            }
        };

        if !element.children.is_empty() || self.host.has_child_nodes(&out) {
            self.diff_children(&out, &element.children)?;
        }
        self.diff_attributes(&out, element)?;

        Ok(out)
    }

    /// Whether `node` keeps its identity when reconciled against `vnode`.
    pub(super) fn is_same_node_type(&self, node: &H::Node, vnode: &VNode) -> bool {
        match vnode {
            VNode::Text(_) => self.host.is_text(node),
            VNode::Element(element) => self.is_same_tag(node, &element.tag),
            VNode::Component(component) => self
                .owner_of(node)
                .and_then(|id| self.instances.get(&id))
                .is_some_and(|instance| instance.borrow().kind == component.kind),
        }
    }

    fn is_same_tag(&self, node: &H::Node, tag: &str) -> bool {
        self.host
            .tag_name(node)
            .is_some_and(|live| self.config.tags_match(&live, tag))
    }
}
