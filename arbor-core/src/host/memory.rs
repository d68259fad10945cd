//! In-Memory Host
//!
//! An arena-backed [`Host`] that keeps nodes in a `Vec` and records every
//! call that changes the tree. It is the adapter the tests and benchmarks
//! run against, and a reference for writing platform adapters.
//!
//! Nodes are never freed; a removed node simply becomes detached and can be
//! re-inserted later, which is exactly what the children differ relies on
//! when it moves keyed nodes around.

use std::fmt;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::trace;

use super::Host;
use crate::error::HostError;

/// Handle to a node owned by a [`MemoryHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemoryNode(u32);

impl MemoryNode {
    /// Get the raw arena index.
    pub fn raw(&self) -> u32 {
        self.0
    }

    fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for MemoryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A recorded host call.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    CreateElement { node: MemoryNode, tag: String },
    CreateText { node: MemoryNode, text: String },
    SetAttribute { node: MemoryNode, name: String, value: Option<Value> },
    SetText { node: MemoryNode, text: String },
    AppendChild { parent: MemoryNode, child: MemoryNode },
    InsertBefore { parent: MemoryNode, child: MemoryNode, reference: MemoryNode },
    RemoveChild { parent: MemoryNode, child: MemoryNode },
    ReplaceChild { parent: MemoryNode, new: MemoryNode, old: MemoryNode },
}

impl Mutation {
    /// Whether this call created a node.
    pub fn is_create(&self) -> bool {
        matches!(self, Mutation::CreateElement { .. } | Mutation::CreateText { .. })
    }
}

#[derive(Debug)]
enum NodeKind {
    Element {
        tag: String,
        attributes: IndexMap<String, Value>,
    },
    Text(String),
}

#[derive(Debug)]
struct NodeData {
    kind: NodeKind,
    parent: Option<MemoryNode>,
    children: Vec<MemoryNode>,
}

/// Arena-backed host that logs its mutations.
#[derive(Debug, Default)]
pub struct MemoryHost {
    nodes: Vec<NodeData>,
    log: Vec<Mutation>,
}

impl MemoryHost {
    /// Create an empty host.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded call since the log was last taken.
    pub fn mutations(&self) -> &[Mutation] {
        &self.log
    }

    /// Drain the mutation log.
    pub fn take_mutations(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.log)
    }

    /// Total number of nodes ever created.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Read one attribute.
    pub fn attribute(&self, node: MemoryNode, name: &str) -> Option<&Value> {
        match &self.nodes.get(node.index())?.kind {
            NodeKind::Element { attributes, .. } => attributes.get(name),
            NodeKind::Text(_) => None,
        }
    }

    /// Serialize a subtree to markup, e.g. `<ul class="x"><li>a</li></ul>`.
    pub fn to_markup(&self, node: MemoryNode) -> String {
        let mut out = String::new();
        self.write_markup(node, &mut out);
        out
    }

    /// Serialize the children of a node, without the node itself.
    pub fn inner_markup(&self, node: MemoryNode) -> String {
        let mut out = String::new();
        if let Some(data) = self.nodes.get(node.index()) {
            for child in &data.children {
                self.write_markup(*child, &mut out);
            }
        }
        out
    }

    fn write_markup(&self, node: MemoryNode, out: &mut String) {
        let Some(data) = self.nodes.get(node.index()) else {
            return;
        };
        match &data.kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element { tag, attributes } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    let value = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    out.push_str(&format!(" {name}=\"{value}\""));
                }
                out.push('>');
                for child in &data.children {
                    self.write_markup(*child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }

    fn record(&mut self, mutation: Mutation) {
        trace!(?mutation, "host mutation");
        self.log.push(mutation);
    }

    fn alloc(&mut self, kind: NodeKind) -> MemoryNode {
        let node = MemoryNode(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        node
    }

    fn data(&self, node: MemoryNode) -> Result<&NodeData, HostError> {
        self.nodes
            .get(node.index())
            .ok_or_else(|| HostError::UnknownNode(node.to_string()))
    }

    fn data_mut(&mut self, node: MemoryNode) -> Result<&mut NodeData, HostError> {
        self.nodes
            .get_mut(node.index())
            .ok_or_else(|| HostError::UnknownNode(node.to_string()))
    }

    /// Check that `child` may become a child of `parent`.
    fn check_insertable(&self, parent: MemoryNode, child: MemoryNode) -> Result<(), HostError> {
        self.data(child)?;
        let hierarchy = || HostError::HierarchyRequest {
            parent: parent.to_string(),
            child: child.to_string(),
        };

        if matches!(self.data(parent)?.kind, NodeKind::Text(_)) {
            return Err(hierarchy());
        }

        // `child` must not be `parent` or one of its ancestors.
        let mut cursor = Some(parent);
        while let Some(node) = cursor {
            if node == child {
                return Err(hierarchy());
            }
            cursor = self.data(node)?.parent;
        }
        Ok(())
    }

    fn position(&self, parent: MemoryNode, child: MemoryNode) -> Result<usize, HostError> {
        self.data(parent)?
            .children
            .iter()
            .position(|c| *c == child)
            .ok_or_else(|| HostError::NotAChild {
                parent: parent.to_string(),
                child: child.to_string(),
            })
    }

    fn detach(&mut self, node: MemoryNode) -> Result<(), HostError> {
        if let Some(parent) = self.data(node)?.parent {
            self.data_mut(parent)?.children.retain(|c| *c != node);
            self.data_mut(node)?.parent = None;
        }
        Ok(())
    }
}

impl Host for MemoryHost {
    type Node = MemoryNode;

    fn create_element(&mut self, tag: &str) -> Result<MemoryNode, HostError> {
        let valid = !tag.is_empty()
            && !tag
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, '<' | '>' | '/' | '"' | '='));
        if !valid {
            return Err(HostError::InvalidTag(tag.to_owned()));
        }

        let node = self.alloc(NodeKind::Element {
            tag: tag.to_owned(),
            attributes: IndexMap::new(),
        });
        self.record(Mutation::CreateElement {
            node,
            tag: tag.to_owned(),
        });
        Ok(node)
    }

    fn create_text_node(&mut self, text: &str) -> MemoryNode {
        let node = self.alloc(NodeKind::Text(text.to_owned()));
        self.record(Mutation::CreateText {
            node,
            text: text.to_owned(),
        });
        node
    }

    fn set_attribute(
        &mut self,
        node: &MemoryNode,
        name: &str,
        value: Option<&Value>,
    ) -> Result<(), HostError> {
        if let NodeKind::Element { attributes, .. } = &mut self.data_mut(*node)?.kind {
            match value {
                Some(value) => {
                    attributes.insert(name.to_owned(), value.clone());
                }
                None => {
                    attributes.shift_remove(name);
                }
            }
        }
        self.record(Mutation::SetAttribute {
            node: *node,
            name: name.to_owned(),
            value: value.cloned(),
        });
        Ok(())
    }

    fn set_text_content(&mut self, node: &MemoryNode, text: &str) -> Result<(), HostError> {
        let data = self.data_mut(*node)?;
        match &mut data.kind {
            NodeKind::Text(content) => *content = text.to_owned(),
            NodeKind::Element { .. } => {
                return Err(HostError::HierarchyRequest {
                    parent: node.to_string(),
                    child: "text".to_owned(),
                })
            }
        }
        self.record(Mutation::SetText {
            node: *node,
            text: text.to_owned(),
        });
        Ok(())
    }

    fn append_child(&mut self, parent: &MemoryNode, child: &MemoryNode) -> Result<(), HostError> {
        self.check_insertable(*parent, *child)?;
        self.detach(*child)?;
        self.data_mut(*parent)?.children.push(*child);
        self.data_mut(*child)?.parent = Some(*parent);
        self.record(Mutation::AppendChild {
            parent: *parent,
            child: *child,
        });
        Ok(())
    }

    fn insert_before(
        &mut self,
        parent: &MemoryNode,
        child: &MemoryNode,
        reference: &MemoryNode,
    ) -> Result<(), HostError> {
        self.check_insertable(*parent, *child)?;
        self.position(*parent, *reference)?;
        if child != reference {
            self.detach(*child)?;
            let index = self.position(*parent, *reference)?;
            self.data_mut(*parent)?.children.insert(index, *child);
            self.data_mut(*child)?.parent = Some(*parent);
        }
        self.record(Mutation::InsertBefore {
            parent: *parent,
            child: *child,
            reference: *reference,
        });
        Ok(())
    }

    fn remove_child(&mut self, parent: &MemoryNode, child: &MemoryNode) -> Result<(), HostError> {
        let index = self.position(*parent, *child)?;
        self.data_mut(*parent)?.children.remove(index);
        self.data_mut(*child)?.parent = None;
        self.record(Mutation::RemoveChild {
            parent: *parent,
            child: *child,
        });
        Ok(())
    }

    fn replace_child(
        &mut self,
        parent: &MemoryNode,
        new: &MemoryNode,
        old: &MemoryNode,
    ) -> Result<(), HostError> {
        self.position(*parent, *old)?;
        self.check_insertable(*parent, *new)?;
        if new != old {
            self.detach(*new)?;
            let index = self.position(*parent, *old)?;
            self.data_mut(*parent)?.children[index] = *new;
            self.data_mut(*new)?.parent = Some(*parent);
            self.data_mut(*old)?.parent = None;
        }
        self.record(Mutation::ReplaceChild {
            parent: *parent,
            new: *new,
            old: *old,
        });
        Ok(())
    }

    fn is_text(&self, node: &MemoryNode) -> bool {
        matches!(
            self.nodes.get(node.index()).map(|d| &d.kind),
            Some(NodeKind::Text(_))
        )
    }

    fn tag_name(&self, node: &MemoryNode) -> Option<String> {
        match &self.nodes.get(node.index())?.kind {
            NodeKind::Element { tag, .. } => Some(tag.clone()),
            NodeKind::Text(_) => None,
        }
    }

    fn text_content(&self, node: &MemoryNode) -> Option<String> {
        match &self.nodes.get(node.index())?.kind {
            NodeKind::Text(text) => Some(text.clone()),
            NodeKind::Element { .. } => None,
        }
    }

    fn attributes(&self, node: &MemoryNode) -> Vec<(String, Value)> {
        match self.nodes.get(node.index()).map(|d| &d.kind) {
            Some(NodeKind::Element { attributes, .. }) => attributes
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }

    fn parent(&self, node: &MemoryNode) -> Option<MemoryNode> {
        self.nodes.get(node.index())?.parent
    }

    fn child_nodes(&self, node: &MemoryNode) -> Vec<MemoryNode> {
        self.nodes
            .get(node.index())
            .map(|d| d.children.clone())
            .unwrap_or_default()
    }

    fn child_at(&self, parent: &MemoryNode, index: usize) -> Option<MemoryNode> {
        self.nodes.get(parent.index())?.children.get(index).copied()
    }

    fn next_sibling(&self, node: &MemoryNode) -> Option<MemoryNode> {
        let parent = self.parent(node)?;
        let siblings = &self.nodes.get(parent.index())?.children;
        let index = siblings.iter().position(|c| c == node)?;
        siblings.get(index + 1).copied()
    }
}
