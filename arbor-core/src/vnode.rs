//! Tree Descriptions
//!
//! A [`VNode`] describes what should be rendered. It is an explicit tagged
//! union decided once at construction, so the differs never have to probe
//! the shape of a value while walking the tree.
//!
//! # Text Normalization
//!
//! Strings and numbers become [`VNode::Text`]. Absent and boolean values
//! (`None`, `()`, `true`, `false`) normalize to empty text, which lets
//! conditional children degenerate into the text path instead of needing a
//! separate "nothing" variant:
//!
//! ```rust,ignore
//! let show = false;
//! element("p").child(show.then(|| "hidden")).child(42);
//! ```

use indexmap::IndexMap;
use serde_json::Value;

use crate::component::ComponentType;

/// Property mapping of an element or component.
pub type Props = IndexMap<String, Value>;

/// State bag of a component instance.
pub type State = IndexMap<String, Value>;

/// Stable identity of a child across renders.
pub type Key = String;

/// Property name reserved for children. Never forwarded to the host.
pub const CHILDREN_PROP: &str = "children";

/// A node of the tree description.
#[derive(Debug, Clone)]
pub enum VNode {
    /// A text node.
    Text(String),

    /// A host element.
    Element(Element),

    /// A component whose rendered output stands in this position.
    Component(ComponentNode),
}

impl VNode {
    /// The key of this node, if it carries one.
    pub fn key(&self) -> Option<&Key> {
        match self {
            VNode::Text(_) => None,
            VNode::Element(element) => element.key.as_ref(),
            VNode::Component(component) => component.key.as_ref(),
        }
    }

    /// Empty text, the normalized form of an absent child.
    pub fn empty() -> Self {
        VNode::Text(String::new())
    }
}

/// Description of a host element.
#[derive(Debug, Clone, Default)]
pub struct Element {
    pub tag: String,
    pub props: Props,
    pub children: Vec<VNode>,
    pub key: Option<Key>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Set a property.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(name.into(), value.into());
        self
    }

    /// Append one child.
    pub fn child(mut self, child: impl Into<VNode>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Append several children.
    pub fn children<I, C>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<VNode>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// Description of a component.
#[derive(Debug, Clone)]
pub struct ComponentNode {
    pub kind: ComponentType,
    pub props: Props,
    pub key: Option<Key>,
}

impl ComponentNode {
    pub fn new(kind: ComponentType) -> Self {
        Self {
            kind,
            props: Props::new(),
            key: None,
        }
    }

    /// Set a property.
    pub fn prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(name.into(), value.into());
        self
    }

    /// Replace the whole property mapping.
    pub fn with_props(mut self, props: Props) -> Self {
        self.props = props;
        self
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// Shorthand for [`Element::new`].
pub fn element(tag: impl Into<String>) -> Element {
    Element::new(tag)
}

/// Shorthand for a text node.
pub fn text(content: impl Into<String>) -> VNode {
    VNode::Text(content.into())
}

// ----------------------------------------------------------------------------
// Conversions
// ----------------------------------------------------------------------------

impl From<Element> for VNode {
    fn from(element: Element) -> Self {
        VNode::Element(element)
    }
}

impl From<ComponentNode> for VNode {
    fn from(component: ComponentNode) -> Self {
        VNode::Component(component)
    }
}

impl From<&str> for VNode {
    fn from(value: &str) -> Self {
        VNode::Text(value.to_owned())
    }
}

impl From<String> for VNode {
    fn from(value: String) -> Self {
        VNode::Text(value)
    }
}

impl From<bool> for VNode {
    fn from(_: bool) -> Self {
        VNode::empty()
    }
}

impl From<()> for VNode {
    fn from(_: ()) -> Self {
        VNode::empty()
    }
}

impl<T: Into<VNode>> From<Option<T>> for VNode {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_else(VNode::empty)
    }
}

macro_rules! number_to_text {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for VNode {
                fn from(value: $ty) -> Self {
                    VNode::Text(value.to_string())
                }
            }
        )*
    };
}

number_to_text!(i32, i64, u32, u64, usize, f32, f64);

#[cfg(test)]
mod tests {
    use super::*;

    fn text_of(node: VNode) -> String {
        match node {
            VNode::Text(text) => text,
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn absent_and_boolean_values_normalize_to_empty_text() {
        assert_eq!(text_of(true.into()), "");
        assert_eq!(text_of(false.into()), "");
        assert_eq!(text_of(().into()), "");
        assert_eq!(text_of(None::<&str>.into()), "");
    }

    #[test]
    fn numbers_normalize_to_their_string_form() {
        assert_eq!(text_of(7.into()), "7");
        assert_eq!(text_of(2.0_f64.into()), "2");
        assert_eq!(text_of(1.5_f64.into()), "1.5");
    }

    #[test]
    fn element_builder_collects_props_children_and_key() {
        let node: VNode = element("ul")
            .attr("class", "list")
            .children(["a", "b"])
            .child(Some("c"))
            .key("list")
            .into();

        let VNode::Element(ul) = &node else {
            panic!("expected element");
        };
        assert_eq!(ul.tag, "ul");
        assert_eq!(ul.props.get("class"), Some(&Value::from("list")));
        assert_eq!(ul.children.len(), 3);
        assert_eq!(node.key().map(String::as_str), Some("list"));
    }
}
