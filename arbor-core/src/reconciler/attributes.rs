//! Attribute Differ

use indexmap::IndexMap;

use super::Reconciler;
use crate::error::RenderError;
use crate::host::Host;
use crate::vnode::{Element, CHILDREN_PROP};

impl<H: Host> Reconciler<H> {
    /// Bring the attributes of `node` in line with `element.props`.
    ///
    /// Attributes missing from the description are cleared, properties whose
    /// value differs from the live snapshot are set, everything else is left
    /// alone. Values compare with `==`.
    pub(super) fn diff_attributes(
        &mut self,
        node: &H::Node,
        element: &Element,
    ) -> Result<(), RenderError> {
        let current: IndexMap<String, serde_json::Value> =
            self.host.attributes(node).into_iter().collect();

        for name in current.keys() {
            if !element.props.contains_key(name) {
                self.host.set_attribute(node, name, None)?;
            }
        }

        for (name, value) in &element.props {
            if name == CHILDREN_PROP {
                continue;
            }
            if current.get(name) != Some(value) {
                self.host.set_attribute(node, name, Some(value))?;
            }
        }

        Ok(())
    }
}
