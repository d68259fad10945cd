//! Children Differ
//!
//! Reconciles the child descriptions of an element against its live child
//! list in a single greedy pass.
//!
//! # Algorithm
//!
//! 1. Partition the live children: keyed children go into a key index,
//!    unkeyed children into an ordered slot list with a low-water mark
//!    `min` and a logical length `len`, so consumed slots at either end are
//!    skipped without rescanning.
//! 2. For each description, in order:
//!    - keyed: claim the live child with the same key, if any
//!    - unkeyed: claim the first unconsumed slot in `min..len` whose node
//!      has the same type
//! 3. Reconcile the claimed node (or nothing) against the description.
//! 4. Correct the position of the result against the live child at `i`:
//!    append when there is none, remove the live child when the result is
//!    its next sibling, otherwise insert before it.
//! 5. Remove former children that nothing claimed (configurable).
//!
//! Keyed children keep their identity in any order. Unkeyed children keep
//! it as long as they roughly keep their relative order. This is not a
//! minimal-move algorithm.

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::trace;

use super::{Reconciler, Slot};
use crate::error::RenderError;
use crate::host::Host;
use crate::vnode::{Key, VNode};

/// Unkeyed live children still open for positional matching.
struct Unkeyed<N> {
    slots: SmallVec<[Option<N>; 8]>,
    min: usize,
    len: usize,
}

impl<N> Unkeyed<N> {
    fn new(slots: SmallVec<[Option<N>; 8]>) -> Self {
        let len = slots.len();
        Self { slots, min: 0, len }
    }

    /// Claim the first open slot accepted by `matches`.
    fn claim(&mut self, mut matches: impl FnMut(&N) -> bool) -> Option<N> {
        for j in self.min..self.len {
            if !self.slots[j].as_ref().is_some_and(&mut matches) {
                continue;
            }
            let node = self.slots[j].take();
            if j == self.len - 1 {
                self.len -= 1;
            }
            if j == self.min {
                self.min += 1;
            }
            return node;
        }
        None
    }

    fn into_unclaimed(self) -> impl Iterator<Item = N> {
        self.slots.into_iter().flatten()
    }
}

impl<H: Host> Reconciler<H> {
    pub(super) fn diff_children(
        &mut self,
        parent: &H::Node,
        descriptions: &[VNode],
    ) -> Result<(), RenderError> {
        let mut keyed: IndexMap<Key, H::Node> = IndexMap::new();
        let mut slots = SmallVec::new();
        // Earlier holders of a duplicated key; they can never be claimed.
        let mut shadowed = Vec::new();
        for child in self.host.child_nodes(parent) {
            match self.keys.get(&child) {
                Some(key) => {
                    if let Some(earlier) = keyed.insert(key.clone(), child) {
                        shadowed.push(earlier);
                    }
                }
                None => slots.push(Some(child)),
            }
        }
        let mut unkeyed = Unkeyed::new(slots);

        for (i, description) in descriptions.iter().enumerate() {
            let claimed = match description.key() {
                Some(key) => keyed.shift_remove(key),
                None => unkeyed.claim(|node| self.is_same_node_type(node, description)),
            };

            let slot = Slot::child(claimed.as_ref().and_then(|node| self.owner_of(node)));
            let child = self.diff_node(claimed, description, slot)?;

            match description.key() {
                Some(key) => {
                    self.keys.insert(child.clone(), key.clone());
                }
                None => {
                    self.keys.remove(&child);
                }
            }

            self.place_child(parent, &child, i)?;
        }

        if self.config.prune_unclaimed {
            let leftovers: Vec<H::Node> = shadowed
                .into_iter()
                .chain(keyed.into_values())
                .chain(unkeyed.into_unclaimed())
                .collect();
            for node in leftovers {
                trace!(?node, "removing unclaimed child");
                if self.host.parent(&node).as_ref() == Some(parent) {
                    self.host.remove_child(parent, &node)?;
                }
                self.release_subtree(&node)?;
            }
        }

        Ok(())
    }

    /// Move `child` to index `i` of `parent`.
    fn place_child(&mut self, parent: &H::Node, child: &H::Node, i: usize) -> Result<(), RenderError> {
        if child == parent {
            return Ok(());
        }

        match self.host.child_at(parent, i) {
            None => self.host.append_child(parent, child)?,
            Some(current) if current == *child => {}
            Some(current) if self.host.next_sibling(&current).as_ref() == Some(child) => {
                self.host.remove_child(parent, &current)?;
            }
            Some(current) => self.host.insert_before(parent, child, &current)?,
        }
        Ok(())
    }
}
