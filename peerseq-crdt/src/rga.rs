//! Replicated Growable Array (RGA) for sequences.
//!
//! A CRDT for ordered sequences that supports insert and remove. Every
//! element records the element it was inserted after (its anchor), which
//! makes the whole state a tree rooted at a virtual root anchor. The linear
//! value is a pre-order walk of that tree in which the children of one
//! anchor are visited newest-id first.
//!
//! Because the walk depends only on the tree, never on the order elements
//! arrived in, replicas that hold the same elements hold the same sequence.
//!
//! Based on "A comprehensive study of Convergent and Commutative Replicated
//! Data Types" (Shapiro et al.).
//!
//! Use cases:
//! - Collaboratively edited text (one element per character)
//! - Ordered lists where position matters

use peerseq_types::OperationId;
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::collections::HashMap;

/// Result type for RGA operations.
pub type RgaResult<T> = Result<T, RgaError>;

/// Errors raised when an element cannot be attached to the tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RgaError {
    #[error("anchor {0} is not part of the sequence")]
    UnknownAnchor(OperationId),

    #[error("element {0} is not part of the sequence")]
    UnknownElement(OperationId),

    #[error("the root anchor cannot be used as an element id")]
    RootId,

    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
}

/// One entry of the sequence.
///
/// Elements are never removed: deletion only sets the tombstone flag, so
/// later insertions can still anchor to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element<T> {
    id: OperationId,
    anchor: OperationId,
    value: T,
    #[serde(default)]
    tombstone: bool,
}

impl<T> Element<T> {
    /// Creates a live element.
    #[must_use]
    pub fn new(id: OperationId, anchor: OperationId, value: T) -> Self {
        Self {
            id,
            anchor,
            value,
            tombstone: false,
        }
    }

    /// Marks the element as deleted (builder style).
    #[must_use]
    pub fn tombstoned(mut self) -> Self {
        self.tombstone = true;
        self
    }

    /// The operation that inserted this element.
    #[must_use]
    pub fn id(&self) -> &OperationId {
        &self.id
    }

    /// The element this one was inserted after.
    #[must_use]
    pub fn anchor(&self) -> &OperationId {
        &self.anchor
    }

    /// The payload.
    #[must_use]
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Whether the element has been removed.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.tombstone
    }
}

/// Cached linear view of the tree.
#[derive(Debug, Clone)]
struct Materialized<T> {
    /// Arena indices in sequence order, tombstones included.
    order: Vec<usize>,
    /// Arena indices of live elements in sequence order.
    visible: Vec<usize>,
    /// Payloads of the live elements.
    values: Vec<T>,
}

/// A Replicated Growable Array.
///
/// Elements live in an append-only arena. A side index resolves operation
/// ids to arena slots, and every node keeps its children sorted by
/// descending id, so materializing never sorts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    try_from = "Vec<Element<T>>",
    into = "Vec<Element<T>>",
    bound(
        serialize = "T: Serialize + Clone",
        deserialize = "T: Deserialize<'de> + Clone"
    )
)]
pub struct Rga<T: Clone> {
    elements: Vec<Element<T>>,
    index: HashMap<OperationId, usize>,
    /// Children of the root anchor.
    roots: Vec<usize>,
    /// `children[i]` holds the children of `elements[i]`.
    children: Vec<Vec<usize>>,
    cache: OnceCell<Materialized<T>>,
}

impl<T: Clone> Default for Rga<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Rga<T> {
    /// Creates a new empty RGA.
    #[must_use]
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
            index: HashMap::new(),
            roots: Vec::new(),
            children: Vec::new(),
            cache: OnceCell::new(),
        }
    }

    // ── Mutation ────────────────────────────────────────────────

    /// Inserts `value` immediately after `anchor`.
    ///
    /// Inserting an id that is already present is a no-op and returns the
    /// existing element.
    pub fn insert_after(
        &mut self,
        id: OperationId,
        anchor: OperationId,
        value: T,
    ) -> RgaResult<&Element<T>> {
        let slot = self.attach(Element::new(id, anchor, value))?;
        Ok(&self.elements[slot])
    }

    /// Inserts `value` after the last live element.
    pub fn push(&mut self, id: OperationId, value: T) -> RgaResult<&Element<T>> {
        let anchor = self
            .last_visible_id()
            .cloned()
            .unwrap_or_else(OperationId::root);
        self.insert_after(id, anchor, value)
    }

    /// Inserts `value` so that it ends up at visible position `index`.
    pub fn insert_at(&mut self, id: OperationId, index: usize, value: T) -> RgaResult<&Element<T>> {
        let anchor = self.anchor_for_index(index)?;
        self.insert_after(id, anchor, value)
    }

    /// Returns the anchor a local insertion at `index` must use.
    pub fn anchor_for_index(&self, index: usize) -> RgaResult<OperationId> {
        let len = self.len();
        if index > len {
            return Err(RgaError::IndexOutOfBounds { index, len });
        }
        if index == 0 {
            return Ok(OperationId::root());
        }
        let slot = self.materialized().visible[index - 1];
        Ok(self.elements[slot].id.clone())
    }

    /// Tombstones the element with the given id.
    ///
    /// Returns `false` if it was already tombstoned.
    pub fn remove(&mut self, id: &OperationId) -> RgaResult<bool> {
        let slot = *self
            .index
            .get(id)
            .ok_or_else(|| RgaError::UnknownElement(id.clone()))?;
        Ok(self.tombstone_slot(slot))
    }

    /// Integrates an element received from another replica.
    ///
    /// Idempotent and order-independent: re-merging a known element only
    /// carries over its tombstone. Returns true if the state changed.
    pub fn merge(&mut self, element: Element<T>) -> RgaResult<bool> {
        if let Some(&slot) = self.index.get(&element.id) {
            return Ok(element.tombstone && self.tombstone_slot(slot));
        }
        self.attach(element)?;
        Ok(true)
    }

    /// Merges the whole state of another RGA into this one.
    ///
    /// Union of elements, tombstones win. This operation is commutative,
    /// associative, and idempotent.
    pub fn merge_state(&mut self, other: &Self) -> RgaResult<bool> {
        let mut changed = false;
        // Sequence order visits every anchor before the elements hanging off it.
        for element in other.elements_in_order() {
            changed |= self.merge(element.clone())?;
        }
        Ok(changed)
    }

    /// Creates a new RGA that is the merge of this and another.
    pub fn merged(&self, other: &Self) -> RgaResult<Self> {
        let mut result = self.clone();
        result.merge_state(other)?;
        Ok(result)
    }

    fn attach(&mut self, element: Element<T>) -> RgaResult<usize> {
        if element.id.is_root() {
            return Err(RgaError::RootId);
        }
        if let Some(&slot) = self.index.get(&element.id) {
            return Ok(slot);
        }

        let parent = if element.anchor.is_root() {
            None
        } else {
            Some(
                *self
                    .index
                    .get(&element.anchor)
                    .ok_or_else(|| RgaError::UnknownAnchor(element.anchor.clone()))?,
            )
        };

        let slot = self.elements.len();
        let siblings = match parent {
            Some(parent) => &mut self.children[parent],
            None => &mut self.roots,
        };
        // Siblings are kept in descending id order: newest first.
        let elements = &self.elements;
        let position = siblings.partition_point(|&sibling| elements[sibling].id > element.id);
        siblings.insert(position, slot);

        self.index.insert(element.id.clone(), slot);
        self.elements.push(element);
        self.children.push(Vec::new());
        self.cache.take();
        Ok(slot)
    }

    fn tombstone_slot(&mut self, slot: usize) -> bool {
        let element = &mut self.elements[slot];
        if element.tombstone {
            return false;
        }
        element.tombstone = true;
        self.cache.take();
        true
    }

    // ── Materialization ─────────────────────────────────────────

    fn materialized(&self) -> &Materialized<T> {
        self.cache.get_or_init(|| self.materialize())
    }

    /// Pre-order walk from the root anchor.
    fn materialize(&self) -> Materialized<T> {
        let mut order = Vec::with_capacity(self.elements.len());
        let mut visible = Vec::new();
        let mut values = Vec::new();

        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();
        while let Some(slot) = stack.pop() {
            order.push(slot);
            let element = &self.elements[slot];
            if !element.tombstone {
                visible.push(slot);
                values.push(element.value.clone());
            }
            stack.extend(self.children[slot].iter().rev().copied());
        }

        Materialized {
            order,
            visible,
            values,
        }
    }

    // ── Queries ─────────────────────────────────────────────────

    /// Returns the live values in sequence order.
    #[must_use]
    pub fn value(&self) -> &[T] {
        &self.materialized().values
    }

    /// Returns the live values as an owned vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.value().to_vec()
    }

    /// Returns the number of visible (non-deleted) elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.materialized().visible.len()
    }

    /// Returns true if the sequence has no visible elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of elements ever merged, tombstones included.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Returns the value at the given visible index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.value().get(index)
    }

    /// Returns the id of the element at the given visible index.
    #[must_use]
    pub fn id_at(&self, index: usize) -> Option<&OperationId> {
        let slot = *self.materialized().visible.get(index)?;
        Some(&self.elements[slot].id)
    }

    /// Returns the id of the last visible element.
    #[must_use]
    pub fn last_visible_id(&self) -> Option<&OperationId> {
        let slot = *self.materialized().visible.last()?;
        Some(&self.elements[slot].id)
    }

    /// Returns the visible index of an element, if it exists and is live.
    #[must_use]
    pub fn index_of(&self, id: &OperationId) -> Option<usize> {
        let slot = *self.index.get(id)?;
        self.materialized().visible.iter().position(|&s| s == slot)
    }

    /// Returns whether an id is known (tombstoned or not). The root anchor
    /// is always known.
    #[must_use]
    pub fn contains(&self, id: &OperationId) -> bool {
        id.is_root() || self.index.contains_key(id)
    }

    /// Returns whether an element is tombstoned.
    #[must_use]
    pub fn is_tombstoned(&self, id: &OperationId) -> bool {
        self.element(id).is_some_and(Element::is_tombstone)
    }

    /// Looks up an element by id.
    #[must_use]
    pub fn element(&self, id: &OperationId) -> Option<&Element<T>> {
        self.index.get(id).map(|&slot| &self.elements[slot])
    }

    /// Returns all element ids in sequence order, tombstones included.
    #[must_use]
    pub fn ids_in_order(&self) -> Vec<OperationId> {
        self.elements_in_order().map(|e| e.id.clone()).collect()
    }

    /// Iterates all elements in sequence order, tombstones included.
    ///
    /// Every element comes after its anchor, so replaying this iterator into
    /// an empty RGA never fails.
    pub fn elements_in_order(&self) -> impl Iterator<Item = &Element<T>> {
        self.materialized()
            .order
            .iter()
            .map(move |&slot| &self.elements[slot])
    }
}

impl<T: Clone> From<Rga<T>> for Vec<Element<T>> {
    fn from(rga: Rga<T>) -> Self {
        rga.elements_in_order().cloned().collect()
    }
}

impl<T: Clone> TryFrom<Vec<Element<T>>> for Rga<T> {
    type Error = RgaError;

    fn try_from(elements: Vec<Element<T>>) -> Result<Self, Self::Error> {
        let mut rga = Self::new();
        for element in elements {
            rga.merge(element)?;
        }
        Ok(rga)
    }
}

impl Rga<char> {
    /// Converts the visible characters to a String.
    #[must_use]
    pub fn as_string(&self) -> String {
        self.value().iter().collect()
    }
}
