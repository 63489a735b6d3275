//! # Render Queue
//!
//! Collects the frame's [`RenderElement`]s together with their per-element
//! [`RenderStates`], and splits them into batches of consecutive elements of
//! the same kind for the element renderers.
//!
//! ## Identity
//!
//! Each queued element gets a generational [`ElementId`]. Element renderers
//! key their per-batch bookkeeping on the id of a batch's first element, so
//! ids must never be confused across frames; clearing the queue bumps the
//! generation of every slot, which guarantees exactly that.

use crate::foundation::collections::{new_key_type, SlotMap};
use crate::render::element::{ElementKind, RenderElement, RenderStates};

new_key_type! {
    /// Identity of an element queued for the current frame
    pub struct ElementId;
}

/// A queued element seen through its identity
#[derive(Debug, Clone, Copy)]
pub struct ElementRef<'a> {
    /// Identity of the element
    pub id: ElementId,
    /// The element itself
    pub element: &'a RenderElement,
}

/// Maximal run of consecutive queued elements sharing one kind
#[derive(Debug)]
pub struct Batch<'a> {
    /// Kind of every element in the batch
    pub kind: ElementKind,
    /// Elements in queue order
    pub elements: Vec<ElementRef<'a>>,
    /// Render states paired with `elements` by position
    pub render_states: Vec<RenderStates>,
}

#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    id: ElementId,
    states: RenderStates,
}

/// Ordered, resettable collection of the frame's elements
#[derive(Debug, Default)]
pub struct RenderQueue {
    elements: SlotMap<ElementId, RenderElement>,
    entries: Vec<QueueEntry>,
}

impl RenderQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a queue with room for `capacity` elements
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            elements: SlotMap::with_capacity_and_key(capacity),
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Append an element with its render states
    pub fn insert(&mut self, element: RenderElement, states: RenderStates) -> ElementId {
        let id = self.elements.insert(element);
        self.entries.push(QueueEntry { id, states });
        id
    }

    /// Number of queued elements
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Element behind an id, if it is still queued
    pub fn get(&self, id: ElementId) -> Option<&RenderElement> {
        self.elements.get(id)
    }

    /// Queued elements in order, with their render states
    pub fn iter(&self) -> impl Iterator<Item = (ElementRef<'_>, &RenderStates)> {
        self.entries.iter().map(|entry| {
            (
                ElementRef {
                    id: entry.id,
                    element: &self.elements[entry.id],
                },
                &entry.states,
            )
        })
    }

    /// Stable sort of the queue by a key computed once per element
    pub fn sort_by_key<K, F>(&mut self, mut key: F)
    where
        K: Ord,
        F: FnMut(&RenderElement) -> K,
    {
        let elements = &self.elements;
        self.entries.sort_by_cached_key(|entry| key(&elements[entry.id]));
    }

    /// Split the queue into maximal runs of consecutive same-kind elements
    pub fn batches(&self) -> Vec<Batch<'_>> {
        let mut batches: Vec<Batch<'_>> = Vec::new();

        for (element, states) in self.iter() {
            let kind = element.element.kind();
            match batches.last_mut() {
                Some(batch) if batch.kind == kind => {
                    batch.elements.push(element);
                    batch.render_states.push(*states);
                }
                _ => batches.push(Batch {
                    kind,
                    elements: vec![element],
                    render_states: vec![*states],
                }),
            }
        }

        batches
    }

    /// Drop every element; previously issued ids become stale
    pub fn clear(&mut self) {
        self.elements.clear();
        self.entries.clear();
    }
}
