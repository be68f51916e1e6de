//! Priority queue of admitted, not-yet-dispatched descriptors.
//!
//! Total order: priority tier first (high before medium before low), then
//! descending expected visit probability within a tier. No stability
//! promise for equal keys. The queue carries a defensive duplicate check:
//! admission already rejects anything in history or in flight, but a url
//! can be nominated twice before its first copy leaves the queue.

use std::cmp::Ordering;

use crate::domain::ResourceDescriptor;

/// Ordered sequence of pending prefetch descriptors.
#[derive(Debug, Default)]
pub struct PrefetchQueue {
    items: Vec<ResourceDescriptor>,
}

fn compare(a: &ResourceDescriptor, b: &ResourceDescriptor) -> Ordering {
    a.priority
        .rank()
        .cmp(&b.priority.rank())
        .then_with(|| {
            b.probability()
                .partial_cmp(&a.probability())
                .unwrap_or(Ordering::Equal)
        })
}

impl PrefetchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a descriptor at its ordered position.
    ///
    /// Returns false (and drops the descriptor) if the url is already
    /// queued.
    pub fn push(&mut self, descriptor: ResourceDescriptor) -> bool {
        if self.contains(&descriptor.url) {
            return false;
        }
        let position = self
            .items
            .binary_search_by(|queued| compare(queued, &descriptor))
            .unwrap_or_else(|insert_at| insert_at);
        self.items.insert(position, descriptor);
        true
    }

    /// Remove and return the head of the queue.
    pub fn pop(&mut self) -> Option<ResourceDescriptor> {
        if self.items.is_empty() {
            None
        } else {
            Some(self.items.remove(0))
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.items.iter().any(|queued| queued.url == url)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drop every queued descriptor (disable path).
    pub fn clear(&mut self) {
        self.items.clear();
    }
}
