//! Visibility trigger interface.
//!
//! The scheduler core never watches a document itself: a trigger source
//! observes page elements and sends a one-shot `NearVisibleEvent` per
//! element over an mpsc channel (see `PrefetchScheduler::attach_trigger`).
//! Stopping observation after the first fire is the sender's obligation;
//! the annotation module supplies the inference rules for turning an
//! observed element into an event.

use serde::{Deserialize, Serialize};

use crate::domain::{Priority, ResourceDescriptor, ResourceKind};

pub mod annotation;

pub use annotation::{Annotation, ObservedElement, infer_event};

/// One element crossing the near-visible threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearVisibleEvent {
    /// Inferred prefetch target.
    pub url: String,
    /// Inferred resource kind.
    pub kind: ResourceKind,
    /// Author-supplied priority annotation, if any.
    pub priority: Option<Priority>,
    /// Author-supplied visit-probability annotation, if any.
    pub probability: Option<f64>,
    /// Identifier of the triggering element, for diagnostics.
    pub related_to: Option<String>,
}

impl NearVisibleEvent {
    pub fn new(url: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            url: url.into(),
            kind,
            priority: None,
            probability: None,
            related_to: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_probability(mut self, probability: f64) -> Self {
        self.probability = Some(probability);
        self
    }

    pub fn with_related_to(mut self, related_to: impl Into<String>) -> Self {
        self.related_to = Some(related_to.into());
        self
    }

    /// Convert into the descriptor handed to admission.
    pub fn into_descriptor(self) -> ResourceDescriptor {
        let mut descriptor = ResourceDescriptor::new(self.url, self.kind);
        if let Some(priority) = self.priority {
            descriptor = descriptor.with_priority(priority);
        }
        if let Some(probability) = self.probability {
            descriptor = descriptor.with_probability(probability);
        }
        if let Some(related_to) = self.related_to {
            descriptor = descriptor.with_related_to(related_to);
        }
        descriptor
    }
}
