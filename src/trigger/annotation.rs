//! Declarative prefetch annotation convention.
//!
//! An element may declare an explicit target url, resource kind, priority
//! and visit probability. Plain links and images need no annotation:
//! `a[href]` auto-detects as a document, `img[src]` as an image. Anything
//! else without an explicit target yields no event.

use crate::domain::{Priority, ResourceKind};
use crate::trigger::NearVisibleEvent;

/// Author-supplied prefetch annotations on one element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotation {
    /// Explicit prefetch target; wins over href/src.
    pub target: Option<String>,
    /// Explicit resource kind; wins over tag-shape detection.
    pub kind: Option<ResourceKind>,
    pub priority: Option<Priority>,
    pub probability: Option<f64>,
}

impl Annotation {
    pub fn is_empty(&self) -> bool {
        self.target.is_none()
            && self.kind.is_none()
            && self.priority.is_none()
            && self.probability.is_none()
    }
}

/// Host-agnostic view of an observed page element.
#[derive(Debug, Clone, Default)]
pub struct ObservedElement {
    pub tag: String,
    pub id: Option<String>,
    pub href: Option<String>,
    pub src: Option<String>,
    pub annotation: Annotation,
}

impl ObservedElement {
    /// A plain link element.
    pub fn link(href: impl Into<String>) -> Self {
        Self {
            tag: "a".to_string(),
            href: Some(href.into()),
            ..Default::default()
        }
    }

    /// A plain image element.
    pub fn image(src: impl Into<String>) -> Self {
        Self {
            tag: "img".to_string(),
            src: Some(src.into()),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotation = annotation;
        self
    }
}

fn kind_for_tag(tag: &str) -> Option<ResourceKind> {
    match tag {
        "a" => Some(ResourceKind::Document),
        "img" => Some(ResourceKind::Image),
        "link" => Some(ResourceKind::Style),
        "script" => Some(ResourceKind::Script),
        _ => None,
    }
}

/// Turn an observed element into a near-visible event, or nothing if it
/// declares no target and has no auto-detectable shape.
pub fn infer_event(element: &ObservedElement) -> Option<NearVisibleEvent> {
    let annotation = &element.annotation;

    let url = annotation
        .target
        .clone()
        .or_else(|| match element.tag.as_str() {
            "a" => element.href.clone(),
            "img" => element.src.clone(),
            _ => None,
        })?;

    // Explicit kind wins; tag shape next; an annotated target on an
    // unrecognized element defaults to document.
    let kind = annotation
        .kind
        .or_else(|| kind_for_tag(&element.tag))
        .unwrap_or(ResourceKind::Document);

    let mut event = NearVisibleEvent::new(url, kind);
    if let Some(priority) = annotation.priority {
        event = event.with_priority(priority);
    }
    if let Some(probability) = annotation.probability {
        event = event.with_probability(probability);
    }
    if let Some(id) = &element.id {
        event = event.with_related_to(id.clone());
    }
    Some(event)
}
