//! Resource descriptor and related types
//!
//! The ResourceDescriptor is the unit of work in prefetchr: one url to be
//! opportunistically loaded ahead of need. Its url is the identity key for
//! deduplication; kind selects the loading routine; priority and the
//! optional visit-probability hint drive queue ordering.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What kind of resource a descriptor points at.
///
/// Determines which loading routine the type dispatcher picks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Document,
    Image,
    Style,
    Script,
    Font,
}

impl ResourceKind {
    /// Lowercase name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Document => "document",
            ResourceKind::Image => "image",
            ResourceKind::Style => "style",
            ResourceKind::Script => "script",
            ResourceKind::Font => "font",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "document" => Ok(ResourceKind::Document),
            "image" => Ok(ResourceKind::Image),
            "style" => Ok(ResourceKind::Style),
            "script" => Ok(ResourceKind::Script),
            "font" => Ok(ResourceKind::Font),
            other => Err(format!("unknown resource kind: {}", other)),
        }
    }
}

/// Priority tier for queue ordering. High sorts first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Numeric rank for ordering: high=0, medium=1, low=2.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

/// A single prefetch candidate.
///
/// Descriptors are created at enqueue time and never mutated in place:
/// they move queue -> active -> history and that is the whole lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Absolute or relative locator; resolved against the base origin at
    /// admission, after which it is the dedup identity key.
    pub url: String,

    /// Resource kind, selects the loading routine.
    pub kind: ResourceKind,

    /// Priority tier (default medium).
    pub priority: Priority,

    /// Informational link back to the triggering context. Never used in
    /// ordering.
    pub related_to: Option<String>,

    /// 0..1 tie-breaker within a priority tier; clamped at construction.
    pub expected_visit_probability: Option<f64>,
}

impl ResourceDescriptor {
    /// Create a descriptor with default priority and no hints.
    pub fn new(url: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            url: url.into(),
            kind,
            priority: Priority::default(),
            related_to: None,
            expected_visit_probability: None,
        }
    }

    /// Convenience constructor for a document link.
    pub fn link(url: impl Into<String>) -> Self {
        Self::new(url, ResourceKind::Document)
    }

    /// Convenience constructor for an image.
    pub fn image(url: impl Into<String>) -> Self {
        Self::new(url, ResourceKind::Image)
    }

    /// Set the priority tier.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Record the triggering context.
    pub fn with_related_to(mut self, related_to: impl Into<String>) -> Self {
        self.related_to = Some(related_to.into());
        self
    }

    /// Set the visit-probability hint, clamped into 0..1.
    pub fn with_probability(mut self, probability: f64) -> Self {
        self.expected_visit_probability = Some(probability.clamp(0.0, 1.0));
        self
    }

    /// Effective probability for ordering; absent treated as 0.
    pub fn probability(&self) -> f64 {
        self.expected_visit_probability.unwrap_or(0.0)
    }
}
