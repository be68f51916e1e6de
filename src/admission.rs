//! Admission filter - decides whether a candidate url may enter the queue.
//!
//! Pure predicate plus dedup lookups, no network or timing side effects.
//! Rejection is normal filtering, not failure: callers log at debug level
//! and move on.

use std::collections::HashSet;
use std::fmt;

use url::Url;

use crate::history::HistoryStore;

/// Why a candidate was kept out of the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Scheduler is disabled.
    Disabled,
    /// Fragment-only reference ("#top"), nothing to fetch.
    FragmentOnly,
    /// Scheme is not http/https (mailto:, tel:, javascript:, data:, ...).
    NonNetworkScheme(String),
    /// Url could not be parsed or resolved against the base.
    Invalid(String),
    /// Origin (scheme/host/port) differs from the document origin.
    CrossOrigin,
    /// Already in history or currently in flight.
    Duplicate,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Disabled => write!(f, "scheduler disabled"),
            RejectReason::FragmentOnly => write!(f, "fragment-only url"),
            RejectReason::NonNetworkScheme(scheme) => {
                write!(f, "non-network scheme: {}", scheme)
            }
            RejectReason::Invalid(url) => write!(f, "invalid url: {}", url),
            RejectReason::CrossOrigin => write!(f, "cross-origin"),
            RejectReason::Duplicate => write!(f, "duplicate"),
        }
    }
}

/// Resolve a raw url against the base origin and apply the static checks
/// (fragment, scheme, origin). Does not consult history.
///
/// The fragment is stripped from the resolved url: it never goes on the
/// wire, so it must not split dedup identity.
pub fn resolve(base: &Url, raw: &str) -> Result<Url, RejectReason> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RejectReason::Invalid(raw.to_string()));
    }
    if trimmed.starts_with('#') {
        return Err(RejectReason::FragmentOnly);
    }

    let mut resolved = base
        .join(trimmed)
        .map_err(|_| RejectReason::Invalid(raw.to_string()))?;

    match resolved.scheme() {
        "http" | "https" => {}
        other => return Err(RejectReason::NonNetworkScheme(other.to_string())),
    }

    if resolved.origin() != base.origin() {
        return Err(RejectReason::CrossOrigin);
    }

    resolved.set_fragment(None);
    Ok(resolved)
}

/// Full admission check: static checks plus dedup against history and the
/// in-flight set. Returns the resolved url a descriptor should carry.
pub fn admit(
    base: &Url,
    raw: &str,
    enabled: bool,
    history: &HistoryStore,
    active: &HashSet<String>,
) -> Result<Url, RejectReason> {
    if !enabled {
        return Err(RejectReason::Disabled);
    }

    let resolved = resolve(base, raw)?;

    if history.contains(resolved.as_str()) || active.contains(resolved.as_str()) {
        return Err(RejectReason::Duplicate);
    }

    Ok(resolved)
}
