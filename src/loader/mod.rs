//! Type dispatcher - routes descriptors to resource-type loading routines.
//!
//! The `ResourceLoader` trait is the seam between the scheduler core and
//! the actual fetching machinery. `dispatch` wraps every load with the
//! resource timeout and a cancellation token, and always resolves to a
//! non-fatal `LoadOutcome` - one bad resource can never stall the
//! controller.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{LoadOutcome, ResourceDescriptor};
use crate::error::Result;

pub mod cancel;
pub mod http;
pub mod mock;

pub use cancel::CancelToken;
pub use http::HttpLoader;
pub use mock::{MockLoader, MockMode};

/// Trait for resource-type loading routines.
#[async_trait]
pub trait ResourceLoader: Send + Sync {
    /// Attempt to load the resource far enough to warm caches.
    ///
    /// Implementations should watch the cancellation token and abandon
    /// the transfer promptly once it fires.
    async fn load(&self, descriptor: &ResourceDescriptor, cancel: &CancelToken) -> Result<()>;

    /// Short description for diagnostics.
    fn description(&self) -> &str {
        "loader"
    }
}

/// Run one load under the resource timeout.
///
/// Never returns an error: success, natural failure and timeout all map to
/// a `LoadOutcome`. On timeout the load's token is cancelled and the
/// attempt is abandoned; it is not retried.
pub async fn dispatch(
    loader: &dyn ResourceLoader,
    descriptor: &ResourceDescriptor,
    timeout: Duration,
) -> LoadOutcome {
    let token = CancelToken::new();

    tokio::select! {
        result = loader.load(descriptor, &token) => match result {
            Ok(()) => LoadOutcome::Completed,
            Err(e) => LoadOutcome::Failed(e.to_string()),
        },
        _ = tokio::time::sleep(timeout) => {
            token.cancel();
            LoadOutcome::TimedOut
        }
    }
}
