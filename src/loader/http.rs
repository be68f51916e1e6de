//! HTTP resource loader backed by reqwest.
//!
//! Prefetching over HTTP means issuing the GET and draining the body so
//! shared caches and the OS socket layer have done the expensive part
//! before the real navigation needs it. Per-kind Accept headers keep
//! content negotiation honest with what the eventual consumer will ask
//! for.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header;

use crate::config::HttpConfig;
use crate::domain::{ResourceDescriptor, ResourceKind};
use crate::error::{PrefetchError, Result};
use crate::loader::{CancelToken, ResourceLoader};

/// Accept header matching what the eventual consumer of the resource
/// would send.
fn accept_for(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Document => "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        ResourceKind::Image => "image/avif,image/webp,image/*,*/*;q=0.8",
        ResourceKind::Style => "text/css,*/*;q=0.1",
        ResourceKind::Script => "application/javascript,text/javascript,*/*;q=0.1",
        ResourceKind::Font => "font/woff2,font/woff,application/font-woff;q=0.9,*/*;q=0.8",
    }
}

/// Production `ResourceLoader` that warms caches with real GET requests.
#[derive(Debug, Clone)]
pub struct HttpLoader {
    client: Client,
}

impl HttpLoader {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.connect_timeout())
            .build()?;
        Ok(Self { client })
    }

    async fn fetch(&self, descriptor: &ResourceDescriptor) -> Result<()> {
        let response = self
            .client
            .get(&descriptor.url)
            .header(header::ACCEPT, accept_for(descriptor.kind))
            .send()
            .await?
            .error_for_status()?;

        // Drain the body; a half-read transfer warms nothing downstream
        let bytes = response.bytes().await?;
        tracing::trace!(
            url = %descriptor.url,
            kind = %descriptor.kind,
            bytes = bytes.len(),
            "Fetched resource"
        );
        Ok(())
    }
}

#[async_trait]
impl ResourceLoader for HttpLoader {
    async fn load(&self, descriptor: &ResourceDescriptor, cancel: &CancelToken) -> Result<()> {
        tokio::select! {
            result = self.fetch(descriptor) => result,
            _ = cancel.cancelled() => Err(PrefetchError::Cancelled),
        }
    }

    fn description(&self) -> &str {
        "http loader"
    }
}
