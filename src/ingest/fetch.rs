//! Page fetch capability

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::error::FetchFailure;

/// Raw upstream answer for one page
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch one page. A response with any status is `Ok`; `Err` means no
    /// response was obtained at all.
    async fn fetch_page(&self, page: u32) -> Result<FetchResponse, FetchFailure>;
}

/// `GET {endpoint}?page=N` over reqwest
#[derive(Clone)]
pub struct HttpPageFetcher {
    client: Client,
    endpoint: String,
}

impl HttpPageFetcher {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("drop-token-etl/0.1")
            .pool_max_idle_per_host(2)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_page(&self, page: u32) -> Result<FetchResponse, FetchFailure> {
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("page", page)])
            .send()
            .await
            .map_err(|e| FetchFailure::Transport(e.to_string()))?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| FetchFailure::Transport(format!("reading body: {}", e)))?;

        debug!(page, status, bytes = body.len(), "page fetched");
        Ok(FetchResponse { status, body })
    }
}
