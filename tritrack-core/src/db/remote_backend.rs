//! Remote document backend
//!
//! The state lives at a fixed URL: `GET` fetches it, `PUT` overwrites it.
//! A 404 on read means nothing has been stored yet; the first load then
//! creates the document with the initial state.

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use std::time::Duration;

use super::traits::{BackendType, StateBackend};

/// Remote backend implementation
pub struct RemoteBackend {
    url: String,
    client: Client,
}

impl RemoteBackend {
    /// Creates a backend for the document at `url`
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

impl StateBackend for RemoteBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Remote
    }

    fn location(&self) -> String {
        self.url.clone()
    }

    fn seeds_missing_document(&self) -> bool {
        true
    }

    fn read_document(&self) -> Result<Option<String>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .with_context(|| format!("Failed to fetch {}", self.url))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            anyhow::bail!("Fetching {} returned {}", self.url, status);
        }
        let body = response
            .text()
            .with_context(|| format!("Failed to read body from {}", self.url))?;
        Ok(Some(body))
    }

    fn write_document(&self, contents: &str) -> Result<()> {
        let response = self
            .client
            .put(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(contents.to_string())
            .send()
            .with_context(|| format!("Failed to upload to {}", self.url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Uploading to {} returned {}", self.url, status);
        }
        Ok(())
    }
}
