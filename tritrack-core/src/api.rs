//! `/api/state` request handling
//!
//! A host HTTP server routes requests for [`STATE_PATH`] here and writes the
//! returned [`ApiResponse`] back to the client. `GET` returns the canonical
//! state, `PUT` accepts any document the normalizer understands and stores
//! its canonical form.

use anyhow::Context;
use serde_json::{json, Value};
use std::io::Read;

use crate::db::StateBackend;
use crate::normalize::normalize_state;

/// Path the state endpoint is mounted on
pub const STATE_PATH: &str = "/api/state";

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// Methods accepted on [`STATE_PATH`], as sent in the `Allow` header
pub const ALLOWED_METHODS: &str = "GET,PUT";

/// A JSON response ready to be written by the host server
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl ApiResponse {
    fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: vec![(
                "Content-Type".to_string(),
                "application/json; charset=utf-8".to_string(),
            )],
            body,
        }
    }

    fn message(status: u16, message: impl Into<String>) -> Self {
        Self::json(status, json!({ "message": message.into() }))
    }

    fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Looks up a header, ignoring case
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Serialized body
    pub fn body_text(&self) -> String {
        self.body.to_string()
    }

    /// Indented body, for humans
    pub fn body_pretty(&self) -> String {
        serde_json::to_string_pretty(&self.body).unwrap_or_else(|_| self.body_text())
    }
}

/// Handler for the state endpoint, backed by any [`StateBackend`]
pub struct StateApi<B: StateBackend> {
    backend: B,
    max_body_bytes: usize,
}

impl<B: StateBackend> StateApi<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            max_body_bytes: MAX_BODY_BYTES,
        }
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns true if the request path (query string ignored) targets this endpoint
    pub fn matches(path: &str) -> bool {
        path.split('?').next() == Some(STATE_PATH)
    }

    /// Handles a request whose body is already buffered
    pub fn handle(&self, method: &str, body: &[u8]) -> ApiResponse {
        self.handle_reader(method, body)
    }

    /// Handles a request, reading at most the body limit from `body`
    pub fn handle_reader<R: Read>(&self, method: &str, body: R) -> ApiResponse {
        if method.eq_ignore_ascii_case("GET") {
            self.get()
        } else if method.eq_ignore_ascii_case("PUT") {
            match read_limited(body, self.max_body_bytes) {
                Ok(bytes) => self.put(&bytes),
                Err(e) => {
                    log::error!("Rejected state upload: {:#}", e);
                    ApiResponse::message(400, e.to_string())
                }
            }
        } else {
            ApiResponse::message(405, "Method Not Allowed").with_header("Allow", ALLOWED_METHODS)
        }
    }

    fn get(&self) -> ApiResponse {
        match self.backend.try_load() {
            Ok(state) => match serde_json::to_value(&state) {
                Ok(body) => ApiResponse::json(200, body),
                Err(e) => {
                    log::error!("Failed to serialize state: {}", e);
                    ApiResponse::message(500, "Failed to load state")
                }
            },
            Err(e) => {
                log::error!("Failed to load state: {:#}", e);
                ApiResponse::message(500, "Failed to load state")
            }
        }
    }

    fn put(&self, body: &[u8]) -> ApiResponse {
        let result = (|| -> anyhow::Result<()> {
            let body = if body.iter().all(u8::is_ascii_whitespace) {
                &b"{}"[..]
            } else {
                body
            };
            let parsed: Value = serde_json::from_slice(body).context("Invalid payload")?;
            let state = normalize_state(&parsed);
            self.backend.save(&state)
        })();

        match result {
            Ok(()) => ApiResponse::json(200, json!({ "ok": true })),
            Err(e) => {
                log::error!("Failed to save state: {:#}", e);
                ApiResponse::message(400, format!("{:#}", e))
            }
        }
    }
}

/// Reads the body, stopping as soon as it exceeds `limit`
fn read_limited<R: Read>(reader: R, limit: usize) -> anyhow::Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader
        .take(limit as u64 + 1)
        .read_to_end(&mut buf)
        .context("Failed to read request body")?;
    if buf.len() > limit {
        anyhow::bail!("Payload too large");
    }
    Ok(buf)
}
