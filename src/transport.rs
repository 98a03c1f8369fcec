//! HTTP transport seam for the Mill API.
//!
//! The Mill cloud reports application errors inside the JSON body, so the
//! production transport disables ureq's status-as-error behaviour and hands
//! every response (status, headers, parsed body) to the caller. Only
//! network-level failures and unreadable bodies surface as errors here.

use http::StatusCode;
use log::error;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug)]
pub enum TransportError {
    /// Timeout or connection-level failure.
    Network(String),
    /// The response body could not be read or was not JSON.
    Body(String),
}

impl core::fmt::Display for TransportError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TransportError::Network(s) => write!(f, "network error: {}", s),
            TransportError::Body(s) => write!(f, "unreadable response body: {}", s),
        }
    }
}

impl std::error::Error for TransportError {}

/// A fully received Mill API response.
#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl WireResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Issues a POST with per-call headers and query parameters.
///
/// Implementations own the connection lifecycle and must signal only
/// network-level failure; application error codes stay in the body.
pub trait Transport {
    fn post(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        params: &[(&str, String)],
    ) -> Result<WireResponse, TransportError>;
}

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .new_agent();
        UreqTransport { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Transport for UreqTransport {
    fn post(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        params: &[(&str, String)],
    ) -> Result<WireResponse, TransportError> {
        let mut req = self.agent.post(url);
        for (k, v) in headers {
            req = req.header(*k, *v);
        }
        for (k, v) in params {
            req = req.query(*k, v);
        }

        let mut resp = req.send_empty().map_err(|e| {
            error!("POST {} failed: {}", url, e);
            TransportError::Network(e.to_string())
        })?;

        let status = resp.status();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body: Value = resp.body_mut().read_json().map_err(|e| {
            error!("POST {}: body not JSON: {}", url, e);
            TransportError::Body(e.to_string())
        })?;

        Ok(WireResponse { status, headers, body })
    }
}
