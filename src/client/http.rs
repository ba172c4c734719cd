//! HTTP transport seam and its reqwest-based implementation.
//!
//! Everything above this module speaks in terms of [`HttpTransport`], so
//! the paging and refresh logic can be exercised without a network.

use crate::GateError;
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, USER_AGENT};
use std::time::Duration;

/// HTTP response with status and raw body.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,

    /// Raw response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Build a response from a status code and body.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Read status and body from a reqwest response.
    fn from_response(response: Response) -> Result<Self, GateError> {
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|e| GateError::Transport(format!("Failed to read body: {}", e)))?
            .to_vec();

        Ok(Self { status, body })
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Minimal blocking HTTP surface used by the API client.
///
/// Implementations return `Err(GateError::Transport)` only when no response
/// was obtained. Any status code, including errors, comes back as `Ok`.
pub trait HttpTransport {
    /// Issue a GET with the given headers.
    fn get(&self, url: &str, headers: &HeaderMap) -> Result<HttpResponse, GateError>;

    /// Issue a POST with a JSON body.
    fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<HttpResponse, GateError>;
}

/// Blocking reqwest transport.
pub struct ReqwestTransport {
    client: Client,
    user_agent: String,
}

impl ReqwestTransport {
    /// Create a transport with the given request timeout and User-Agent.
    pub fn new(timeout: Duration, user_agent: impl Into<String>) -> Result<Self, GateError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GateError::Transport(format!("Failed to create client: {}", e)))?;

        Ok(Self {
            client,
            user_agent: user_agent.into(),
        })
    }
}

impl HttpTransport for ReqwestTransport {
    fn get(&self, url: &str, headers: &HeaderMap) -> Result<HttpResponse, GateError> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .headers(headers.clone())
            .send()
            .map_err(|e| GateError::Transport(format!("GET {} failed: {}", url, e)))?;

        HttpResponse::from_response(response)
    }

    fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<HttpResponse, GateError> {
        let response = self
            .client
            .post(url)
            .header(USER_AGENT, &self.user_agent)
            .json(body)
            .send()
            .map_err(|e| GateError::Transport(format!("POST {} failed: {}", url, e)))?;

        HttpResponse::from_response(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_success() {
        assert!(HttpResponse::new(200, "").is_success());
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(401, "").is_success());
        assert!(!HttpResponse::new(302, "").is_success());
    }

    #[test]
    fn test_transport_creation() {
        let transport = ReqwestTransport::new(Duration::from_secs(5), "qrgate/test");
        assert!(transport.is_ok());
    }

    #[test]
    fn test_unreachable_host_is_transport_error() {
        let transport = ReqwestTransport::new(Duration::from_millis(500), "qrgate/test").unwrap();
        let result = transport.get("http://127.0.0.1:9/checkins", &HeaderMap::new());
        assert!(matches!(result, Err(GateError::Transport(_))));
    }
}
