//! Bearer credential ownership and reactive refresh.

use crate::client::http::HttpTransport;
use crate::GateError;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use tracing::{info, warn};

/// Current access credential.
#[derive(Clone)]
struct Credential {
    access_token: String,
    expiry: Option<DateTime<Utc>>,
}

/// Body returned by the refresh endpoint.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_at: Option<i64>,
}

/// Owns the bearer token used against the check-in API.
///
/// The token is only ever replaced as a whole, and only after the refresh
/// endpoint has produced a usable successor.
pub struct CredentialSession {
    credential: Credential,
    refresh_token: String,
    refresh_url: String,
    refresh_count: u64,
}

impl CredentialSession {
    /// Start a session with an initial access token.
    pub fn new(
        access_token: impl Into<String>,
        refresh_url: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            credential: Credential {
                access_token: access_token.into(),
                expiry: None,
            },
            refresh_token: refresh_token.into(),
            refresh_url: refresh_url.into(),
            refresh_count: 0,
        }
    }

    /// Headers carrying the current bearer token.
    pub fn authorized_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        // A token with bytes that cannot go in a header is sent without
        // Authorization; the API answers 401 and the refresh path takes over.
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.credential.access_token)) {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// On any failure the current credential is left untouched.
    pub fn refresh(&mut self, transport: &dyn HttpTransport) -> Result<(), GateError> {
        info!("Access token rejected, refreshing");
        match self.request_credential(transport) {
            Ok(credential) => {
                self.credential = credential;
                self.refresh_count += 1;
                match self.credential.expiry {
                    Some(expiry) => info!(%expiry, "Access token refreshed"),
                    None => info!("Access token refreshed"),
                }
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, keeping previous token");
                Err(e)
            }
        }
    }

    fn request_credential(&self, transport: &dyn HttpTransport) -> Result<Credential, GateError> {
        let body = serde_json::json!({ "refresh_token": self.refresh_token });
        let response = transport
            .post_json(&self.refresh_url, &body)
            .map_err(|e| GateError::RefreshFailed(e.to_string()))?;

        if !response.is_success() {
            return Err(GateError::RefreshFailed(format!(
                "refresh endpoint returned HTTP {}",
                response.status
            )));
        }

        let parsed: RefreshResponse = serde_json::from_slice(&response.body)
            .map_err(|e| GateError::RefreshFailed(format!("invalid refresh response: {}", e)))?;

        let access_token = parsed
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| GateError::RefreshFailed("response has no access_token".to_string()))?;

        let expiry = parsed
            .expires_at
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));

        Ok(Credential {
            access_token,
            expiry,
        })
    }

    /// Expiry reported by the last refresh, if any.
    #[cfg(test)]
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.credential.expiry
    }

    /// Number of successful refreshes in this session.
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count
    }
}

impl std::fmt::Debug for CredentialSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSession")
            .field("refresh_url", &self.refresh_url)
            .field("expiry", &self.credential.expiry)
            .field("refresh_count", &self.refresh_count)
            .finish_non_exhaustive()
    }
}
