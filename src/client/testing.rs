//! Scripted transport for exercising the client without a network.

use crate::client::http::{HttpResponse, HttpTransport};
use crate::GateError;
use reqwest::header::{HeaderMap, AUTHORIZATION};
use std::cell::RefCell;
use std::collections::VecDeque;

/// A request observed by [`ScriptedTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// `GET` or `POST`.
    pub method: &'static str,

    /// Full request URL.
    pub url: String,

    /// Authorization header value, if one was sent.
    pub authorization: Option<String>,

    /// JSON body for POSTs.
    pub body: Option<String>,
}

/// Transport that replays queued responses in order.
///
/// GETs and POSTs have separate queues. An exhausted queue answers with a
/// transport error, which is what a dead network looks like to the client.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    gets: RefCell<VecDeque<Result<HttpResponse, GateError>>>,
    posts: RefCell<VecDeque<Result<HttpResponse, GateError>>>,
    requests: RefCell<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    /// Create an empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a GET response.
    pub fn push_get(&self, status: u16, body: impl Into<Vec<u8>>) -> &Self {
        self.gets
            .borrow_mut()
            .push_back(Ok(HttpResponse::new(status, body)));
        self
    }

    /// Queue a GET that fails at the transport level.
    pub fn push_get_error(&self, message: &str) -> &Self {
        self.gets
            .borrow_mut()
            .push_back(Err(GateError::Transport(message.to_string())));
        self
    }

    /// Queue a page response with one record per ticket id.
    pub fn push_page(&self, ticket_ids: &[&str], has_next: bool) -> &Self {
        self.push_get(200, page_body(ticket_ids, has_next))
    }

    /// Queue a POST response.
    pub fn push_post(&self, status: u16, body: impl Into<Vec<u8>>) -> &Self {
        self.posts
            .borrow_mut()
            .push_back(Ok(HttpResponse::new(status, body)));
        self
    }

    /// All requests seen so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.borrow().clone()
    }

    /// Number of GETs seen so far.
    pub fn get_count(&self) -> usize {
        self.requests
            .borrow()
            .iter()
            .filter(|r| r.method == "GET")
            .count()
    }

    /// Number of POSTs seen so far.
    pub fn post_count(&self) -> usize {
        self.requests
            .borrow()
            .iter()
            .filter(|r| r.method == "POST")
            .count()
    }

    /// GET responses still queued.
    pub fn pending_gets(&self) -> usize {
        self.gets.borrow().len()
    }
}

impl HttpTransport for ScriptedTransport {
    fn get(&self, url: &str, headers: &HeaderMap) -> Result<HttpResponse, GateError> {
        self.requests.borrow_mut().push(RecordedRequest {
            method: "GET",
            url: url.to_string(),
            authorization: headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(String::from),
            body: None,
        });
        self.gets
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(GateError::Transport("no scripted GET response".to_string())))
    }

    fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<HttpResponse, GateError> {
        self.requests.borrow_mut().push(RecordedRequest {
            method: "POST",
            url: url.to_string(),
            authorization: None,
            body: Some(body.to_string()),
        });
        self.posts
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(GateError::Transport("no scripted POST response".to_string())))
    }
}

/// Build a page body in the check-in API format.
pub fn page_body(ticket_ids: &[&str], has_next: bool) -> Vec<u8> {
    let entries: Vec<serde_json::Value> = ticket_ids
        .iter()
        .map(|id| serde_json::json!({"relationships": {"ticket": {"id": id}}}))
        .collect();
    serde_json::json!({
        "checkInEntries": entries,
        "meta": {"hasNext": has_next}
    })
    .to_string()
    .into_bytes()
}
