//! Paged check-in fetching with one-shot token refresh.
//!
//! Two access patterns are supported:
//! - a full scan from page 0 following `hasNext`, which records the last
//!   page index as the high-water mark
//! - a tail window ending at the high-water mark, fetched by explicit
//!   index regardless of `hasNext`, used to pick up recent check-ins

use crate::client::http::{HttpResponse, HttpTransport};
use crate::client::session::CredentialSession;
use crate::protocol::models::{parse_page, Page, Record};
use crate::GateError;
use std::ops::RangeInclusive;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

const UNAUTHORIZED: u16 = 401;

/// Client for the paged check-in endpoint.
pub struct PaginatedApiClient<T: HttpTransport> {
    transport: T,
    session: CredentialSession,
    base_url: String,
    delay: Duration,
    high_water: u64,
}

impl<T: HttpTransport> PaginatedApiClient<T> {
    /// Create a client for `base_url` using the given session.
    pub fn new(
        transport: T,
        session: CredentialSession,
        base_url: impl Into<String>,
        delay: Duration,
    ) -> Self {
        Self {
            transport,
            session,
            base_url: base_url.into(),
            delay,
            high_water: 0,
        }
    }

    fn page_url(&self, index: u64) -> String {
        let separator = if self.base_url.contains('?') { '&' } else { '?' };
        format!("{}{}pageIndex={}", self.base_url, separator, index)
    }

    fn get_authorized(&self, url: &str) -> Result<HttpResponse, GateError> {
        self.transport.get(url, &self.session.authorized_headers())
    }

    /// Fetch a single page.
    ///
    /// A 401 leads to exactly one token refresh and one retry. A second 401,
    /// a failed refresh, or any other non-2xx status fails the page.
    pub fn fetch_page(&mut self, index: u64) -> Result<Page, GateError> {
        let url = self.page_url(index);
        let mut response = self.get_authorized(&url)?;

        if response.status == UNAUTHORIZED {
            if self.session.refresh(&self.transport).is_err() {
                return Err(GateError::AuthRejected {
                    status: response.status,
                });
            }
            response = self.get_authorized(&url)?;
        }

        if response.status == UNAUTHORIZED {
            return Err(GateError::AuthRejected {
                status: response.status,
            });
        }
        if !response.is_success() {
            return Err(GateError::UnexpectedStatus {
                status: response.status,
            });
        }

        let envelope = parse_page(&response.body)?;
        let page = Page::from_envelope(index, envelope);
        debug!(
            page = index,
            entries = page.records.len(),
            has_next = page.has_next,
            "Fetched page"
        );
        Ok(page)
    }

    /// Fetch every page starting at 0 until `hasNext` is false.
    ///
    /// The high-water mark is only updated once the scan completes.
    pub fn fetch_all(&mut self) -> Result<Vec<Record>, GateError> {
        let mut records = Vec::new();
        let mut index = 0;

        loop {
            let page = self.fetch_page(index)?;
            records.extend(page.records);

            if !page.has_next {
                break;
            }

            index += 1;
            self.pause();
        }

        self.high_water = index;
        info!(
            pages = index + 1,
            entries = records.len(),
            "Full check-in sync complete"
        );
        Ok(records)
    }

    /// Fetch the last `count` pages up to the high-water mark.
    pub fn fetch_recent(&mut self, count: u64) -> Result<Vec<Record>, GateError> {
        let mut records = Vec::new();
        self.fetch_recent_each(count, |page| records.extend(page.records))?;
        Ok(records)
    }

    /// Fetch the last `count` pages, handing each page to `sink` as it
    /// arrives.
    ///
    /// Pages delivered before an error stay delivered. Returns the number
    /// of pages fetched.
    pub fn fetch_recent_each<F>(&mut self, count: u64, mut sink: F) -> Result<usize, GateError>
    where
        F: FnMut(Page),
    {
        let Some(window) = self.tail_window(count) else {
            return Ok(0);
        };

        let last = *window.end();
        let mut fetched = 0;
        for index in window {
            match self.fetch_page(index) {
                Ok(page) => sink(page),
                Err(e) => {
                    warn!(page = index, error = %e, "Tail resync aborted");
                    return Err(e);
                }
            }
            fetched += 1;
            if index < last {
                self.pause();
            }
        }
        Ok(fetched)
    }

    /// Page indices covered by a tail resync of `count` pages.
    pub fn tail_window(&self, count: u64) -> Option<RangeInclusive<u64>> {
        if count == 0 {
            return None;
        }
        let start = (self.high_water + 1).saturating_sub(count);
        Some(start..=self.high_water)
    }

    fn pause(&self) {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
    }

    /// Highest page index seen by the last completed full scan.
    pub fn high_water_mark(&self) -> u64 {
        self.high_water
    }

    /// The credential session.
    pub fn session(&self) -> &CredentialSession {
        &self.session
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::ScriptedTransport;
    use crate::protocol::models::ticket_id;

    const BASE_URL: &str = "https://api.example.com/checkins";

    fn client(transport: ScriptedTransport) -> PaginatedApiClient<ScriptedTransport> {
        let session = CredentialSession::new("token-1", "https://api.example.com/refresh", "rt");
        PaginatedApiClient::new(transport, session, BASE_URL, Duration::ZERO)
    }

    fn ids(records: &[Record]) -> Vec<&str> {
        records.iter().filter_map(ticket_id).collect()
    }

    #[test]
    fn test_page_url() {
        let api = client(ScriptedTransport::new());
        assert_eq!(api.page_url(3), format!("{}?pageIndex=3", BASE_URL));

        let session = CredentialSession::new("t", "https://api.example.com/refresh", "rt");
        let api = PaginatedApiClient::new(
            ScriptedTransport::new(),
            session,
            "https://api.example.com/checkins?eventId=9",
            Duration::ZERO,
        );
        assert_eq!(
            api.page_url(0),
            "https://api.example.com/checkins?eventId=9&pageIndex=0"
        );
    }

    #[test]
    fn test_fetch_all_follows_has_next() {
        let transport = ScriptedTransport::new();
        transport
            .push_page(&["A", "B"], true)
            .push_page(&["C"], true)
            .push_page(&["D"], false);

        let mut api = client(transport);
        let records = api.fetch_all().unwrap();

        assert_eq!(ids(&records), vec!["A", "B", "C", "D"]);
        assert_eq!(api.transport().get_count(), 3);
        assert_eq!(api.high_water_mark(), 2);

        let urls: Vec<String> = api.transport().requests().into_iter().map(|r| r.url).collect();
        assert_eq!(
            urls,
            vec![
                format!("{}?pageIndex=0", BASE_URL),
                format!("{}?pageIndex=1", BASE_URL),
                format!("{}?pageIndex=2", BASE_URL),
            ]
        );
    }

    #[test]
    fn test_fetch_all_single_page() {
        let transport = ScriptedTransport::new();
        transport.push_page(&["T1"], false);

        let mut api = client(transport);
        api.fetch_all().unwrap();
        assert_eq!(api.transport().get_count(), 1);
        assert_eq!(api.high_water_mark(), 0);
    }

    #[test]
    fn test_fetch_all_failure_keeps_high_water() {
        let transport = ScriptedTransport::new();
        transport
            .push_page(&["A"], true)
            .push_page(&["B"], false)
            .push_page(&["A"], true)
            .push_get(500, "boom");

        let mut api = client(transport);
        api.fetch_all().unwrap();
        assert_eq!(api.high_water_mark(), 1);

        let result = api.fetch_all();
        assert!(matches!(result, Err(GateError::UnexpectedStatus { status: 500 })));
        assert_eq!(api.high_water_mark(), 1);
    }

    #[test]
    fn test_single_401_refreshes_and_retries_once() {
        let transport = ScriptedTransport::new();
        transport
            .push_get(401, r#"{"error":"expired"}"#)
            .push_page(&["T1"], false)
            .push_post(200, r#"{"access_token":"token-2"}"#);

        let mut api = client(transport);
        let page = api.fetch_page(0).unwrap();

        assert_eq!(ids(&page.records), vec!["T1"]);
        assert_eq!(api.transport().post_count(), 1);
        assert_eq!(api.transport().get_count(), 2);
        assert_eq!(api.session().refresh_count(), 1);

        let auth: Vec<Option<String>> = api
            .transport()
            .requests()
            .into_iter()
            .filter(|r| r.method == "GET")
            .map(|r| r.authorization)
            .collect();
        assert_eq!(
            auth,
            vec![
                Some("Bearer token-1".to_string()),
                Some("Bearer token-2".to_string())
            ]
        );
    }

    #[test]
    fn test_double_401_fails_without_further_retry() {
        let transport = ScriptedTransport::new();
        transport
            .push_get(401, "")
            .push_get(401, "")
            .push_page(&["never"], false)
            .push_post(200, r#"{"access_token":"token-2"}"#)
            .push_post(200, r#"{"access_token":"token-3"}"#);

        let mut api = client(transport);
        let result = api.fetch_page(0);

        assert!(matches!(result, Err(GateError::AuthRejected { status: 401 })));
        assert_eq!(api.transport().get_count(), 2);
        assert_eq!(api.transport().post_count(), 1);
        assert_eq!(api.transport().pending_gets(), 1);
    }

    #[test]
    fn test_401_with_failed_refresh_is_not_retried() {
        let transport = ScriptedTransport::new();
        transport
            .push_get(401, "")
            .push_page(&["never"], false)
            .push_post(503, "");

        let mut api = client(transport);
        let result = api.fetch_page(0);

        assert!(matches!(result, Err(GateError::AuthRejected { status: 401 })));
        assert_eq!(api.transport().get_count(), 1);
        assert_eq!(api.session().refresh_count(), 0);
    }

    #[test]
    fn test_403_is_not_a_refresh_trigger() {
        let transport = ScriptedTransport::new();
        transport.push_get(403, "");

        let mut api = client(transport);
        let result = api.fetch_page(0);
        assert!(matches!(result, Err(GateError::UnexpectedStatus { status: 403 })));
        assert_eq!(api.transport().post_count(), 0);
    }

    #[test]
    fn test_malformed_page_is_protocol_error() {
        let transport = ScriptedTransport::new();
        transport.push_get(200, "<html>");

        let mut api = client(transport);
        assert!(matches!(api.fetch_page(0), Err(GateError::ProtocolError(_))));
    }

    #[test]
    fn test_fetch_recent_uses_explicit_window() {
        let transport = ScriptedTransport::new();
        for i in 0..5 {
            transport.push_page(&[], i < 4);
        }
        // Tail pages report no continuation; the window is fetched anyway.
        transport.push_page(&["X"], false).push_page(&["Y", "Z"], false);

        let mut api = client(transport);
        api.fetch_all().unwrap();
        assert_eq!(api.high_water_mark(), 4);

        let records = api.fetch_recent(2).unwrap();
        assert_eq!(ids(&records), vec!["X", "Y", "Z"]);

        let urls: Vec<String> = api.transport().requests().into_iter().map(|r| r.url).collect();
        assert_eq!(
            &urls[5..],
            &[
                format!("{}?pageIndex=3", BASE_URL),
                format!("{}?pageIndex=4", BASE_URL)
            ]
        );
    }

    #[test]
    fn test_tail_window_clamps_at_zero() {
        let api = client(ScriptedTransport::new());
        assert_eq!(api.tail_window(2), Some(0..=0));
        assert_eq!(api.tail_window(0), None);
    }

    #[test]
    fn test_tail_resync_pauses_only_between_pages() {
        let delay = Duration::from_millis(300);
        let transport = ScriptedTransport::new();
        transport
            .push_page(&[], true)
            .push_page(&[], false)
            .push_page(&["A"], false)
            .push_page(&["B"], false)
            .push_page(&["C"], false);

        let session = CredentialSession::new("token-1", "https://api.example.com/refresh", "rt");
        let mut api = PaginatedApiClient::new(transport, session, BASE_URL, delay);
        api.fetch_all().unwrap();

        let started = std::time::Instant::now();
        assert_eq!(ids(&api.fetch_recent(2).unwrap()), vec!["A", "B"]);
        let elapsed = started.elapsed();
        assert!(elapsed >= delay, "two pages: {:?}", elapsed);
        assert!(elapsed < delay * 2, "two pages: {:?}", elapsed);

        let started = std::time::Instant::now();
        assert_eq!(ids(&api.fetch_recent(1).unwrap()), vec!["C"]);
        assert!(started.elapsed() < delay, "one page: {:?}", started.elapsed());
    }

    #[test]
    fn test_fetch_recent_each_keeps_pages_before_failure() {
        let transport = ScriptedTransport::new();
        transport
            .push_page(&[], true)
            .push_page(&[], true)
            .push_page(&[], false)
            .push_page(&["EARLY"], false)
            .push_get_error("connection reset");

        let mut api = client(transport);
        api.fetch_all().unwrap();

        let mut seen = Vec::new();
        let result = api.fetch_recent_each(2, |page| {
            seen.extend(page.records.iter().filter_map(ticket_id).map(String::from))
        });

        assert!(matches!(result, Err(GateError::Transport(_))));
        assert_eq!(seen, vec!["EARLY".to_string()]);
    }
}
