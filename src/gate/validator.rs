//! Ticket validation against the local cache with tail resync on miss.
//!
//! Each lookup walks a small state machine:
//!
//! ```text
//! CHECK_CACHE --hit--> ALLOW
//!     |miss
//!     v
//! RESYNC_TAIL --no new ids / fetch error--> DENY
//!     |new ids
//!     v
//! RECHECK_CACHE --hit--> ALLOW
//!     |miss
//!     v
//!    DENY
//! ```
//!
//! Fetch errors never escape a lookup; they end in DENY.

use crate::cache::admission::AdmissionCache;
use crate::cache::misses::MissCache;
use crate::cache::snapshot::SnapshotFile;
use crate::client::http::HttpTransport;
use crate::client::pager::PaginatedApiClient;
use crate::clock::{Clock, SystemClock};
use crate::GateError;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where a decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionSource {
    /// Found in the cache without any network traffic.
    Cache,
    /// Decided after a completed tail resync that added `new_ids` ids.
    Resync {
        /// Ids added to the cache by the resync.
        new_ids: usize,
    },
    /// Denied because the code was unknown after a recent resync.
    RecentMiss,
    /// Denied because the tail resync failed.
    ResyncFailed,
}

/// Outcome of one lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateDecision {
    /// Whether the gate should open.
    pub allowed: bool,

    /// How the decision was reached.
    pub source: DecisionSource,
}

impl GateDecision {
    fn allow(source: DecisionSource) -> Self {
        Self {
            allowed: true,
            source,
        }
    }

    fn deny(source: DecisionSource) -> Self {
        Self {
            allowed: false,
            source,
        }
    }
}

/// Summary of a full sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    /// Pages fetched.
    pub pages: u64,

    /// Records received.
    pub entries: usize,

    /// Distinct ticket ids now known.
    pub ticket_ids: usize,
}

enum LookupState {
    CheckCache,
    ResyncTail,
    RecheckCache { new_ids: usize },
    Done(GateDecision),
}

/// Decides whether a scanned code is admissible.
pub struct GateValidator<T: HttpTransport> {
    client: PaginatedApiClient<T>,
    cache: AdmissionCache,
    misses: MissCache,
    clock: Arc<dyn Clock>,
    tail_pages: u64,
    snapshot: Option<SnapshotFile>,
}

impl<T: HttpTransport> GateValidator<T> {
    /// Create a validator resyncing `tail_pages` pages on a miss.
    pub fn new(client: PaginatedApiClient<T>, tail_pages: u64) -> Self {
        Self {
            client,
            cache: AdmissionCache::new(),
            misses: MissCache::new(Duration::ZERO),
            clock: Arc::new(SystemClock),
            tail_pages,
            snapshot: None,
        }
    }

    /// Write each full sync to `snapshot`.
    pub fn with_snapshot(mut self, snapshot: SnapshotFile) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    /// Deny codes that stayed unknown after a resync for `ttl`, without
    /// resyncing again.
    pub fn with_miss_ttl(mut self, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        self.misses = MissCache::new(ttl);
        self.clock = clock;
        self
    }

    /// Fetch every page and replace the cache with its contents.
    ///
    /// A snapshot write failure is logged and otherwise ignored.
    pub fn initial_sync(&mut self) -> Result<SyncReport, GateError> {
        let records = self.client.fetch_all()?;
        self.cache.rebuild(&records);

        if let Some(snapshot) = &self.snapshot {
            match snapshot.save(&records) {
                Ok(()) => debug!(path = %snapshot.path().display(), "Snapshot written"),
                Err(e) => warn!(error = %e, "Could not write snapshot"),
            }
        }

        let report = SyncReport {
            pages: self.client.high_water_mark() + 1,
            entries: records.len(),
            ticket_ids: self.cache.len(),
        };
        info!(
            pages = report.pages,
            entries = report.entries,
            ticket_ids = report.ticket_ids,
            "Admission cache loaded"
        );
        Ok(report)
    }

    /// Whether `code` should be admitted.
    pub fn is_valid(&mut self, code: &str) -> bool {
        self.decide(code).allowed
    }

    /// Run one lookup and report how it was decided.
    pub fn decide(&mut self, code: &str) -> GateDecision {
        let mut state = LookupState::CheckCache;
        loop {
            state = match state {
                LookupState::CheckCache => {
                    if self.cache.contains(code) {
                        LookupState::Done(GateDecision::allow(DecisionSource::Cache))
                    } else if self.misses.is_fresh(code, self.clock.as_ref()) {
                        LookupState::Done(GateDecision::deny(DecisionSource::RecentMiss))
                    } else {
                        LookupState::ResyncTail
                    }
                }
                LookupState::ResyncTail => match self.resync_tail() {
                    Err(e) => {
                        warn!(error = %e, "Tail resync failed, denying");
                        LookupState::Done(GateDecision::deny(DecisionSource::ResyncFailed))
                    }
                    Ok(0) => {
                        self.misses.record(code, self.clock.as_ref());
                        LookupState::Done(GateDecision::deny(DecisionSource::Resync {
                            new_ids: 0,
                        }))
                    }
                    Ok(new_ids) => LookupState::RecheckCache { new_ids },
                },
                LookupState::RecheckCache { new_ids } => {
                    let source = DecisionSource::Resync { new_ids };
                    if self.cache.contains(code) {
                        self.misses.forget(code);
                        LookupState::Done(GateDecision::allow(source))
                    } else {
                        self.misses.record(code, self.clock.as_ref());
                        LookupState::Done(GateDecision::deny(source))
                    }
                }
                LookupState::Done(decision) => return decision,
            };
        }
    }

    /// Fetch the tail window, merging each page as it arrives.
    fn resync_tail(&mut self) -> Result<usize, GateError> {
        let mut new_ids = 0;
        let cache = &mut self.cache;
        let pages = self
            .client
            .fetch_recent_each(self.tail_pages, |page| new_ids += cache.merge(&page.records))?;
        debug!(pages, new_ids, "Tail resync complete");
        Ok(new_ids)
    }

    /// The admission cache.
    pub fn cache(&self) -> &AdmissionCache {
        &self.cache
    }

    /// The API client.
    pub fn client(&self) -> &PaginatedApiClient<T> {
        &self.client
    }
}
