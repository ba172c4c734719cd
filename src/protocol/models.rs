//! Check-in API response structs and ticket id extraction.

use crate::GateError;
use serde::Deserialize;
use serde_json::Value;

/// A single check-in entry.
///
/// Records are kept opaque: only `relationships.ticket.id` is read, and the
/// raw value is what ends up in the snapshot file.
pub type Record = Value;

/// Raw page envelope returned by the check-in endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEnvelope {
    /// Entries on this page.
    #[serde(default)]
    pub check_in_entries: Vec<Record>,

    /// Pagination metadata.
    #[serde(default)]
    pub meta: PageMeta,
}

/// Pagination metadata.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    /// Whether another page follows this one.
    #[serde(default)]
    pub has_next: bool,
}

/// One fetched page, tagged with the index it was requested at.
#[derive(Debug, Clone)]
pub struct Page {
    /// Page index as requested.
    pub index: u64,

    /// Entries on this page, in API order.
    pub records: Vec<Record>,

    /// Whether another page follows this one.
    pub has_next: bool,
}

impl Page {
    /// Attach the requested index to a parsed envelope.
    pub fn from_envelope(index: u64, envelope: PageEnvelope) -> Self {
        Self {
            index,
            records: envelope.check_in_entries,
            has_next: envelope.meta.has_next,
        }
    }
}

/// Parse a raw JSON body into a page envelope.
pub fn parse_page(body: &[u8]) -> Result<PageEnvelope, GateError> {
    serde_json::from_slice(body)
        .map_err(|e| GateError::ProtocolError(format!("Failed to parse page: {}", e)))
}

/// Pull the ticket id out of a check-in record.
///
/// Returns `None` when the record has no `relationships.ticket.id`, or
/// when that id is not a non-empty string.
pub fn ticket_id(record: &Record) -> Option<&str> {
    record
        .get("relationships")?
        .get("ticket")?
        .get("id")?
        .as_str()
        .filter(|id| !id.is_empty())
}
