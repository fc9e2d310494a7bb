//! # Connection State Record
//!
//! Pure per-connection data tracked by the ingestion gateway. One record is
//! created when a WebSocket connection is accepted and retained after the
//! connection closes so the stats endpoint can report on recent sessions.
//!
//! ## Invariants:
//! - `total_bytes` and `frames_received` only ever grow, and only binary
//!   frame handling touches them
//! - `closed` flips false → true exactly once; no field changes afterwards
//! - `last_message_at` is always at or after `started_at` once set

use chrono::{DateTime, Utc};
use serde::Serialize;

/// State of a single ingestion connection, active or recently closed.
///
/// Serialized verbatim by the stats endpoint, so field names are part of the
/// client-facing contract.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionRecord {
    /// Total binary payload bytes received on this connection
    pub total_bytes: u64,

    /// Number of binary frames received
    pub frames_received: u64,

    /// Last successfully parsed `init` control payload, replaced (not merged)
    /// each time the client sends a new one
    pub init: Option<serde_json::Value>,

    /// When the connection was accepted
    pub started_at: DateTime<Utc>,

    /// When the most recent message (of any kind) arrived
    pub last_message_at: Option<DateTime<Utc>>,

    /// Whether the connection has terminated
    pub closed: bool,

    /// Why the connection terminated ("disconnect", "error:..."), set once
    pub close_reason: Option<String>,

    /// Peer address as "host:port", or "unknown" if unavailable
    pub remote: String,
}

impl ConnectionRecord {
    /// Create a fresh record with zeroed counters for a just-accepted connection.
    pub fn new(remote: String) -> Self {
        Self {
            total_bytes: 0,
            frames_received: 0,
            init: None,
            started_at: Utc::now(),
            last_message_at: None,
            closed: false,
            close_reason: None,
            remote,
        }
    }

    /// Record that a message arrived now.
    pub fn touch(&mut self) {
        self.last_message_at = Some(Utc::now());
    }
}
