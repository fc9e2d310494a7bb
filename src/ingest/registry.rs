//! # Connection Registry
//!
//! The shared, concurrency-safe store of per-connection state records. This
//! is the only state shared across connection tasks: each WebSocket actor
//! mutates its own record through the registry, and the stats endpoint reads
//! a full snapshot at any time.
//!
//! ## Thread Safety:
//! Uses the `Arc<RwLock<HashMap>>` pattern. Every mutation happens inside a
//! single write-lock critical section, so a concurrent `snapshot()` either
//! sees a record entirely before or entirely after a mutation, never halfway
//! through. Per-record writes come only from the owning connection's task;
//! the lock exists to keep snapshots consistent and the map itself intact.
//!
//! Records are never evicted. Closed connections stay visible to the stats
//! endpoint for the lifetime of the process.

use crate::ingest::record::ConnectionRecord;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Concurrent mapping from connection id to its state record.
///
/// Cheap to clone; all clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<RwLock<HashMap<String, ConnectionRecord>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh record for a newly accepted connection.
    ///
    /// Connection ids are freshly generated UUIDs, so a duplicate id means a
    /// bug in the caller, not a runtime condition to recover from.
    pub fn create(&self, id: &str, remote: String) {
        let mut connections = self.connections.write().unwrap();
        let previous = connections.insert(id.to_string(), ConnectionRecord::new(remote));
        assert!(previous.is_none(), "duplicate connection id: {id}");
        info!(conn_id = %id, "connection registered");
    }

    /// Apply `f` to the record for `id`, atomically with respect to
    /// concurrent snapshots. Returns `None` if the id is unknown.
    pub fn mutate<R>(&self, id: &str, f: impl FnOnce(&mut ConnectionRecord) -> R) -> Option<R> {
        let mut connections = self.connections.write().unwrap();
        connections.get_mut(id).map(f)
    }

    /// Mark a connection closed with the given reason.
    ///
    /// Idempotent: once a record is closed the first reason sticks and later
    /// calls are no-ops, which keeps the close-exactly-once invariant even
    /// when both an error path and the actor's stop path report termination.
    pub fn close(&self, id: &str, reason: &str) {
        self.mutate(id, |record| {
            if !record.closed {
                record.closed = true;
                record.close_reason = Some(reason.to_string());
                info!(conn_id = %id, reason = %reason, "connection closed");
            }
        });
    }

    /// Return a consistent copy of every record, including closed ones.
    pub fn snapshot(&self) -> HashMap<String, ConnectionRecord> {
        self.connections.read().unwrap().clone()
    }

    /// Number of records currently open (accepting messages).
    pub fn open_count(&self) -> usize {
        self.connections
            .read()
            .unwrap()
            .values()
            .filter(|record| !record.closed)
            .count()
    }

    /// Total number of records, open and closed.
    pub fn total_count(&self) -> usize {
        self.connections.read().unwrap().len()
    }
}
