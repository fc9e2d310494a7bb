//! # Audio Ingestion Module
//!
//! Core state for the WebSocket ingestion gateway.
//!
//! ## Key Components:
//! - **Connection Record**: per-connection counters and metadata
//! - **Connection Registry**: concurrency-safe store of all records,
//!   shared between the WebSocket actors and the stats endpoint
//! - **Frame Sink**: optional best-effort dump of raw binary frames
//!
//! The WebSocket protocol handler itself lives in `src/websocket.rs` at the
//! crate root.

pub mod record;
pub mod registry;
pub mod sink;
