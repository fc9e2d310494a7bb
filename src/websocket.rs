//! # WebSocket Audio Ingestion Handler
//!
//! Accepts long-lived WebSocket connections at `/ws/ingest` carrying an
//! interleaved stream of JSON control messages and opaque binary audio
//! frames (e.g. `audio/webm;codecs=opus` chunks from MediaRecorder).
//!
//! ## Protocol:
//! 1. **Connection**: server immediately sends `ingest:connected`
//! 2. **Control**: text frames are parsed as JSON; `{"type":"init",...}` is
//!    stored as the connection's init payload and acked with `ingest:init:ok`;
//!    other JSON gets `ingest:unknown_text`, non-JSON gets
//!    `ingest:text_non_json`
//! 3. **Audio**: binary frames are counted byte-exact and optionally dumped
//!    to the frame sink; every 20th frame is acked with `ingest:frames=<N>`
//! 4. **Termination**: disconnects, peer-closed transport errors and
//!    unexpected faults all mark the record closed exactly once and never
//!    escape this connection's actor
//!
//! Control and binary messages may interleave in any order; there is no
//! awaiting-init gate.

use crate::ingest::registry::ConnectionRegistry;
use crate::ingest::sink::{FileFrameSink, FrameSink};
use crate::state::AppState;

use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use actix_web_actors::ws;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Sent once, unsolicited, when the session goes live.
pub const ACK_CONNECTED: &str = "ingest:connected";

/// Sent after a well-formed init control message.
pub const ACK_INIT_OK: &str = "ingest:init:ok";

/// Sent after valid JSON whose `type` is absent or not `"init"`.
pub const ACK_UNKNOWN_TEXT: &str = "ingest:unknown_text";

/// Sent after a text message that fails to parse as JSON.
pub const ACK_TEXT_NON_JSON: &str = "ingest:text_non_json";

/// WebSocket actor owning one ingestion connection.
///
/// Each connection gets its own actor, so receive/send on the transport is
/// never shared. All record mutation goes through the registry, which is the
/// only state shared with other connections.
pub struct IngestWebSocket {
    /// Process-unique id for this connection, never reused
    conn_id: String,

    /// Peer address as "host:port", or "unknown"
    remote: String,

    /// Shared registry of connection records
    registry: ConnectionRegistry,

    /// Optional raw-frame dump; failures are logged and ignored
    sink: Option<Arc<dyn FrameSink>>,

    /// Ack every Nth binary frame
    frame_ack_interval: u64,
}

impl IngestWebSocket {
    pub fn new(
        conn_id: String,
        remote: String,
        registry: ConnectionRegistry,
        sink: Option<Arc<dyn FrameSink>>,
        frame_ack_interval: u64,
    ) -> Self {
        Self {
            conn_id,
            remote,
            registry,
            sink,
            frame_ack_interval,
        }
    }

    /// Classify a text control message, update the record, and return the
    /// acknowledgement token to send.
    ///
    /// Malformed payloads are a recoverable protocol error: the connection
    /// keeps running and only `last_message_at` changes.
    fn handle_text(&self, text: &str) -> &'static str {
        match serde_json::from_str::<serde_json::Value>(text) {
            Ok(payload) => {
                let is_init = payload.get("type").and_then(|v| v.as_str()) == Some("init");
                self.registry.mutate(&self.conn_id, |record| {
                    if record.closed {
                        return;
                    }
                    record.touch();
                    if is_init {
                        // Replace, not merge.
                        record.init = Some(payload);
                    }
                });
                if is_init {
                    ACK_INIT_OK
                } else {
                    ACK_UNKNOWN_TEXT
                }
            }
            Err(_) => {
                self.registry.mutate(&self.conn_id, |record| {
                    if !record.closed {
                        record.touch();
                    }
                });
                ACK_TEXT_NON_JSON
            }
        }
    }

    /// Account one binary frame and return the periodic acknowledgement if
    /// this frame completes an ack interval.
    fn handle_binary(&self, chunk: &[u8]) -> Option<String> {
        let frames_received = self
            .registry
            .mutate(&self.conn_id, |record| {
                if record.closed {
                    return None;
                }
                record.touch();
                record.total_bytes += chunk.len() as u64;
                record.frames_received += 1;
                Some(record.frames_received)
            })
            .flatten()?;

        // Best-effort side channel; never terminates the connection.
        if let Some(sink) = &self.sink {
            if let Err(err) = sink.append(chunk) {
                warn!(conn_id = %self.conn_id, error = %err, "frame dump write failed");
            }
        }

        if frames_received % self.frame_ack_interval == 0 {
            Some(format!("ingest:frames={frames_received}"))
        } else {
            None
        }
    }

    /// Mark this connection closed. First reason wins; safe to call from
    /// multiple termination paths.
    fn close_with(&self, reason: &str) {
        self.registry.close(&self.conn_id, reason);
    }
}

impl Actor for IngestWebSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.registry.create(&self.conn_id, self.remote.clone());
        info!(conn_id = %self.conn_id, remote = %self.remote, "ingest connection open");
        ctx.text(ACK_CONNECTED);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        // Runs on every teardown path, including ones that never deliver a
        // Close frame. The registry keeps the first close reason if one was
        // already recorded.
        self.close_with("disconnect");
        info!(conn_id = %self.conn_id, "ingest connection stopped");
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for IngestWebSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => {
                let ack = self.handle_text(&text);
                ctx.text(ack);
            }
            Ok(ws::Message::Binary(chunk)) => {
                if let Some(ack) = self.handle_binary(&chunk) {
                    ctx.text(ack);
                }
            }
            Ok(ws::Message::Ping(data)) => {
                ctx.pong(&data);
            }
            Ok(ws::Message::Pong(_)) => {}
            Ok(ws::Message::Close(reason)) => {
                info!(conn_id = %self.conn_id, ?reason, "client disconnected");
                self.close_with("disconnect");
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) => {
                warn!(conn_id = %self.conn_id, "unexpected continuation frame");
            }
            Ok(ws::Message::Nop) => {}
            Err(ws::ProtocolError::Io(err)) => {
                // The peer went away mid-read; expected, same outcome as a
                // clean close and not logged as an error.
                info!(conn_id = %self.conn_id, error = %err, "transport closed by peer");
                self.close_with("disconnect");
                ctx.stop();
            }
            Err(err) => {
                error!(conn_id = %self.conn_id, error = %err, "websocket protocol error");
                self.close_with(&format!("error:{err}"));
                ctx.stop();
            }
        }
    }
}

/// WebSocket endpoint handler for `GET /ws/ingest`.
///
/// Upgrades the HTTP request and hands the connection to a fresh
/// [`IngestWebSocket`] actor.
pub async fn ws_ingest(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    let remote = req
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let conn_id = Uuid::new_v4().to_string();
    let config = state.get_config();

    let sink: Option<Arc<dyn FrameSink>> = config
        .ingest
        .dump_path
        .as_ref()
        .map(|path| Arc::new(FileFrameSink::new(path)) as Arc<dyn FrameSink>);

    let websocket = IngestWebSocket::new(
        conn_id,
        remote,
        state.registry().clone(),
        sink,
        config.ingest.frame_ack_interval,
    );

    ws::start(websocket, &req, stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::sink::testing::{FailingSink, RecordingSink};

    fn handler_with_sink(sink: Option<Arc<dyn FrameSink>>) -> IngestWebSocket {
        let registry = ConnectionRegistry::new();
        registry.create("test-conn", "127.0.0.1:4000".to_string());
        IngestWebSocket::new(
            "test-conn".to_string(),
            "127.0.0.1:4000".to_string(),
            registry,
            sink,
            20,
        )
    }

    fn handler() -> IngestWebSocket {
        handler_with_sink(None)
    }

    #[test]
    fn test_init_message_stored_and_acked() {
        let ws = handler();
        let ack =
            ws.handle_text(r#"{"type":"init","format":"audio/webm;codecs=opus","timeslice_ms":500}"#);
        assert_eq!(ack, ACK_INIT_OK);

        let record = &ws.registry.snapshot()["test-conn"];
        let init = record.init.as_ref().unwrap();
        assert_eq!(init["format"], "audio/webm;codecs=opus");
        assert_eq!(init["timeslice_ms"], 500);
        assert!(record.last_message_at.is_some());
    }

    #[test]
    fn test_second_init_replaces_not_merges() {
        let ws = handler();
        ws.handle_text(r#"{"type":"init","format":"audio/webm","timeslice_ms":500}"#);
        ws.handle_text(r#"{"type":"init","format":"audio/ogg"}"#);

        let record = &ws.registry.snapshot()["test-conn"];
        let init = record.init.as_ref().unwrap();
        assert_eq!(init["format"], "audio/ogg");
        // A merge would have kept timeslice_ms from the first init.
        assert!(init.get("timeslice_ms").is_none());
    }

    #[test]
    fn test_unknown_json_only_touches_record() {
        let ws = handler();
        let ack = ws.handle_text(r#"{"type":"ping"}"#);
        assert_eq!(ack, ACK_UNKNOWN_TEXT);

        let record = &ws.registry.snapshot()["test-conn"];
        assert!(record.init.is_none());
        assert_eq!(record.total_bytes, 0);
        assert!(record.last_message_at.is_some());
    }

    #[test]
    fn test_non_json_text_only_touches_record() {
        let ws = handler();
        let ack = ws.handle_text("not json at all");
        assert_eq!(ack, ACK_TEXT_NON_JSON);

        let record = &ws.registry.snapshot()["test-conn"];
        assert!(record.init.is_none());
        assert_eq!(record.total_bytes, 0);
        assert_eq!(record.frames_received, 0);
        assert!(record.last_message_at.is_some());
    }

    #[test]
    fn test_binary_frames_counted_byte_exact() {
        let ws = handler();
        ws.handle_binary(&[0u8; 300]);
        ws.handle_binary(&[0u8; 17]);
        ws.handle_binary(&[0u8; 1]);

        let record = &ws.registry.snapshot()["test-conn"];
        assert_eq!(record.total_bytes, 318);
        assert_eq!(record.frames_received, 3);
    }

    #[test]
    fn test_frame_ack_every_twentieth_frame() {
        let ws = handler();
        let mut acks = Vec::new();
        for _ in 0..45 {
            if let Some(ack) = ws.handle_binary(&[0u8; 10]) {
                acks.push(ack);
            }
        }
        assert_eq!(acks, vec!["ingest:frames=20", "ingest:frames=40"]);
    }

    #[test]
    fn test_sink_receives_every_frame() {
        let sink = Arc::new(RecordingSink::default());
        let ws = handler_with_sink(Some(sink.clone()));
        ws.handle_binary(b"frame-a");
        ws.handle_binary(b"frame-b");

        let chunks = sink.chunks.lock().unwrap();
        assert_eq!(chunks.as_slice(), &[b"frame-a".to_vec(), b"frame-b".to_vec()]);
    }

    #[test]
    fn test_sink_failure_does_not_affect_counters() {
        let ws = handler_with_sink(Some(Arc::new(FailingSink)));
        ws.handle_binary(&[0u8; 100]);
        ws.handle_binary(&[0u8; 100]);

        let record = &ws.registry.snapshot()["test-conn"];
        assert_eq!(record.total_bytes, 200);
        assert_eq!(record.frames_received, 2);
    }

    #[test]
    fn test_no_mutation_after_close() {
        let ws = handler();
        ws.handle_binary(&[0u8; 50]);
        ws.close_with("disconnect");

        // Stray messages after termination must not change anything.
        ws.handle_binary(&[0u8; 50]);
        ws.handle_text(r#"{"type":"init","format":"audio/webm"}"#);

        let record = &ws.registry.snapshot()["test-conn"];
        assert!(record.closed);
        assert_eq!(record.close_reason.as_deref(), Some("disconnect"));
        assert_eq!(record.total_bytes, 50);
        assert_eq!(record.frames_received, 1);
        assert!(record.init.is_none());
    }

    #[test]
    fn test_error_reason_survives_later_disconnect() {
        let ws = handler();
        ws.close_with("error:frame too large");
        // stopped() always reports "disconnect"; the first reason must stick.
        ws.close_with("disconnect");

        let record = &ws.registry.snapshot()["test-conn"];
        assert_eq!(record.close_reason.as_deref(), Some("error:frame too large"));
    }

    /// End-to-end accounting: init, 45 frames of 1000 bytes, disconnect.
    #[test]
    fn test_full_session_scenario() {
        let ws = handler();
        assert_eq!(
            ws.handle_text(r#"{"type":"init","format":"audio/webm;codecs=opus"}"#),
            ACK_INIT_OK
        );

        let mut frame_acks = Vec::new();
        for _ in 0..45 {
            if let Some(ack) = ws.handle_binary(&[7u8; 1000]) {
                frame_acks.push(ack);
            }
        }
        ws.close_with("disconnect");

        let record = &ws.registry.snapshot()["test-conn"];
        assert_eq!(record.total_bytes, 45_000);
        assert_eq!(record.frames_received, 45);
        assert_eq!(
            record.init.as_ref().unwrap()["format"],
            "audio/webm;codecs=opus"
        );
        assert_eq!(frame_acks, vec!["ingest:frames=20", "ingest:frames=40"]);
        assert!(record.closed);
        assert_eq!(record.close_reason.as_deref(), Some("disconnect"));
    }
}
