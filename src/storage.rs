//! # Meeting Store
//!
//! The narrow persistence contract the gateway depends on: create a meeting,
//! append an utterance to it, and answer a readiness ping. Real transcription
//! output would flow through this seam; the gateway itself never interprets
//! audio, so the contract stays deliberately small.
//!
//! `MeetingStore` is a trait so the HTTP layer and tests can run against the
//! in-memory implementation, while a relational backend (the `database.url`
//! config field) can be dropped in without touching callers.

use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// A recorded meeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    pub id: Uuid,
    pub title: String,
    pub meet_url: Option<String>,
    pub start_ts: DateTime<Utc>,
    pub end_ts: Option<DateTime<Utc>>,
}

/// Fields supplied by the caller when appending an utterance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUtterance {
    pub speaker_label: Option<String>,
    /// Millisecond offsets on the meeting timeline
    pub start_time_ms: i64,
    pub end_time_ms: i64,
    pub text: String,
    pub lang: Option<String>,
    /// Streaming results may be revised until marked final
    pub is_final: bool,
}

/// A stored utterance, keyed to its meeting.
#[derive(Debug, Clone, Serialize)]
pub struct Utterance {
    pub id: Uuid,
    pub meeting_id: Uuid,
    pub speaker_label: Option<String>,
    pub start_time_ms: i64,
    pub end_time_ms: i64,
    pub text: String,
    pub lang: Option<String>,
    pub is_final: bool,
    pub created_at: DateTime<Utc>,
}

/// Persistence seam for meeting and utterance entities.
#[async_trait]
pub trait MeetingStore: Send + Sync {
    /// Create a meeting and return it with its generated id.
    async fn create_meeting(&self, title: &str, meet_url: Option<&str>)
        -> Result<Meeting, AppError>;

    /// Append one utterance to an existing meeting.
    async fn append_utterance(
        &self,
        meeting_id: Uuid,
        utterance: NewUtterance,
    ) -> Result<Utterance, AppError>;

    /// Verify the store is reachable (readiness probe).
    async fn ping(&self) -> Result<(), AppError>;
}

/// In-memory store used by default wiring and tests.
#[derive(Default)]
pub struct InMemoryMeetingStore {
    meetings: RwLock<HashMap<Uuid, Meeting>>,
    utterances: RwLock<HashMap<Uuid, Vec<Utterance>>>,
}

impl InMemoryMeetingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All utterances appended to a meeting, in append order.
    pub fn utterances_for(&self, meeting_id: Uuid) -> Vec<Utterance> {
        self.utterances
            .read()
            .unwrap()
            .get(&meeting_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl MeetingStore for InMemoryMeetingStore {
    async fn create_meeting(
        &self,
        title: &str,
        meet_url: Option<&str>,
    ) -> Result<Meeting, AppError> {
        let meeting = Meeting {
            id: Uuid::new_v4(),
            title: title.to_string(),
            meet_url: meet_url.map(str::to_string),
            start_ts: Utc::now(),
            end_ts: None,
        };
        self.meetings
            .write()
            .unwrap()
            .insert(meeting.id, meeting.clone());
        Ok(meeting)
    }

    async fn append_utterance(
        &self,
        meeting_id: Uuid,
        utterance: NewUtterance,
    ) -> Result<Utterance, AppError> {
        if !self.meetings.read().unwrap().contains_key(&meeting_id) {
            return Err(AppError::NotFound(format!("meeting {meeting_id}")));
        }

        let stored = Utterance {
            id: Uuid::new_v4(),
            meeting_id,
            speaker_label: utterance.speaker_label,
            start_time_ms: utterance.start_time_ms,
            end_time_ms: utterance.end_time_ms,
            text: utterance.text,
            lang: utterance.lang,
            is_final: utterance.is_final,
            created_at: Utc::now(),
        };
        self.utterances
            .write()
            .unwrap()
            .entry(meeting_id)
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}
