//! # Application State Management
//!
//! Shared state injected into every HTTP handler and WebSocket actor. The
//! connection registry is owned here (not a process global) so the ingestion
//! handler and the stats endpoint can be wired against the same instance in
//! tests without any ambient state.
//!
//! ## Thread Safety:
//! `AppState` is cloned per worker; all clones share the same underlying
//! config lock, registry, and store. The config uses the `Arc<RwLock<T>>`
//! pattern: many readers or one writer, with `clone()` releasing the lock
//! immediately.

use crate::config::AppConfig;
use crate::ingest::registry::ConnectionRegistry;
use crate::storage::{InMemoryMeetingStore, MeetingStore};
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// State shared across all request handlers and connection actors.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration (updatable at runtime via PUT /config)
    config: Arc<RwLock<AppConfig>>,

    /// Per-connection ingestion records
    registry: ConnectionRegistry,

    /// Persistence seam for meetings/utterances
    store: Arc<dyn MeetingStore>,

    /// When the server started
    start_time: Instant,
}

impl AppState {
    /// Create state with the default in-memory meeting store.
    pub fn new(config: AppConfig) -> Self {
        Self::with_store(config, Arc::new(InMemoryMeetingStore::new()))
    }

    /// Create state with an explicit store implementation.
    pub fn with_store(config: AppConfig, store: Arc<dyn MeetingStore>) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            registry: ConnectionRegistry::new(),
            store,
            start_time: Instant::now(),
        }
    }

    /// Get a copy of the current configuration.
    pub fn get_config(&self) -> AppConfig {
        self.config.read().unwrap().clone()
    }

    /// Replace the configuration after validating it.
    pub fn update_config(&self, new_config: AppConfig) -> Result<(), String> {
        match new_config.validate() {
            Ok(_) => {
                *self.config.write().unwrap() = new_config;
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        }
    }

    /// The shared connection registry.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// The meeting store handle.
    pub fn store(&self) -> &Arc<dyn MeetingStore> {
        &self.store
    }

    /// Server uptime in seconds.
    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_shares_registry_across_clones() {
        let state = AppState::new(AppConfig::default());
        let clone = state.clone();

        state.registry().create("conn", "unknown".to_string());
        assert_eq!(clone.registry().total_count(), 1);
    }

    #[test]
    fn test_update_config_validates() {
        let state = AppState::new(AppConfig::default());

        let mut bad = AppConfig::default();
        bad.server.port = 0;
        assert!(state.update_config(bad).is_err());

        let mut good = AppConfig::default();
        good.server.port = 9000;
        assert!(state.update_config(good).is_ok());
        assert_eq!(state.get_config().server.port, 9000);
    }
}
