//! Read-only projection of the connection registry.
//!
//! `GET /ws/ingest/stats` returns every connection record — open and closed —
//! keyed by connection id. Pure read: safe to call at any time, concurrently
//! with any number of in-flight ingestion actors.

use crate::state::AppState;
use actix_web::{web, HttpResponse};

pub async fn ingest_stats(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.registry().snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use actix_web::body::to_bytes;

    #[actix_rt::test]
    async fn test_stats_returns_full_snapshot() {
        let state = AppState::new(AppConfig::default());
        state.registry().create("open-conn", "10.0.0.1:5000".to_string());
        state.registry().create("done-conn", "unknown".to_string());
        state.registry().mutate("done-conn", |record| {
            record.total_bytes = 45_000;
            record.frames_received = 45;
        });
        state.registry().close("done-conn", "disconnect");

        let response = ingest_stats(web::Data::new(state)).await;
        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["open-conn"]["remote"], "10.0.0.1:5000");
        assert_eq!(json["open-conn"]["closed"], false);

        // Closed records stay visible for post-mortem inspection.
        assert_eq!(json["done-conn"]["total_bytes"], 45_000);
        assert_eq!(json["done-conn"]["frames_received"], 45);
        assert_eq!(json["done-conn"]["closed"], true);
        assert_eq!(json["done-conn"]["close_reason"], "disconnect");
    }
}
