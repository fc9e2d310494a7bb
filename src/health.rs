use crate::error::AppResult;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

/// Liveness summary: service info, uptime, and connection counts.
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let config = state.get_config();
    let registry = state.registry();

    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.get_uptime_seconds(),
        "service": {
            "name": "meeting-ingest-backend",
            "version": env!("CARGO_PKG_VERSION"),
            "host": config.server.host,
            "port": config.server.port
        },
        "connections": {
            "open": registry.open_count(),
            "total": registry.total_count()
        }
    }))
}

/// Readiness probe: verifies the API is up and the meeting store is reachable.
pub async fn readiness(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    state.store().ping().await?;
    Ok(HttpResponse::Ok().json(json!({ "status": "ok" })))
}
