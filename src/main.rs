//! # Meeting Ingest Backend - Main Application Entry Point
//!
//! Actix-web server for the real-time audio ingestion gateway.
//!
//! ## Application Architecture:
//! - **config**: configuration loading (TOML file + environment variables)
//! - **state**: shared application state (config, connection registry, store)
//! - **ingest**: connection records, registry, and the optional frame sink
//! - **websocket**: the per-connection ingestion protocol handler
//! - **handlers**: stats and config HTTP endpoints
//! - **health**: liveness and readiness probes
//! - **storage**: the meeting/utterance persistence seam
//! - **error**: error types and their HTTP responses
//! - **middleware**: request logging

mod config;
mod error;
mod handlers;
mod health;
mod ingest;
mod middleware;
mod state;
mod storage;
mod websocket;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Result;
use config::AppConfig;
use state::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Set by the signal handler task; polled for graceful shutdown.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting meeting-ingest-backend v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);
    if let Some(dump_path) = &config.ingest.dump_path {
        info!("Raw frame dump enabled: {}", dump_path);
    }

    let app_state = AppState::new(config.clone());
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let cors_origins = config.server.cors_allowed_origins.clone();

    setup_signal_handlers();

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let mut cors = if cors_origins.is_empty() {
            Cors::default().allow_any_origin()
        } else {
            Cors::default()
        };
        for origin in &cors_origins {
            cors = cors.allowed_origin(origin);
        }
        let cors = cors.allow_any_method().allow_any_header().max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(middleware::RequestLogging)
            .route("/ws/ingest", web::get().to(websocket::ws_ingest))
            .route("/ws/ingest/stats", web::get().to(handlers::ingest_stats))
            .service(
                web::scope("/health")
                    .route("", web::get().to(health::health_check))
                    .route("/ready", web::get().to(health::readiness)),
            )
            .service(
                web::scope("/api/v1")
                    .route("/config", web::get().to(handlers::get_config))
                    .route("/config", web::put().to(handlers::update_config)),
            )
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(server_result) => {
                    if let Err(e) = server_result {
                        error!("Server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Server task error: {}", e);
                }
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Console logging via tracing; level controlled by `RUST_LOG`.
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meeting_ingest_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

/// Flip the shutdown flag on SIGTERM or SIGINT.
fn setup_signal_handlers() {
    tokio::spawn(async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler");
        let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
            .expect("Failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }

        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
