// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! emfware demo server
//!
//! A small HTTP server running behind the EMF metrics middleware. EMF
//! documents go to stdout (or the CloudWatch agent), logs go to stderr.

use anyhow::Context;
use axum::{
    extract::Path,
    http::StatusCode,
    middleware as axum_middleware,
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use emfware::{
    middleware::track_request_metrics, sink, EmfConfig, EmfMetrics, MetricsLogger,
    MetricsMiddlewareConfig, Unit,
};

const DEFAULT_API_PORT: u16 = 8080;

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Respond with the requested status code
async fn echo_status(
    Path(status): Path<u16>,
    Extension(metrics): Extension<MetricsLogger>,
) -> impl IntoResponse {
    metrics.put_metric("EchoRequests", 1.0, Unit::Count);

    match StatusCode::from_u16(status) {
        Ok(status) => (status, status.to_string()),
        Err(_) => (
            StatusCode::BAD_REQUEST,
            format!("invalid status code: {}", status),
        ),
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout is reserved for EMF documents
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    info!("starting emfware demo server v{}", env!("CARGO_PKG_VERSION"));

    let api_port = std::env::var("API_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_API_PORT);

    let defaults = MetricsMiddlewareConfig::default();
    let config = MetricsMiddlewareConfig {
        status_code_metric: env_flag("EMF_STATUS_CODE_METRIC", defaults.status_code_metric),
        client_error_metric: env_flag("EMF_CLIENT_ERROR_METRIC", defaults.client_error_metric),
        server_error_metric: env_flag("EMF_SERVER_ERROR_METRIC", defaults.server_error_metric),
        duration_metric: env_flag("EMF_DURATION_METRIC", defaults.duration_metric),
        ip_property: env_flag("EMF_IP_PROPERTY", defaults.ip_property),
        user_agent_property: env_flag("EMF_USER_AGENT_PROPERTY", defaults.user_agent_property),
    };

    let emf = EmfConfig::from_env().context("invalid EMF configuration")?;
    let sink = sink::from_config(&emf).context("failed to create metrics sink")?;

    info!("api port: {}", api_port);
    info!("emf namespace: {}", emf.namespace);
    info!("emf environment: {:?}", emf.environment);
    info!("middleware config: {:?}", config);
    if config.ip_property {
        warn!("client addresses will be attached to every EMF document");
    }

    let trust_forwarded = env_flag("EMF_TRUST_FORWARDED_HEADERS", false);
    let metrics = EmfMetrics::new(config, emf, sink).trust_forwarded_headers(trust_forwarded);

    let app = Router::new()
        .route("/api/v1/health", get(health_check))
        .route("/api/v1/echo/{status}", get(echo_status))
        .layer(axum_middleware::from_fn_with_state(
            metrics,
            track_request_metrics,
        ))
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", api_port);
    info!("emfware demo server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")?;

    Ok(())
}
