// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Middleware for per-request EMF metrics
//!
//! On entry a fresh [`MetricsLogger`] is attached to the request. Once the
//! response body has finished (fully written, errored, or dropped by a
//! disconnecting client) a background task records the configured
//! measurements, flushes the logger and finally runs the completion hook.
//!
//! ```rust,no_run
//! use axum::{middleware, routing::get, Router};
//! use emfware::{EmfMetrics, MetricsMiddlewareConfig, StdoutSink};
//! use std::sync::Arc;
//!
//! let metrics = EmfMetrics::with_sink(MetricsMiddlewareConfig::default(), Arc::new(StdoutSink));
//! let app: Router = Router::new()
//!     .route("/", get(|| async { "hello" }))
//!     .layer(middleware::from_fn_with_state(metrics, emfware::track_request_metrics));
//! ```

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{header::USER_AGENT, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::trace;

use crate::body::{BodyEnd, CompletionBody};
use crate::config::{EmfConfig, MetricsMiddlewareConfig};
use crate::emf::EmfContext;
use crate::logger::MetricsLogger;
use crate::sink::MetricsSink;
use crate::types::{is_client_error, is_server_error, RequestOutcome, RequestStart, Unit};

pub const REQUEST_DURATION: &str = "RequestDuration";
pub const CLIENT_ERROR: &str = "ClientError";
pub const SERVER_ERROR: &str = "ServerError";
pub const STATUS_CODE_PREFIX: &str = "StatusCode";
pub const REMOTE_ADDRESS: &str = "RemoteAddress";
pub const USER_AGENT_PROPERTY: &str = "UserAgent";

type CompletionHook = Arc<dyn Fn(&RequestOutcome) + Send + Sync>;

/// Middleware state: what to record and where to send it
#[derive(Clone)]
pub struct EmfMetrics {
    config: MetricsMiddlewareConfig,
    emf: Arc<EmfConfig>,
    sink: Arc<dyn MetricsSink>,
    on_complete: Option<CompletionHook>,
    trust_forwarded_headers: bool,
}

impl EmfMetrics {
    pub fn new(
        config: MetricsMiddlewareConfig,
        emf: EmfConfig,
        sink: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            config,
            emf: Arc::new(emf),
            sink,
            on_complete: None,
            trust_forwarded_headers: false,
        }
    }

    /// Use the default EMF settings (namespace, service dimensions)
    pub fn with_sink(config: MetricsMiddlewareConfig, sink: Arc<dyn MetricsSink>) -> Self {
        Self::new(config, EmfConfig::default(), sink)
    }

    /// Run `hook` once per request after the metrics flush has settled
    pub fn on_complete(mut self, hook: impl Fn(&RequestOutcome) + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Arc::new(hook));
        self
    }

    /// Resolve `RemoteAddress` from `X-Forwarded-For` / `X-Real-IP`
    ///
    /// Only enable behind a proxy that overwrites these headers; otherwise
    /// clients can set them to anything. Off by default.
    pub fn trust_forwarded_headers(mut self, trust: bool) -> Self {
        self.trust_forwarded_headers = trust;
        self
    }

    pub fn config(&self) -> &MetricsMiddlewareConfig {
        &self.config
    }

    /// Start a new metrics session bound to this middleware's sink
    pub fn new_logger(&self) -> MetricsLogger {
        MetricsLogger::new(EmfContext::from_config(&self.emf), self.sink.clone())
    }
}

/// Middleware recording per-request EMF metrics
pub async fn track_request_metrics(
    State(metrics): State<EmfMetrics>,
    mut req: Request,
    next: Next,
) -> Response {
    let config = metrics.config;

    let start = config.duration_metric.then(RequestStart::now);
    if let Some(start) = start {
        req.extensions_mut().insert(start);
    }

    let logger = metrics.new_logger();
    req.extensions_mut().insert(logger.clone());

    if config.ip_property {
        let ip = client_ip(&req, metrics.trust_forwarded_headers);
        logger.set_property(REMOTE_ADDRESS, ip);
    }

    if config.user_agent_property {
        let user_agent = req
            .headers()
            .get(USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);
        logger.set_property(USER_AGENT_PROPERTY, user_agent);
    }

    let response = next.run(req).await;
    let status = response.status().as_u16();

    let (parts, body) = response.into_parts();
    let (body, finished) = CompletionBody::new(body);

    tokio::spawn(async move {
        let end = finished.await.unwrap_or(BodyEnd::Dropped);
        trace!(status, ?end, "response finished");

        let duration_ms = start.map(|s| s.elapsed_ms());
        record_response(&config, &logger, status, duration_ms);

        let flushed = logger.flush().await.is_ok();

        if let Some(hook) = &metrics.on_complete {
            hook(&RequestOutcome {
                status,
                duration_ms,
                flushed,
            });
        }
    });

    Response::from_parts(parts, Body::new(body))
}

/// Record the configured per-response measurements on `logger`
pub fn record_response(
    config: &MetricsMiddlewareConfig,
    logger: &MetricsLogger,
    status: u16,
    duration_ms: Option<f64>,
) {
    if config.duration_metric {
        if let Some(duration) = duration_ms {
            logger.put_metric(REQUEST_DURATION, duration, Unit::Milliseconds);
        }
    }

    if config.status_code_metric {
        logger.put_metric(
            format!("{}{}", STATUS_CODE_PREFIX, status),
            1.0,
            Unit::Count,
        );
    }

    if config.client_error_metric {
        let value = if is_client_error(status) { 1.0 } else { 0.0 };
        logger.put_metric(CLIENT_ERROR, value, Unit::Count);
    }

    if config.server_error_metric {
        let value = if is_server_error(status) { 1.0 } else { 0.0 };
        logger.put_metric(SERVER_ERROR, value, Unit::Count);
    }
}

/// Resolve the client address
///
/// The peer address from `ConnectInfo` (present when the server was started
/// with `into_make_service_with_connect_info`) is used unless
/// `trust_forwarded` is set, in which case the first `X-Forwarded-For`
/// entry, then `X-Real-IP`, take precedence over it.
pub fn client_ip(req: &Request, trust_forwarded: bool) -> Option<String> {
    if trust_forwarded {
        if let Some(ip) = forwarded_ip(req.headers()) {
            return Some(ip);
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = forwarded {
        return Some(ip.to_string());
    }

    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
