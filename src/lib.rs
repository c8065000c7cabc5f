// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! emfware - per-request CloudWatch Embedded Metric Format metrics for axum
//!
//! An axum middleware that attaches a metrics session to every request and,
//! once the response has finished, records request duration, status code
//! buckets and client/server error flags as EMF documents.
//!
//! # Features
//!
//! - `RequestDuration` (Milliseconds), `StatusCode<N>`, `ClientError` and
//!   `ServerError` (Count) per request, each individually switchable
//! - Optional `RemoteAddress` and `UserAgent` properties
//! - Per-request [`MetricsLogger`] available to handlers via `Extension`
//! - Stdout and CloudWatch agent (TCP) sinks
//! - Metrics flushing is best effort and never affects the response
//!
//! # Usage
//!
//! ```rust,no_run
//! use axum::{middleware, routing::get, Router};
//! use emfware::{sink, EmfConfig, EmfMetrics, MetricsMiddlewareConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let emf = EmfConfig::from_env()?;
//!     let sink = sink::from_config(&emf)?;
//!
//!     let config = MetricsMiddlewareConfig {
//!         user_agent_property: true,
//!         ..Default::default()
//!     };
//!     let metrics = EmfMetrics::new(config, emf, sink);
//!
//!     let app = Router::new()
//!         .route("/", get(|| async { "hello" }))
//!         .layer(middleware::from_fn_with_state(metrics, emfware::track_request_metrics));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod body;
pub mod config;
pub mod emf;
pub mod logger;
pub mod middleware;
pub mod sink;
pub mod types;

// Configuration
pub use config::{EmfConfig, EmfEnvironment, MetricsMiddlewareConfig};

// EMF client
pub use emf::{EmfContext, EmfDocument};
pub use logger::MetricsLogger;
pub use sink::{AgentSink, MemorySink, MetricsSink, StdoutSink};

// Middleware
pub use middleware::{track_request_metrics, EmfMetrics};

// Common types
pub use types::{MetricsError, RequestOutcome, RequestStart, Unit};

#[cfg(test)]
mod config_test;
#[cfg(test)]
mod logger_test;
