// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common types and errors used throughout the emfware library

use serde::Serialize;
use std::time::{Duration, Instant};

/// Unit attached to a measurement at record time
///
/// Serialized with the exact names CloudWatch expects in the EMF
/// `Metrics` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Unit {
    Seconds,
    Microseconds,
    Milliseconds,
    Bytes,
    Kilobytes,
    Megabytes,
    Bits,
    Percent,
    Count,
    #[serde(rename = "Bytes/Second")]
    BytesPerSecond,
    #[serde(rename = "Count/Second")]
    CountPerSecond,
    None,
}

/// Metrics error type
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid agent endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Sink error: {0}")]
    Sink(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Monotonic entry time of a request
///
/// Inserted into the request extensions only when duration tracking is
/// enabled.
#[derive(Debug, Clone, Copy)]
pub struct RequestStart(pub Instant);

impl RequestStart {
    pub fn now() -> Self {
        Self(Instant::now())
    }

    /// Elapsed time since entry, in milliseconds with sub-millisecond precision
    pub fn elapsed_ms(&self) -> f64 {
        duration_ms(self.0.elapsed())
    }
}

pub(crate) fn duration_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1e3
}

/// What the middleware observed once a response finished
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOutcome {
    /// HTTP status code of the response
    pub status: u16,
    /// Request duration in milliseconds, if duration tracking was enabled
    pub duration_ms: Option<f64>,
    /// Whether the metrics flush succeeded
    pub flushed: bool,
}

/// Classify a status code as a client error (4xx)
pub fn is_client_error(status: u16) -> bool {
    (400..500).contains(&status)
}

/// Classify a status code as a server error (5xx and above)
pub fn is_server_error(status: u16) -> bool {
    status >= 500
}
