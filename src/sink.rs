// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Destinations for serialized EMF documents
//!
//! - [`StdoutSink`]: one JSON line per document on stdout, picked up by
//!   Lambda or any container log shipper
//! - [`AgentSink`]: newline-delimited JSON over TCP to the CloudWatch agent
//! - [`MemorySink`]: keeps documents in memory, for tests and embedders that
//!   ship documents themselves

use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;

use crate::config::{EmfConfig, EmfEnvironment};
use crate::emf::EmfDocument;
use crate::types::MetricsError;

/// Receives documents produced by a metrics flush
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn accept(&self, document: &EmfDocument) -> Result<(), MetricsError>;
}

/// Build the sink selected by the configured environment
pub fn from_config(config: &EmfConfig) -> Result<Arc<dyn MetricsSink>, MetricsError> {
    config.validate()?;

    let sink: Arc<dyn MetricsSink> = match config.environment {
        EmfEnvironment::Local => Arc::new(StdoutSink),
        EmfEnvironment::Agent => {
            let mut agent =
                AgentSink::new(config.agent_address()?).with_log_group(config.agent_log_group());
            if let Some(stream) = &config.log_stream_name {
                agent = agent.with_log_stream(stream.clone());
            }
            Arc::new(agent)
        }
    };

    Ok(sink)
}

/// Writes each document as a JSON line to stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

#[async_trait]
impl MetricsSink for StdoutSink {
    async fn accept(&self, document: &EmfDocument) -> Result<(), MetricsError> {
        let mut line = document.to_json_line()?;
        line.push('\n');

        let mut stdout = tokio::io::stdout();
        stdout.write_all(line.as_bytes()).await?;
        stdout.flush().await?;
        Ok(())
    }
}

/// Streams documents to the CloudWatch agent's EMF TCP listener
///
/// The connection is opened on first use and dropped after a write error so
/// that the next flush reconnects. The target log group and stream travel in
/// the `_aws` metadata as `LogGroupName` / `LogStreamName`.
#[derive(Debug)]
pub struct AgentSink {
    address: String,
    log_group_name: Option<String>,
    log_stream_name: Option<String>,
    stream: tokio::sync::Mutex<Option<TcpStream>>,
}

impl AgentSink {
    /// `address` is a `host:port` pair
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            log_group_name: None,
            log_stream_name: None,
            stream: tokio::sync::Mutex::new(None),
        }
    }

    pub fn with_log_group(mut self, log_group_name: impl Into<String>) -> Self {
        self.log_group_name = Some(log_group_name.into());
        self
    }

    pub fn with_log_stream(mut self, log_stream_name: impl Into<String>) -> Self {
        self.log_stream_name = Some(log_stream_name.into());
        self
    }

    pub fn log_group_name(&self) -> Option<&str> {
        self.log_group_name.as_deref()
    }

    pub fn log_stream_name(&self) -> Option<&str> {
        self.log_stream_name.as_deref()
    }

    fn encode(&self, document: &EmfDocument) -> Result<String, MetricsError> {
        let mut document = document.clone();
        if let Some(group) = &self.log_group_name {
            document.set_metadata("LogGroupName", group.as_str());
        }
        if let Some(stream) = &self.log_stream_name {
            document.set_metadata("LogStreamName", stream.as_str());
        }

        let mut line = document.to_json_line()?;
        line.push('\n');
        Ok(line)
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl MetricsSink for AgentSink {
    async fn accept(&self, document: &EmfDocument) -> Result<(), MetricsError> {
        let line = self.encode(document)?;

        let mut guard = self.stream.lock().await;

        if guard.is_none() {
            debug!("connecting to cloudwatch agent at {}", self.address);
            *guard = Some(TcpStream::connect(&self.address).await?);
        }

        let Some(stream) = guard.as_mut() else {
            return Err(MetricsError::Sink("agent connection unavailable".to_string()));
        };

        if let Err(e) = stream.write_all(line.as_bytes()).await {
            *guard = None;
            return Err(e.into());
        }

        Ok(())
    }
}

/// Collects documents in memory
///
/// Cloning shares the underlying buffer. [`MemorySink::set_failing`] makes
/// every subsequent `accept` return an error without storing the document.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    inner: Arc<Mutex<MemorySinkState>>,
}

#[derive(Debug, Default)]
struct MemorySinkState {
    documents: Vec<EmfDocument>,
    failing: bool,
    attempts: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.state().failing = failing;
    }

    /// Documents accepted so far
    pub fn documents(&self) -> Vec<EmfDocument> {
        self.state().documents.clone()
    }

    /// Number of `accept` calls, successful or not
    pub fn attempts(&self) -> usize {
        self.state().attempts
    }

    pub fn clear(&self) {
        let mut state = self.state();
        state.documents.clear();
        state.attempts = 0;
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemorySinkState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl MetricsSink for MemorySink {
    async fn accept(&self, document: &EmfDocument) -> Result<(), MetricsError> {
        let mut state = self.state();
        state.attempts += 1;
        if state.failing {
            return Err(MetricsError::Sink("memory sink set to fail".to_string()));
        }
        state.documents.push(document.clone());
        Ok(())
    }
}
