// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Configuration for the request metrics middleware and the EMF client
//!
//! [`MetricsMiddlewareConfig`] is a plain value handed to the middleware once
//! at construction. [`EmfConfig`] describes where and how EMF documents are
//! written, and can be resolved from the environment at startup.

use crate::types::MetricsError;

pub const DEFAULT_NAMESPACE: &str = "aws-embedded-metrics";
pub const DEFAULT_SERVICE_NAME: &str = "Unknown";
pub const DEFAULT_SERVICE_TYPE: &str = "Unknown";
pub const DEFAULT_AGENT_ENDPOINT: &str = "tcp://127.0.0.1:25888";

/// Which measurements and properties the middleware records per request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsMiddlewareConfig {
    /// Record `StatusCode<N>` for each response status code
    pub status_code_metric: bool,
    /// Record `ClientError` (1 for 4xx, else 0)
    pub client_error_metric: bool,
    /// Record `ServerError` (1 for 5xx, else 0)
    pub server_error_metric: bool,
    /// Record `RequestDuration` in milliseconds
    pub duration_metric: bool,
    /// Set the `RemoteAddress` property
    pub ip_property: bool,
    /// Set the `UserAgent` property
    pub user_agent_property: bool,
}

impl Default for MetricsMiddlewareConfig {
    fn default() -> Self {
        Self {
            status_code_metric: true,
            client_error_metric: true,
            server_error_metric: true,
            duration_metric: true,
            ip_property: false,
            user_agent_property: false,
        }
    }
}

/// Where EMF documents are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmfEnvironment {
    /// One JSON document per line on stdout (Lambda, containers shipping stdout)
    Local,
    /// Newline-delimited JSON over TCP to the CloudWatch agent
    Agent,
}

impl std::str::FromStr for EmfEnvironment {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" | "lambda" | "stdout" => Ok(Self::Local),
            "agent" | "ec2" | "ecs" => Ok(Self::Agent),
            other => Err(MetricsError::InvalidConfig(format!(
                "unknown EMF environment: {}",
                other
            ))),
        }
    }
}

/// EMF client configuration
#[derive(Debug, Clone)]
pub struct EmfConfig {
    /// CloudWatch namespace metrics are published under
    pub namespace: String,
    /// Value of the default `ServiceName` dimension
    pub service_name: String,
    /// Value of the default `ServiceType` dimension
    pub service_type: String,
    /// Optional `LogGroup` default dimension and agent target log group
    pub log_group_name: Option<String>,
    /// Optional agent target log stream
    pub log_stream_name: Option<String>,
    /// Agent endpoint, `tcp://host:port`
    pub agent_endpoint: String,
    /// Output environment
    pub environment: EmfEnvironment,
    /// Drop the default dimensions from every document
    pub disable_default_dimensions: bool,
}

impl Default for EmfConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            service_type: DEFAULT_SERVICE_TYPE.to_string(),
            log_group_name: None,
            log_stream_name: None,
            agent_endpoint: DEFAULT_AGENT_ENDPOINT.to_string(),
            environment: EmfEnvironment::Local,
            disable_default_dimensions: false,
        }
    }
}

impl EmfConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `AWS_EMF_NAMESPACE`: CloudWatch namespace (default: aws-embedded-metrics)
    /// - `AWS_EMF_SERVICE_NAME`: ServiceName dimension (default: Unknown)
    /// - `AWS_EMF_SERVICE_TYPE`: ServiceType dimension (default: Unknown)
    /// - `AWS_EMF_LOG_GROUP_NAME`: LogGroup dimension and agent log group (default: unset)
    /// - `AWS_EMF_LOG_STREAM_NAME`: agent log stream (default: unset)
    /// - `AWS_EMF_AGENT_ENDPOINT`: agent endpoint (default: tcp://127.0.0.1:25888)
    /// - `AWS_EMF_ENVIRONMENT`: `local` or `agent` (default: local)
    /// - `AWS_EMF_DISABLE_DEFAULT_DIMENSIONS`: drop default dimensions (default: false)
    pub fn from_env() -> Result<Self, MetricsError> {
        let defaults = Self::default();

        let environment = match non_empty_var("AWS_EMF_ENVIRONMENT") {
            Some(v) => v.parse()?,
            None => defaults.environment,
        };

        let disable_default_dimensions = std::env::var("AWS_EMF_DISABLE_DEFAULT_DIMENSIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(false);

        Ok(Self {
            namespace: non_empty_var("AWS_EMF_NAMESPACE").unwrap_or(defaults.namespace),
            service_name: non_empty_var("AWS_EMF_SERVICE_NAME").unwrap_or(defaults.service_name),
            service_type: non_empty_var("AWS_EMF_SERVICE_TYPE").unwrap_or(defaults.service_type),
            log_group_name: non_empty_var("AWS_EMF_LOG_GROUP_NAME"),
            log_stream_name: non_empty_var("AWS_EMF_LOG_STREAM_NAME"),
            agent_endpoint: non_empty_var("AWS_EMF_AGENT_ENDPOINT")
                .unwrap_or(defaults.agent_endpoint),
            environment,
            disable_default_dimensions,
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), MetricsError> {
        if self.namespace.trim().is_empty() {
            return Err(MetricsError::InvalidConfig(
                "namespace must not be empty".to_string(),
            ));
        }

        if self.environment == EmfEnvironment::Agent {
            self.agent_address()?;
        }

        Ok(())
    }

    /// Log group the agent writes to, `<service name>-metrics` unless set
    pub fn agent_log_group(&self) -> String {
        self.log_group_name
            .clone()
            .unwrap_or_else(|| format!("{}-metrics", self.service_name))
    }

    /// Resolve the agent endpoint into a `host:port` socket address string
    pub fn agent_address(&self) -> Result<String, MetricsError> {
        parse_agent_endpoint(&self.agent_endpoint)
    }
}

/// Parse `tcp://host:port` into `host:port`
pub fn parse_agent_endpoint(endpoint: &str) -> Result<String, MetricsError> {
    let rest = endpoint
        .strip_prefix("tcp://")
        .ok_or_else(|| MetricsError::InvalidEndpoint(endpoint.to_string()))?;

    let (host, port) = rest
        .rsplit_once(':')
        .ok_or_else(|| MetricsError::InvalidEndpoint(endpoint.to_string()))?;

    if host.is_empty() || port.parse::<u16>().is_err() {
        return Err(MetricsError::InvalidEndpoint(endpoint.to_string()));
    }

    Ok(rest.to_string())
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
