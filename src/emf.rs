// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Embedded Metric Format document model
//!
//! An [`EmfContext`] accumulates everything recorded for one metrics session.
//! [`EmfContext::documents`] turns it into one or more [`EmfDocument`]s, each a
//! flat JSON object whose `_aws` member tells CloudWatch which root members are
//! metrics and which are dimensions:
//!
//! ```json
//! {
//!   "_aws": {
//!     "Timestamp": 1700000000000,
//!     "CloudWatchMetrics": [{
//!       "Namespace": "aws-embedded-metrics",
//!       "Dimensions": [["ServiceName", "ServiceType"]],
//!       "Metrics": [{ "Name": "RequestDuration", "Unit": "Milliseconds" }]
//!     }]
//!   },
//!   "ServiceName": "api",
//!   "ServiceType": "AWS::ECS::Container",
//!   "RequestDuration": 15.2
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::EmfConfig;
use crate::types::{MetricsError, Unit};

/// CloudWatch rejects documents with more metrics than this
pub const MAX_METRICS_PER_DOCUMENT: usize = 100;

/// Values recorded under one metric name
#[derive(Debug, Clone, PartialEq)]
pub struct MetricValues {
    pub unit: Unit,
    pub values: Vec<f64>,
}

/// Accumulated state of one metrics session
#[derive(Debug, Clone)]
pub struct EmfContext {
    namespace: String,
    default_dimensions: Vec<(String, String)>,
    dimensions: Vec<Vec<(String, String)>>,
    use_default_dimensions: bool,
    properties: BTreeMap<String, Value>,
    metrics: Vec<(String, MetricValues)>,
    timestamp: DateTime<Utc>,
}

impl Default for EmfContext {
    fn default() -> Self {
        Self::from_config(&EmfConfig::default())
    }
}

impl EmfContext {
    /// Build an empty context carrying the configured namespace and default dimensions
    pub fn from_config(config: &EmfConfig) -> Self {
        let mut default_dimensions = vec![
            ("ServiceName".to_string(), config.service_name.clone()),
            ("ServiceType".to_string(), config.service_type.clone()),
        ];
        if let Some(log_group) = &config.log_group_name {
            default_dimensions.push(("LogGroup".to_string(), log_group.clone()));
        }

        Self {
            namespace: config.namespace.clone(),
            default_dimensions,
            dimensions: Vec::new(),
            use_default_dimensions: !config.disable_default_dimensions,
            properties: BTreeMap::new(),
            metrics: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn set_namespace(&mut self, namespace: impl Into<String>) {
        self.namespace = namespace.into();
    }

    pub fn set_timestamp(&mut self, timestamp: DateTime<Utc>) {
        self.timestamp = timestamp;
    }

    /// Set a property; `None` leaves the property unset so it is omitted from output
    pub fn set_property(&mut self, key: impl Into<String>, value: Option<Value>) {
        let key = key.into();
        match value {
            Some(value) if !value.is_null() => {
                self.properties.insert(key, value);
            }
            _ => {
                self.properties.remove(&key);
            }
        }
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Add a dimension set on top of the defaults
    pub fn put_dimensions(&mut self, dimensions: Vec<(String, String)>) {
        self.dimensions.push(dimensions);
    }

    /// Replace all dimension sets, dropping the defaults
    pub fn set_dimensions(&mut self, dimensions: Vec<Vec<(String, String)>>) {
        self.use_default_dimensions = false;
        self.dimensions = dimensions;
    }

    /// Record a value; repeated names accumulate and keep the first unit
    ///
    /// NaN and infinite values are dropped, JSON has no representation for them.
    pub fn put_metric(&mut self, name: impl Into<String>, value: f64, unit: Unit) {
        let name = name.into();
        if !value.is_finite() {
            debug!("dropping non-finite value {} for metric {}", value, name);
            return;
        }
        match self.metrics.iter_mut().find(|(n, _)| *n == name) {
            Some((_, metric)) => metric.values.push(value),
            None => self.metrics.push((
                name,
                MetricValues {
                    unit,
                    values: vec![value],
                },
            )),
        }
    }

    pub fn metric(&self, name: &str) -> Option<&MetricValues> {
        self.metrics.iter().find(|(n, _)| n == name).map(|(_, m)| m)
    }

    pub fn has_metrics(&self) -> bool {
        !self.metrics.is_empty()
    }

    /// Drop recorded metrics, keeping properties and dimensions
    pub fn clear_metrics(&mut self) {
        self.metrics.clear();
    }

    fn resolved_dimensions(&self) -> Vec<Vec<(String, String)>> {
        let defaults: &[(String, String)] = if self.use_default_dimensions {
            &self.default_dimensions
        } else {
            &[]
        };

        if self.dimensions.is_empty() {
            return if defaults.is_empty() {
                Vec::new()
            } else {
                vec![defaults.to_vec()]
            };
        }

        self.dimensions
            .iter()
            .map(|set| {
                let mut merged = defaults.to_vec();
                for (key, value) in set {
                    match merged.iter_mut().find(|(k, _)| k == key) {
                        Some(existing) => existing.1 = value.clone(),
                        None => merged.push((key.clone(), value.clone())),
                    }
                }
                merged
            })
            .collect()
    }

    /// Serialize into EMF documents, splitting at [`MAX_METRICS_PER_DOCUMENT`]
    ///
    /// A context without metrics still yields one document carrying its
    /// properties and dimensions.
    pub fn documents(&self) -> Result<Vec<EmfDocument>, MetricsError> {
        let dimensions = self.resolved_dimensions();

        if self.metrics.is_empty() {
            return Ok(vec![self.document(&dimensions, &[])?]);
        }

        self.metrics
            .chunks(MAX_METRICS_PER_DOCUMENT)
            .map(|chunk| self.document(&dimensions, chunk))
            .collect()
    }

    fn document(
        &self,
        dimensions: &[Vec<(String, String)>],
        metrics: &[(String, MetricValues)],
    ) -> Result<EmfDocument, MetricsError> {
        let mut root = Map::new();

        for (key, value) in &self.properties {
            root.insert(key.clone(), value.clone());
        }

        for set in dimensions {
            for (key, value) in set {
                root.insert(key.clone(), Value::String(value.clone()));
            }
        }

        for (name, metric) in metrics {
            let value = match metric.values.as_slice() {
                [single] => serde_json::to_value(single)?,
                many => serde_json::to_value(many)?,
            };
            root.insert(name.clone(), value);
        }

        let directive = MetricDirective {
            namespace: &self.namespace,
            dimensions: dimensions
                .iter()
                .map(|set| set.iter().map(|(k, _)| k.as_str()).collect())
                .collect(),
            metrics: metrics
                .iter()
                .map(|(name, metric)| MetricDefinition {
                    name,
                    unit: metric.unit,
                })
                .collect(),
        };

        let metadata = Metadata {
            timestamp: self.timestamp.timestamp_millis(),
            cloud_watch_metrics: vec![directive],
        };
        root.insert("_aws".to_string(), serde_json::to_value(metadata)?);

        Ok(EmfDocument(root))
    }
}

#[derive(Serialize)]
struct Metadata<'a> {
    #[serde(rename = "Timestamp")]
    timestamp: i64,
    #[serde(rename = "CloudWatchMetrics")]
    cloud_watch_metrics: Vec<MetricDirective<'a>>,
}

#[derive(Serialize)]
struct MetricDirective<'a> {
    #[serde(rename = "Namespace")]
    namespace: &'a str,
    #[serde(rename = "Dimensions")]
    dimensions: Vec<Vec<&'a str>>,
    #[serde(rename = "Metrics")]
    metrics: Vec<MetricDefinition<'a>>,
}

#[derive(Serialize)]
struct MetricDefinition<'a> {
    #[serde(rename = "Name")]
    name: &'a str,
    #[serde(rename = "Unit")]
    unit: Unit,
}

/// One serialized EMF log event
#[derive(Debug, Clone, PartialEq)]
pub struct EmfDocument(Map<String, Value>);

impl EmfDocument {
    /// Root member by name (metric value, dimension value or property)
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Metric names declared in the `_aws` directive
    pub fn metric_names(&self) -> Vec<String> {
        self.0
            .get("_aws")
            .and_then(|aws| aws.get("CloudWatchMetrics"))
            .and_then(|directives| directives.get(0))
            .and_then(|directive| directive.get("Metrics"))
            .and_then(Value::as_array)
            .map(|metrics| {
                metrics
                    .iter()
                    .filter_map(|m| m.get("Name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Set a member of the `_aws` metadata object
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        if let Some(Value::Object(aws)) = self.0.get_mut("_aws") {
            aws.insert(key.into(), value.into());
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Compact single-line JSON, as written to stdout or the agent
    pub fn to_json_line(&self) -> Result<String, MetricsError> {
        Ok(serde_json::to_string(&self.0)?)
    }
}
