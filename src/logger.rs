// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-request metrics session
//!
//! A [`MetricsLogger`] is created for every request by the middleware and
//! placed in the request extensions. Handlers can pull it out with
//! `Extension<MetricsLogger>` and record their own measurements; everything
//! ends up in the same EMF document when the response finishes.
//!
//! ```rust
//! use axum::Extension;
//! use emfware::{MetricsLogger, Unit};
//!
//! async fn handler(Extension(metrics): Extension<MetricsLogger>) -> &'static str {
//!     metrics.put_metric("CacheHit", 1.0, Unit::Count);
//!     metrics.set_property("TenantId", "acme");
//!     "ok"
//! }
//! ```

use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::emf::EmfContext;
use crate::sink::MetricsSink;
use crate::types::{MetricsError, Unit};

/// Cloneable handle to one metrics session
#[derive(Clone)]
pub struct MetricsLogger {
    context: Arc<Mutex<EmfContext>>,
    sink: Arc<dyn MetricsSink>,
}

impl std::fmt::Debug for MetricsLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsLogger")
            .field("context", &*self.context())
            .finish_non_exhaustive()
    }
}

impl MetricsLogger {
    pub fn new(context: EmfContext, sink: Arc<dyn MetricsSink>) -> Self {
        Self {
            context: Arc::new(Mutex::new(context)),
            sink,
        }
    }

    /// Set a string or JSON property; a null or `None` value leaves it unset
    pub fn set_property(&self, key: impl Into<String>, value: impl Into<Value>) -> &Self {
        self.context().set_property(key, Some(value.into()));
        self
    }

    pub fn put_metric(&self, name: impl Into<String>, value: f64, unit: Unit) -> &Self {
        self.context().put_metric(name, value, unit);
        self
    }

    pub fn put_dimensions<K, V>(&self, dimensions: impl IntoIterator<Item = (K, V)>) -> &Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let set = dimensions
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.context().put_dimensions(set);
        self
    }

    /// Replace every dimension set, default dimensions included
    pub fn set_dimensions<I, K, V>(&self, dimension_sets: impl IntoIterator<Item = I>) -> &Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let sets = dimension_sets
            .into_iter()
            .map(|set| set.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
            .collect();
        self.context().set_dimensions(sets);
        self
    }

    pub fn set_namespace(&self, namespace: impl Into<String>) -> &Self {
        self.context().set_namespace(namespace);
        self
    }

    /// Run a closure against the underlying context
    pub fn with_context<R>(&self, f: impl FnOnce(&mut EmfContext) -> R) -> R {
        f(&mut *self.context())
    }

    /// Serialize recorded metrics and hand them to the sink
    ///
    /// Metrics are drained even if the sink fails; properties and dimensions
    /// stay for any later flush.
    pub async fn flush(&self) -> Result<(), MetricsError> {
        let documents = {
            let mut context = self.context();
            let documents = context.documents();
            context.clear_metrics();
            documents?
        };

        for document in &documents {
            self.sink.accept(document).await?;
        }

        Ok(())
    }

    fn context(&self) -> MutexGuard<'_, EmfContext> {
        self.context.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
