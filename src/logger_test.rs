// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for logger module

use super::logger::*;
use crate::emf::EmfContext;
use crate::sink::MemorySink;
use crate::types::Unit;
use serde_json::{json, Value};
use std::sync::Arc;

fn logger_with(sink: &MemorySink) -> MetricsLogger {
    MetricsLogger::new(EmfContext::default(), Arc::new(sink.clone()))
}

#[tokio::test]
async fn test_flush_sends_recorded_metrics() {
    let sink = MemorySink::new();
    let logger = logger_with(&sink);

    logger
        .put_metric("Calls", 1.0, Unit::Count)
        .set_property("Tenant", "acme")
        .put_dimensions([("Operation", "List")]);

    logger.flush().await.unwrap();

    let docs = sink.documents();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].get("Calls"), Some(&json!(1.0)));
    assert_eq!(docs[0].get("Tenant"), Some(&json!("acme")));
    assert_eq!(docs[0].get("Operation"), Some(&json!("List")));
}

#[tokio::test]
async fn test_flush_drains_metrics_but_keeps_properties() {
    let sink = MemorySink::new();
    let logger = logger_with(&sink);

    logger.set_property("Tenant", "acme");
    logger.put_metric("Calls", 1.0, Unit::Count);
    logger.flush().await.unwrap();
    logger.flush().await.unwrap();

    let docs = sink.documents();
    assert_eq!(docs.len(), 2);
    assert!(docs[1].get("Calls").is_none());
    assert_eq!(docs[1].get("Tenant"), Some(&json!("acme")));
}

#[tokio::test]
async fn test_flush_error_is_returned() {
    let sink = MemorySink::new();
    sink.set_failing(true);
    let logger = logger_with(&sink);

    logger.put_metric("Calls", 1.0, Unit::Count);
    assert!(logger.flush().await.is_err());
    assert_eq!(sink.attempts(), 1);

    // metrics are drained even though the sink failed
    logger.with_context(|ctx| assert!(!ctx.has_metrics()));
}

#[tokio::test]
async fn test_clones_share_one_session() {
    let sink = MemorySink::new();
    let logger = logger_with(&sink);
    let handler_copy = logger.clone();

    handler_copy.put_metric("FromHandler", 2.0, Unit::Count);
    logger.put_metric("FromMiddleware", 1.0, Unit::Count);
    logger.flush().await.unwrap();

    let docs = sink.documents();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].get("FromHandler"), Some(&json!(2.0)));
    assert_eq!(docs[0].get("FromMiddleware"), Some(&json!(1.0)));
}

#[tokio::test]
async fn test_absent_property_value_is_tolerated() {
    let sink = MemorySink::new();
    let logger = logger_with(&sink);

    logger.set_property("RemoteAddress", None::<String>);
    logger.flush().await.unwrap();

    assert!(sink.documents()[0].get("RemoteAddress").is_none());
}

#[tokio::test]
async fn test_set_namespace() {
    let sink = MemorySink::new();
    let logger = logger_with(&sink);

    logger.set_namespace("orders").put_metric("Calls", 1.0, Unit::Count);
    logger.flush().await.unwrap();

    let doc = &sink.documents()[0];
    let namespace = doc
        .get("_aws")
        .and_then(|aws| aws["CloudWatchMetrics"][0]["Namespace"].as_str().map(str::to_string));
    assert_eq!(namespace.as_deref(), Some("orders"));
    assert!(matches!(doc.get("Calls"), Some(Value::Number(_))));
}

#[tokio::test]
async fn test_set_dimensions_replaces_defaults() {
    let sink = MemorySink::new();
    let logger = logger_with(&sink);

    logger
        .set_dimensions([[("Region", "eu-west-1")]])
        .put_metric("Calls", 1.0, Unit::Count);
    logger.flush().await.unwrap();

    let doc = &sink.documents()[0];
    let aws = doc.get("_aws").unwrap();
    assert_eq!(
        aws["CloudWatchMetrics"][0]["Dimensions"],
        json!([["Region"]])
    );
    assert_eq!(doc.get("Region"), Some(&json!("eu-west-1")));
    assert!(doc.get("ServiceName").is_none());
}
