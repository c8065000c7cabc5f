// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for config module

use super::config::*;
use crate::types::MetricsError;

#[test]
fn test_middleware_config_defaults() {
    let config = MetricsMiddlewareConfig::default();
    assert!(config.status_code_metric);
    assert!(config.client_error_metric);
    assert!(config.server_error_metric);
    assert!(config.duration_metric);
    assert!(!config.ip_property);
    assert!(!config.user_agent_property);
}

#[test]
fn test_emf_config_defaults() {
    let config = EmfConfig::default();
    assert_eq!(config.namespace, DEFAULT_NAMESPACE);
    assert_eq!(config.service_name, "Unknown");
    assert_eq!(config.service_type, "Unknown");
    assert_eq!(config.agent_endpoint, DEFAULT_AGENT_ENDPOINT);
    assert_eq!(config.environment, EmfEnvironment::Local);
    assert!(config.log_group_name.is_none());
    assert!(!config.disable_default_dimensions);
    assert!(config.validate().is_ok());
}

#[test]
fn test_emf_config_validation() {
    let config = EmfConfig {
        namespace: "  ".to_string(),
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(MetricsError::InvalidConfig(_))
    ));

    // a bad endpoint only matters when the agent is used
    let config = EmfConfig {
        agent_endpoint: "udp://127.0.0.1:25888".to_string(),
        ..Default::default()
    };
    assert!(config.validate().is_ok());

    let config = EmfConfig {
        agent_endpoint: "udp://127.0.0.1:25888".to_string(),
        environment: EmfEnvironment::Agent,
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(MetricsError::InvalidEndpoint(_))
    ));
}

#[test]
fn test_parse_agent_endpoint() {
    assert_eq!(
        parse_agent_endpoint("tcp://127.0.0.1:25888").unwrap(),
        "127.0.0.1:25888"
    );
    assert_eq!(
        parse_agent_endpoint("tcp://cwagent.local:9000").unwrap(),
        "cwagent.local:9000"
    );
    assert!(parse_agent_endpoint("127.0.0.1:25888").is_err());
    assert!(parse_agent_endpoint("tcp://127.0.0.1").is_err());
    assert!(parse_agent_endpoint("tcp://:25888").is_err());
    assert!(parse_agent_endpoint("tcp://host:notaport").is_err());
}

#[test]
fn test_emf_environment_from_str() {
    assert_eq!("local".parse::<EmfEnvironment>().unwrap(), EmfEnvironment::Local);
    assert_eq!("Lambda".parse::<EmfEnvironment>().unwrap(), EmfEnvironment::Local);
    assert_eq!("agent".parse::<EmfEnvironment>().unwrap(), EmfEnvironment::Agent);
    assert_eq!("ECS".parse::<EmfEnvironment>().unwrap(), EmfEnvironment::Agent);
    assert!("mainframe".parse::<EmfEnvironment>().is_err());
}

#[test]
fn test_emf_config_from_env() {
    // all env mutation lives in this one test to avoid races
    let vars = [
        "AWS_EMF_NAMESPACE",
        "AWS_EMF_SERVICE_NAME",
        "AWS_EMF_SERVICE_TYPE",
        "AWS_EMF_LOG_GROUP_NAME",
        "AWS_EMF_LOG_STREAM_NAME",
        "AWS_EMF_AGENT_ENDPOINT",
        "AWS_EMF_ENVIRONMENT",
        "AWS_EMF_DISABLE_DEFAULT_DIMENSIONS",
    ];
    for var in vars {
        std::env::remove_var(var);
    }

    let config = EmfConfig::from_env().unwrap();
    assert_eq!(config.namespace, DEFAULT_NAMESPACE);
    assert_eq!(config.environment, EmfEnvironment::Local);

    std::env::set_var("AWS_EMF_NAMESPACE", "orders");
    std::env::set_var("AWS_EMF_SERVICE_NAME", "orders-api");
    std::env::set_var("AWS_EMF_LOG_GROUP_NAME", "");
    std::env::set_var("AWS_EMF_ENVIRONMENT", "agent");
    std::env::set_var("AWS_EMF_AGENT_ENDPOINT", "tcp://10.0.0.1:25888");
    std::env::set_var("AWS_EMF_DISABLE_DEFAULT_DIMENSIONS", "true");

    let config = EmfConfig::from_env().unwrap();
    assert_eq!(config.namespace, "orders");
    assert_eq!(config.service_name, "orders-api");
    assert_eq!(config.service_type, "Unknown");
    assert!(config.log_group_name.is_none());
    assert_eq!(config.environment, EmfEnvironment::Agent);
    assert_eq!(config.agent_address().unwrap(), "10.0.0.1:25888");
    assert!(config.disable_default_dimensions);

    std::env::set_var("AWS_EMF_ENVIRONMENT", "bogus");
    assert!(EmfConfig::from_env().is_err());

    for var in vars {
        std::env::remove_var(var);
    }
}

#[test]
fn test_agent_log_group() {
    let config = EmfConfig {
        service_name: "orders".to_string(),
        ..Default::default()
    };
    assert_eq!(config.agent_log_group(), "orders-metrics");

    let config = EmfConfig {
        log_group_name: Some("/ecs/orders".to_string()),
        ..Default::default()
    };
    assert_eq!(config.agent_log_group(), "/ecs/orders");
}
