//! Configuration parsing and validation tests

use std::str::FromStr;

use super::*;

const MINIMAL: &str = r#"
[egress]
hub_addr = "hub.internal:8082"
"#;

#[test]
fn test_minimal_config_gets_defaults() {
    let config = Config::from_str(MINIMAL).unwrap();

    assert_eq!(config.ingress.port, 3458);
    assert_eq!(config.ingress.diode_capacity, 10_000);
    assert_eq!(config.egress.batch_size, 100);
    assert_eq!(config.egress.batch_interval_ms, 100);
    assert_eq!(config.egress.counter_ttl_secs, 120);
    assert_eq!(config.drains.poll_interval_secs, 60);
    assert_eq!(config.drains.idle_timeout_secs, 600);
    assert_eq!(config.drains.max_drains_per_app, 5);
    assert!(!config.drains.tls_skip_verify);
    assert!(!config.drains.enabled());
}

#[test]
fn test_full_config() {
    let config = Config::from_str(
        r#"
[agent]
deployment = "cf"
job = "router"
index = "3"
ip = "10.0.0.9"

[log]
level = "debug"

[ingress]
port = 4000
diode_capacity = 4096
default_source_id = "router-agent"

[egress]
hub_addr = "hub:8082"
batch_size = 250
batch_interval_ms = 50
counter_ttl_secs = 30

[drains]
provider_url = "https://bindings:8083/v2/bindings"
poll_interval_secs = 15
idle_timeout_secs = 60
max_drains_per_app = 2
blacklist_cidrs = ["10.0.0.0/8", "192.168.1.1"]
tls_skip_verify = true
"#,
    )
    .unwrap();

    assert_eq!(config.agent.deployment, "cf");
    assert_eq!(config.log.level, "debug");
    assert_eq!(config.ingress.port, 4000);
    assert_eq!(config.egress.batch_size, 250);
    assert!(config.drains.enabled());
    assert_eq!(config.drains.max_drains_per_app, 2);
    assert!(config.drains.tls_skip_verify);

    let blacklist = config.drains.parse_blacklist().unwrap();
    assert_eq!(blacklist.len(), 2);
    assert!(blacklist[0].contains(&"10.1.2.3".parse::<std::net::IpAddr>().unwrap()));
}

#[test]
fn test_missing_hub_addr_is_fatal() {
    let err = Config::from_str("").unwrap_err();
    assert!(err.to_string().contains("hub_addr"));
}

#[test]
fn test_zero_batch_size_rejected() {
    let err = Config::from_str(
        r#"
[egress]
hub_addr = "hub:8082"
batch_size = 0
"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("batch_size"));
}

#[test]
fn test_bad_blacklist_entry_rejected() {
    let err = Config::from_str(
        r#"
[egress]
hub_addr = "hub:8082"

[drains]
provider_url = "https://b:1/bindings"
blacklist_cidrs = ["not-a-cidr"]
"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("not-a-cidr"));
}

#[test]
fn test_invalid_toml_rejected() {
    assert!(Config::from_str("[egress\nhub_addr = 3").is_err());
}

#[test]
fn test_durations() {
    let config = Config::from_str(MINIMAL).unwrap();
    assert_eq!(
        config.egress.batch_interval(),
        std::time::Duration::from_millis(100)
    );
    assert_eq!(
        config.drains.backoff_base(),
        std::time::Duration::from_secs(1)
    );
    assert_eq!(
        config.drains.backoff_cap(),
        std::time::Duration::from_secs(60)
    );
}
