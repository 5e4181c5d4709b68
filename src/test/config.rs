use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use crate::config::{ConfigError, MonitorConfig, DEFAULT_EVCAP_PORT, DEFAULT_HISTORY_LEN};
use crate::link::{read_link, LinkLookup};

#[test]
fn minimal_config_fills_defaults() {
    let cfg = MonitorConfig::from_json(r#"{"schema_version":1,"links":[{"name":"bottleneck"}]}"#)
        .expect("config");
    assert!(cfg.control.is_none());
    let link = &cfg.links[0];
    assert_eq!(link.bind, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    assert_eq!(link.port, DEFAULT_EVCAP_PORT);
    assert_eq!(link.data_queue, 2);
    assert_eq!(link.history_len, DEFAULT_HISTORY_LEN);
    assert_eq!(link.rate_limit_kbps, None);
    assert_eq!(link.addr().port(), DEFAULT_EVCAP_PORT);
}

#[test]
fn data_queue_out_of_range_is_rejected() {
    let err = MonitorConfig::from_json(
        r#"{"schema_version":1,"links":[{"name":"a","data_queue":8}]}"#,
    )
    .expect_err("data_queue 8");
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn duplicate_ports_are_rejected_but_zero_may_repeat() {
    let err = MonitorConfig::from_json(
        r#"{"schema_version":1,"links":[{"name":"a","port":5000},{"name":"b","port":5000}]}"#,
    )
    .expect_err("duplicate port");
    assert!(matches!(err, ConfigError::Invalid(_)));

    MonitorConfig::from_json(
        r#"{"schema_version":1,"links":[{"name":"a","port":0},{"name":"b","port":0}]}"#,
    )
    .expect("ephemeral ports");
}

#[test]
fn empty_links_and_zero_history_are_rejected() {
    let err = MonitorConfig::from_json(r#"{"schema_version":1,"links":[]}"#).expect_err("empty");
    assert!(matches!(err, ConfigError::Invalid(_)));

    let err = MonitorConfig::from_json(
        r#"{"schema_version":1,"links":[{"name":"a","history_len":0}]}"#,
    )
    .expect_err("history 0");
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn malformed_json_is_a_parse_error() {
    let err = MonitorConfig::from_json("{not json").expect_err("parse");
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn missing_file_is_a_read_error() {
    let err = MonitorConfig::load("/definitely/not/here.json").expect_err("missing");
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn control_section_converts_to_opts() {
    let cfg = MonitorConfig::from_json(
        r#"{"schema_version":1,"links":[{"name":"a"}],
            "control":{"io_timeout_ms":250}}"#,
    )
    .expect("config");
    let control = cfg.control.expect("control");
    assert_eq!(control.addr, "127.0.0.1:10272");
    let opts = control.opts();
    assert_eq!(opts.connect_timeout, None);
    assert_eq!(opts.io_timeout, Some(Duration::from_millis(250)));
}

#[test]
fn registry_follows_config_order() {
    let cfg = MonitorConfig::from_json(
        r#"{"schema_version":1,"links":[
            {"name":"uplink","port":0,"data_queue":1,"rate_limit_kbps":100000},
            {"name":"downlink","port":0,"history_len":16}
        ]}"#,
    )
    .expect("config");
    let registry = cfg.build_registry();
    assert_eq!(registry.len(), 2);

    let first = registry.link(0).expect("link 0");
    let first = read_link(&first);
    assert_eq!(first.name(), "uplink");
    assert_eq!(first.data_queue(), 1);
    assert_eq!(first.rate_limit_kbps(), Some(100_000));
    drop(first);

    let second = registry.find("downlink").expect("by name");
    assert_eq!(read_link(&second).history(2).expect("history").capacity_points(), 16);
    assert!(registry.link(2).is_none());
}

#[test]
fn single_link_config_is_valid() {
    let cfg = MonitorConfig::single_link("cli", IpAddr::V4(Ipv4Addr::LOCALHOST), 0, 3);
    cfg.validate().expect("valid");
    assert_eq!(cfg.links[0].decoder().data_queue(), 3);
}
