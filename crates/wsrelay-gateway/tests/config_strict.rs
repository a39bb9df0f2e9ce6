#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::time::Duration;

use wsrelay_gateway::config;
use wsrelay_gateway::session::{BackoffPolicy, SessionConfig};

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
relay:
  url: "ws://relay.local/ws"
  heartbeat_intervall_ms: 1000 # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.code().as_str(), "CONFIG");
}

#[test]
fn ok_minimal_config() {
    let ok = r#"
version: 1
relay:
  url: "wss://relay.local/ws"
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.relay.heartbeat_interval(), Duration::from_secs(30));
    assert_eq!(cfg.relay.read_timeout(), Duration::from_secs(40));
    assert_eq!(cfg.relay.reconnect_backoff(), Duration::from_secs(5));
    assert_eq!(cfg.relay.max_inflight, 8);
    assert!(!cfg.relay.strict_liveness);
    assert_eq!(cfg.backend.base_url, "http://127.0.0.1:11434");
    assert!(!cfg.hub.enabled);

    let session = SessionConfig::from(&cfg.relay);
    assert_eq!(session.request_timeout, Duration::from_secs(30));
    assert_eq!(
        BackoffPolicy::from(&cfg.relay),
        BackoffPolicy::fixed(Duration::from_secs(5))
    );
}

#[test]
fn unsupported_version_is_rejected() {
    let err = config::load_from_str("version: 2\nrelay:\n  url: \"ws://x\"\n").expect_err("must fail");
    assert_eq!(err.code().as_str(), "UNSUPPORTED_VERSION");
}

#[test]
fn read_timeout_must_exceed_heartbeat() {
    let bad = r#"
version: 1
relay:
  url: "ws://relay.local/ws"
  heartbeat_interval_ms: 30000
  read_timeout_ms: 30000
"#;
    let err = config::load_from_str(bad).expect_err("must fail");
    assert!(err.to_string().contains("read_timeout_ms"));
}

#[test]
fn relay_url_must_be_websocket() {
    let bad = "version: 1\nrelay:\n  url: \"http://relay.local\"\n";
    assert!(config::load_from_str(bad).is_err());
}

#[test]
fn hub_listen_checked_only_when_enabled() {
    let disabled = r#"
version: 1
relay:
  url: "ws://relay.local/ws"
hub:
  listen: "not an address"
"#;
    assert!(config::load_from_str(disabled).is_ok());

    let enabled = r#"
version: 1
relay:
  url: "ws://relay.local/ws"
hub:
  enabled: true
  listen: "not an address"
"#;
    assert!(config::load_from_str(enabled).is_err());
}

#[test]
fn max_backoff_selects_doubling_policy() {
    let cfg = config::load_from_str(
        r#"
version: 1
relay:
  url: "ws://relay.local/ws"
  reconnect_backoff_ms: 1000
  reconnect_max_backoff_ms: 5000
"#,
    )
    .expect("must parse");
    let policy = BackoffPolicy::from(&cfg.relay);
    assert_eq!(policy.delay(1), Duration::from_secs(1));
    assert_eq!(policy.delay(2), Duration::from_secs(2));
    assert_eq!(policy.delay(3), Duration::from_secs(4));
    assert_eq!(policy.delay(4), Duration::from_secs(5));
    assert_eq!(policy.delay(40), Duration::from_secs(5));
}
