//! Integration tests for metrics server functionality.

use logsieve_core::config::MetricsConfig;
use logsieve_daemon::metrics_server;
use serial_test::serial;

#[test]
#[serial]
fn install_metrics_recorder_fails_with_invalid_address() {
    let config = MetricsConfig {
        enabled: true,
        listen_addr: "999.999.999.999".to_owned(),
        port: 9100,
        endpoint: "/metrics".to_owned(),
    };

    let result = metrics_server::install_metrics_recorder(&config);
    assert!(result.is_err(), "invalid address should be rejected");
}

#[test]
#[serial]
fn install_metrics_recorder_rejects_unsupported_endpoint() {
    let config = MetricsConfig {
        enabled: true,
        listen_addr: "127.0.0.1".to_owned(),
        port: 19101,
        endpoint: "/custom".to_owned(),
    };

    let err = metrics_server::install_metrics_recorder(&config)
        .expect_err("custom endpoint should be rejected");
    assert!(err.to_string().contains("unsupported metrics endpoint"));
}

#[tokio::test]
#[serial]
async fn install_metrics_recorder_succeeds_with_valid_config() {
    let config = MetricsConfig {
        enabled: true,
        listen_addr: "127.0.0.1".to_owned(),
        port: 19100,
        endpoint: "/metrics".to_owned(),
    };

    let result = metrics_server::install_metrics_recorder(&config);
    assert!(
        result.is_ok(),
        "install_metrics_recorder should succeed with valid config: {:?}",
        result.err()
    );
}
