#[cfg(test)]
use super::*;

#[test]
fn test_read_config() {
    let config = r#"
      query_target_url: https://monitoring.googleapis.com/v1/projects/demo/location/global/prometheus
      auth:
        credentials_file: /etc/querybridge/credentials.json
        scopes:
          - https://www.googleapis.com/auth/monitoring.read
      timeout: 90s
      grpc:
        address: 127.0.0.1:10901
      metrics:
        port: 10902
        shutdown_grace: 2s
    "#;
    let config = BridgeConfig::from_yaml(config).unwrap();

    assert_eq!(
        config.backend.query_target_url.as_str(),
        "https://monitoring.googleapis.com/v1/projects/demo/location/global/prometheus"
    );
    assert_eq!(
        config.backend.auth,
        AuthConfig {
            credentials_file: Some("/etc/querybridge/credentials.json".into()),
            scopes: vec!["https://www.googleapis.com/auth/monitoring.read".into()],
        }
    );
    assert_eq!(config.backend.timeout, Some(Duration::from_secs(90)));
    assert_eq!(config.grpc.address(), "127.0.0.1:10901".parse().unwrap());
    assert_eq!(config.metrics.address(), "0.0.0.0:10902".parse().unwrap());
    assert_eq!(config.metrics.shutdown_grace, Duration::from_secs(2));
}

#[test]
fn test_defaults() {
    let config = BridgeConfig::from_yaml("query_target_url: http://localhost:9090").unwrap();
    assert_eq!(config.backend.query_target, "http://localhost:9090");

    assert_eq!(
        config.grpc.address(),
        SocketAddr::from(([0, 0, 0, 0], DEFAULT_GRPC_LISTEN_PORT))
    );
    assert_eq!(
        config.metrics.address(),
        SocketAddr::from(([0, 0, 0, 0], DEFAULT_METRICS_LISTEN_PORT))
    );
    assert_eq!(config.metrics.shutdown_grace, DEFAULT_HTTP_SHUTDOWN_GRACE);
    assert!(config.backend.auth.is_anonymous());
    assert_eq!(config.backend.timeout, None);
}

#[test]
fn test_missing_target_url() {
    let err = BridgeConfig::from_yaml("auth: { scopes: [a] }").unwrap_err();
    assert!(err.to_string().contains("query_target_url needs to be set"));

    let err = BridgeConfig::from_yaml("query_target_url: '  '").unwrap_err();
    assert!(err.to_string().contains("query_target_url needs to be set"));
}

#[test]
fn test_invalid_target_url() {
    assert!(BridgeConfig::from_yaml("query_target_url: not a url").is_err());
    assert!(BridgeConfig::from_yaml("query_target_url: ftp://example.com").is_err());
}

#[test]
fn test_unknown_fields_rejected() {
    let config = r#"
      query_target_url: http://localhost:9090
      query_target: http://localhost:9091
    "#;
    assert!(BridgeConfig::from_yaml(config).is_err());

    let config = r#"
      query_target_url: http://localhost:9090
      auth:
        credentials: /tmp/creds.json
    "#;
    assert!(BridgeConfig::from_yaml(config).is_err());
}

#[test]
fn test_empty_credentials_file_is_ambient() {
    let config = r#"
      query_target_url: http://localhost:9090
      auth:
        credentials_file: ""
        scopes: [https://www.googleapis.com/auth/monitoring.read]
    "#;
    let config = BridgeConfig::from_yaml(config).unwrap();
    assert_eq!(config.backend.auth.credentials_file, None);
    assert!(!config.backend.auth.is_anonymous());
}

#[test]
fn test_from_file() {
    use std::io::Write;

    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(file, "query_target_url: http://prometheus:9090").unwrap();
    writeln!(file, "grpc:\n  port: 19090").unwrap();

    let config = BridgeConfig::from_file(file.path()).unwrap();
    assert_eq!(config.backend.query_target_url.host_str(), Some("prometheus"));
    assert_eq!(config.grpc.address().port(), 19090);

    let missing = file.path().with_extension("missing.yaml");
    assert!(BridgeConfig::from_file(missing).is_err());
}

#[test]
fn test_from_json() {
    let config =
        BridgeConfig::from_json(r#"{"query_target_url": "http://localhost:9090", "timeout": "1m"}"#)
            .unwrap();
    assert_eq!(config.backend.timeout, Some(Duration::from_secs(60)));
}
