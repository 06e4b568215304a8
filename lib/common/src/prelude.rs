use std::time::Duration;

pub const DEFAULT_GRPC_LISTEN_PORT: u16 = 8081;
pub const DEFAULT_METRICS_LISTEN_PORT: u16 = 9090;

/// Upper bound on how long the metrics listener waits for open
/// connections once shutdown starts.
pub const DEFAULT_HTTP_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Component type advertised through the Info API.
pub const COMPONENT_TYPE: &str = "query";
