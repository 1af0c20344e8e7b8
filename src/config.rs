use std::time::Duration;

/// Timing knobs for probes and pool shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanConfig {
    /// Upper bound for resolving the target host once, before any probe runs.
    pub resolve_timeout: Duration,
    /// Upper bound for a TCP connect.
    pub tcp_connect_timeout: Duration,
    /// How long a UDP probe waits for a reply before reporting open|filtered.
    pub udp_receive_timeout: Duration,
    /// How long shutdown waits for in-flight probes before aborting them.
    pub shutdown_grace: Duration,
}

impl ScanConfig {
    pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_TCP_CONNECT_TIMEOUT: Duration = Duration::from_millis(500);
    pub const DEFAULT_UDP_RECEIVE_TIMEOUT: Duration = Duration::from_millis(1000);
    pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(60);
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            resolve_timeout: Self::DEFAULT_RESOLVE_TIMEOUT,
            tcp_connect_timeout: Self::DEFAULT_TCP_CONNECT_TIMEOUT,
            udp_receive_timeout: Self::DEFAULT_UDP_RECEIVE_TIMEOUT,
            shutdown_grace: Self::DEFAULT_SHUTDOWN_GRACE,
        }
    }
}
