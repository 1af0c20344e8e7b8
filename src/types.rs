use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ScanError;

/// Transport protocol of a single probe.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => f.write_str("TCP"),
            Protocol::Udp => f.write_str("UDP"),
        }
    }
}

/// Which protocols a scan covers.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolSelection {
    #[default]
    Tcp,
    Udp,
    Both,
}

impl ProtocolSelection {
    /// Protocols in submission order: TCP first, then UDP.
    pub fn protocols(self) -> &'static [Protocol] {
        match self {
            ProtocolSelection::Tcp => &[Protocol::Tcp],
            ProtocolSelection::Udp => &[Protocol::Udp],
            ProtocolSelection::Both => &[Protocol::Tcp, Protocol::Udp],
        }
    }
}

impl fmt::Display for ProtocolSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolSelection::Tcp => f.write_str("TCP"),
            ProtocolSelection::Udp => f.write_str("UDP"),
            ProtocolSelection::Both => f.write_str("TCP+UDP"),
        }
    }
}

/// Reported state of a port that produced a result.
///
/// Closed ports never produce a result, so there is no `Closed` variant.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortState {
    #[serde(rename = "open")]
    Open,
    /// UDP only: nothing came back before the receive timeout.
    #[serde(rename = "open|filtered")]
    OpenFiltered,
}

impl PortState {
    pub fn as_str(self) -> &'static str {
        match self {
            PortState::Open => "open",
            PortState::OpenFiltered => "open|filtered",
        }
    }
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One open (or ambiguous) port.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PortResult {
    pub port: u16,
    pub protocol: Protocol,
    pub service: String,
    pub state: PortState,
}

impl fmt::Display for PortResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Port {} ({}): {} - {}",
            self.port, self.protocol, self.service, self.state
        )
    }
}

/// The atomic unit of work: one port over one protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeTask {
    pub port: u16,
    pub protocol: Protocol,
}

/// Largest accepted concurrency limit: one in-flight probe per task of a full
/// TCP+UDP sweep.
pub const MAX_CONCURRENCY: usize = 65535 * 2;

/// Caller-supplied scan parameters, immutable for the duration of a scan.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub host: String,
    pub start_port: u16,
    pub end_port: u16,
    #[serde(default)]
    pub protocol: ProtocolSelection,
    /// Maximum number of probes in flight at once.
    pub concurrency: usize,
}

impl ScanRequest {
    pub fn new(host: impl Into<String>, start_port: u16, end_port: u16) -> Self {
        Self {
            host: host.into(),
            start_port,
            end_port,
            protocol: ProtocolSelection::Tcp,
            concurrency: 10,
        }
    }

    pub fn with_protocol(mut self, protocol: ProtocolSelection) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Reject requests the coordinator cannot run meaningfully.
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.host.trim().is_empty() {
            return Err(ScanError::EmptyHost);
        }
        if self.start_port == 0 || self.start_port > self.end_port {
            return Err(ScanError::InvalidPortRange {
                start: self.start_port,
                end: self.end_port,
            });
        }
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(ScanError::InvalidConcurrency {
                value: self.concurrency,
                max: MAX_CONCURRENCY,
            });
        }
        Ok(())
    }

    /// Number of probes this request dispatches when run to completion.
    pub fn total_tasks(&self) -> u64 {
        let ports = u64::from(self.end_port.saturating_sub(self.start_port)) + 1;
        ports * self.protocol.protocols().len() as u64
    }

    /// Work set in submission order: ascending ports per protocol, TCP before UDP.
    pub fn tasks(&self) -> impl Iterator<Item = ProbeTask> + '_ {
        self.protocol.protocols().iter().flat_map(move |&protocol| {
            (self.start_port..=self.end_port).map(move |port| ProbeTask { port, protocol })
        })
    }
}
