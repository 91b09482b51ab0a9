//! Scan outcome types.
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

use serde_derive::{Deserialize, Serialize};

/// Final state of one scanned port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortStatus {
    Open,
    Closed,
    Filtered,
}

impl fmt::Display for PortStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortStatus::Open => write!(f, "open"),
            PortStatus::Closed => write!(f, "closed"),
            PortStatus::Filtered => write!(f, "filtered"),
        }
    }
}

/// Outcome of the connectivity probe run before a host's ports are scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PingStatus {
    pub success: bool,
    pub latency_ms: u64,
}

impl PingStatus {
    pub fn up(latency_ms: u64) -> Self {
        Self {
            success: true,
            latency_ms,
        }
    }

    pub fn down() -> Self {
        Self {
            success: false,
            latency_ms: 0,
        }
    }
}

/// Everything learned about one host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanResult {
    pub host: IpAddr,
    pub ping: Option<PingStatus>,
    pub ports: BTreeMap<u16, PortStatus>,
    /// Set when the scan of this host could not run (e.g. no free source port).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl ScanResult {
    pub fn new(host: IpAddr) -> Self {
        Self {
            host,
            ping: None,
            ports: BTreeMap::new(),
            failure: None,
        }
    }

    pub fn with_ping(mut self, ping: PingStatus) -> Self {
        self.ping = Some(ping);
        self
    }

    pub fn failed(host: IpAddr, ping: Option<PingStatus>, reason: impl Into<String>) -> Self {
        Self {
            host,
            ping,
            ports: BTreeMap::new(),
            failure: Some(reason.into()),
        }
    }

    pub fn record(&mut self, port: u16, status: PortStatus) {
        self.ports.insert(port, status);
    }

    /// Ports with the given status, ascending.
    pub fn ports_with(&self, status: PortStatus) -> impl Iterator<Item = u16> + '_ {
        self.ports
            .iter()
            .filter(move |(_, s)| **s == status)
            .map(|(port, _)| *port)
    }
}
