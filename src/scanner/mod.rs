//! Core functionality for actual scanning behaviour.
//!
//! A scan strategy is anything implementing [`PortScanner`]. The orchestrator
//! never inspects scanner types at runtime; it builds a [`Strategy`] from the
//! configured [`ScanType`] and drives it through the trait.
pub mod connect;
pub mod raw;
pub mod syn;

use std::future::Future;
use std::net::IpAddr;
use std::time::Duration;

use clap::ValueEnum;
use serde_derive::Deserialize;

use crate::error::Result;
use crate::results::ScanResult;

pub use connect::ConnectScanner;
pub use syn::SynScanner;

/// Capability shared by every scan strategy.
pub trait PortScanner {
    /// Scans `ports` on `host` in the given order.
    fn scan(
        &self,
        host: IpAddr,
        ports: &[u16],
    ) -> impl Future<Output = Result<ScanResult>> + Send;
}

/// Which strategy to run.
#[derive(Deserialize, Debug, ValueEnum, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    /// Full TCP connect per port.
    #[default]
    Connect,
    /// Half-open scan over a raw socket.
    Syn,
}

/// Tunables for both strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    /// Upper bound on a single connect attempt.
    pub connect_timeout: Duration,
    /// How long the SYN scanner waits for a reply to one SYN.
    pub syn_timeout: Duration,
    /// SYN attempts per port before it is declared filtered.
    pub syn_retries: u8,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(1500),
            syn_timeout: Duration::from_secs(10),
            syn_retries: 2,
        }
    }
}

/// The configured strategy, built fresh for every worker.
#[derive(Debug)]
pub enum Strategy {
    Connect(ConnectScanner),
    Syn(SynScanner),
}

impl Strategy {
    pub fn build(scan_type: ScanType, options: &ScanOptions) -> Self {
        match scan_type {
            ScanType::Connect => Strategy::Connect(ConnectScanner::new(options.connect_timeout)),
            ScanType::Syn => {
                Strategy::Syn(SynScanner::new(options.syn_timeout, options.syn_retries))
            }
        }
    }
}

impl PortScanner for Strategy {
    async fn scan(&self, host: IpAddr, ports: &[u16]) -> Result<ScanResult> {
        match self {
            Strategy::Connect(scanner) => scanner.scan(host, ports).await,
            Strategy::Syn(scanner) => scanner.scan(host, ports).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_follows_scan_type() {
        let options = ScanOptions::default();
        assert!(matches!(
            Strategy::build(ScanType::Connect, &options),
            Strategy::Connect(_)
        ));
        assert!(matches!(
            Strategy::build(ScanType::Syn, &options),
            Strategy::Syn(_)
        ));
    }

    #[test]
    fn default_options() {
        let options = ScanOptions::default();
        assert_eq!(options.syn_timeout, Duration::from_secs(10));
        assert_eq!(options.syn_retries, 2);
    }
}
