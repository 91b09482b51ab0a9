//! Error types shared by the packet engine, the scanners and the orchestrator.

use std::io;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ScanError>;

/// Everything that can go wrong while configuring or running a scan.
#[derive(Error, Debug)]
pub enum ScanError {
    // === Configuration errors ===
    #[error("Wrong port number: {0} (ports must be between 1 and 65535)")]
    InvalidPort(u32),

    #[error("Wrong port range {lower}-{upper} (bounds must be between 1 and 65535)")]
    InvalidPortRange { lower: u32, upper: u32 },

    #[error("Worker count must be at least 1")]
    InvalidWorkerCount,

    #[error("Network {network} has more than {limit} addresses")]
    NetworkTooLarge { network: String, limit: usize },

    // === Packet errors ===
    #[error("Malformed {kind} header: expected at least {expected} bytes, got {actual}")]
    MalformedHeader {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    // === Resource errors ===
    #[error("Raw sockets require elevated privileges: {0}")]
    Privilege(#[source] io::Error),

    #[error("Could not obtain a free ephemeral port on {0}")]
    NoFreePort(std::net::IpAddr),

    #[error("Scan worker failed: {0}")]
    Worker(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ScanError {
    /// Errors that abort the whole run instead of degrading a single host.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScanError::InvalidPort(_)
                | ScanError::InvalidPortRange { .. }
                | ScanError::InvalidWorkerCount
                | ScanError::NetworkTooLarge { .. }
                | ScanError::Privilege(_)
        )
    }

    pub(crate) fn malformed(kind: &'static str, expected: usize, actual: usize) -> Self {
        ScanError::MalformedHeader {
            kind,
            expected,
            actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_and_privilege_errors_are_fatal() {
        assert!(ScanError::InvalidPort(0).is_fatal());
        assert!(ScanError::InvalidWorkerCount.is_fatal());
        assert!(ScanError::NetworkTooLarge {
            network: "10.0.0.0/8".to_owned(),
            limit: 1
        }
        .is_fatal());
        assert!(ScanError::Privilege(io::Error::from(io::ErrorKind::PermissionDenied)).is_fatal());
    }

    #[test]
    fn resource_errors_degrade() {
        let ip = "127.0.0.1".parse().unwrap();
        assert!(!ScanError::NoFreePort(ip).is_fatal());
        assert!(!ScanError::malformed("TCP", 20, 3).is_fatal());
    }

    #[test]
    fn malformed_header_message_names_sizes() {
        let msg = ScanError::malformed("IPv4", 20, 12).to_string();
        assert_eq!(
            msg,
            "Malformed IPv4 header: expected at least 20 bytes, got 12"
        );
    }
}
