//! Host and port reachability scanning with two interchangeable strategies:
//! a full TCP connect per port and a half-open SYN scan over a raw socket.
//!
//! ## Architecture Overview
//!
//! Scans are driven by [`ScanManager`](crate::manager::ScanManager), which
//! holds the targets and fans hosts out across workers. Each worker builds a
//! [`Strategy`](crate::scanner::Strategy) from the configured
//! [`ScanType`](crate::scanner::ScanType) and drives it through the
//! [`PortScanner`](crate::scanner::PortScanner) trait:
//!
//! 1. **Input Processing**: addresses and port lists are parsed and validated
//! 2. **Probing**: hosts may be probed first and skipped when they do not answer
//! 3. **Port Scanning**: every port ends up open, closed or filtered
//! 4. **Result Processing**: per-host [`ScanResult`](crate::results::ScanResult)s
//!    are printed for people, for grep, or as JSON
//!
//! The SYN strategy crafts its own IPv4/TCP datagrams with the codec in
//! [`packet`] and needs raw socket privileges.
//!
//! ## Basic Usage Example
//!
//! ```rust,no_run
//! use synscan::manager::ScanManager;
//! use synscan::scanner::ScanType;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut manager = ScanManager::new(ScanType::Connect, false, 4)?;
//!     manager.add_target_host("127.0.0.1".parse()?);
//!     manager.set_target_port_range(1, 1_000)?;
//!
//!     manager.scan_all().await?;
//!
//!     for result in manager.get_results() {
//!         let open: Vec<u16> = result.ports_with(synscan::results::PortStatus::Open).collect();
//!         println!("{}: {:?}", result.host, open);
//!     }
//!     println!("took {:?}", manager.get_scan_time());
//!     Ok(())
//! }
//! ```
#![allow(clippy::needless_doctest_main)]

pub mod address;

pub mod error;

pub mod input;

pub mod manager;

pub mod output;

pub mod packet;

pub mod probe;

pub mod results;

pub mod scanner;
