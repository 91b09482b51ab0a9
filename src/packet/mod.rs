//! Packet-level engine: header codec, Internet checksum, datagram assembly and
//! ICMP error classification.
//!
//! Everything in here is pure byte manipulation; no sockets are touched.
pub mod checksum;
pub mod factory;
pub mod header;
pub mod icmp;

pub use checksum::{build_pseudo_header, checksum};
pub use factory::PacketFactory;
pub use header::{Ipv4Header, TcpFlags, TcpHeader, IPV4_HEADER_LEN, TCP_HEADER_LEN};
pub use icmp::IcmpVerdict;

/// IANA protocol number for ICMP.
pub const IPPROTO_ICMP: u8 = 1;
/// IANA protocol number for TCP.
pub const IPPROTO_TCP: u8 = 6;
