//! Maps inbound ICMP errors onto port states.
use std::net::Ipv4Addr;

use super::header::{Ipv4Header, IPV4_HEADER_LEN};
use super::{IPPROTO_ICMP, IPPROTO_TCP};
use crate::error::{Result, ScanError};

const DESTINATION_UNREACHABLE: u8 = 3;
/// Type, code, checksum and the unused word before the quoted datagram.
const ICMP_HEADER_LEN: usize = 8;

/// Destination-unreachable codes that mean something is filtering the probe:
/// host, protocol and port unreachable, and the three administratively
/// prohibited variants.
const FILTERED_CODES: [u8; 6] = [1, 2, 3, 9, 10, 13];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpVerdict {
    /// Not an ICMP datagram; handle it as TCP.
    NotApplicable,
    /// Destination unreachable with a filtering code.
    Filtered,
    /// Any other ICMP message.
    Error,
}

/// Classifies a raw inbound IPv4 datagram.
pub fn classify(datagram: &[u8]) -> Result<IcmpVerdict> {
    let ip = Ipv4Header::decode(datagram)?;
    if ip.protocol != IPPROTO_ICMP {
        return Ok(IcmpVerdict::NotApplicable);
    }

    let offset = ip.header_len();
    let (icmp_type, icmp_code) = match datagram.get(offset..offset + 2) {
        Some(&[icmp_type, icmp_code]) => (icmp_type, icmp_code),
        _ => return Err(ScanError::malformed("ICMP", offset + 2, datagram.len())),
    };

    if icmp_type != DESTINATION_UNREACHABLE {
        return Ok(IcmpVerdict::Error);
    }

    if FILTERED_CODES.contains(&icmp_code) {
        Ok(IcmpVerdict::Filtered)
    } else {
        Ok(IcmpVerdict::Error)
    }
}

/// Addressing of the TCP segment an ICMP error message quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotedSegment {
    pub dst_addr: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
}

/// Reads the IP header and port pair of the datagram quoted after the ICMP
/// header. `None` if no TCP segment is quoted in full enough to tell.
pub fn quoted_segment(datagram: &[u8]) -> Option<QuotedSegment> {
    let outer = Ipv4Header::decode(datagram).ok()?;
    let quote = datagram.get(outer.header_len() + ICMP_HEADER_LEN..)?;

    let inner = Ipv4Header::decode(quote).ok()?;
    if inner.protocol != IPPROTO_TCP || inner.header_len() < IPV4_HEADER_LEN {
        return None;
    }

    match quote.get(inner.header_len()..inner.header_len() + 4)? {
        &[sp0, sp1, dp0, dp1] => Some(QuotedSegment {
            dst_addr: inner.dst_addr,
            src_port: u16::from_be_bytes([sp0, sp1]),
            dst_port: u16::from_be_bytes([dp0, dp1]),
        }),
        _ => None,
    }
}
