//! Fixed-layout IPv4 (RFC 791) and TCP (RFC 793) headers.
//!
//! Both headers are exactly 20 bytes on the wire and carry no options.
//! Multi-byte fields are big-endian.
use std::fmt;
use std::net::Ipv4Addr;

use super::IPPROTO_TCP;
use crate::error::{Result, ScanError};

pub const IPV4_HEADER_LEN: usize = 20;
pub const TCP_HEADER_LEN: usize = 20;

const DEFAULT_TTL: u8 = 255;
const DEFAULT_WINDOW: u16 = 5840;

/// IPv4 header without options.
///
/// `total_length` and `checksum` may be left at zero, in which case the kernel
/// fills them in when the datagram goes out through an `IP_HDRINCL` socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Header {
    pub version: u8,
    /// Header length in 32-bit words.
    pub ihl: u8,
    pub dscp_ecn: u8,
    pub total_length: u16,
    pub identification: u16,
    /// Flags (top 3 bits) and fragment offset, kept as one field.
    pub flags_fragment: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: u16,
    pub src_addr: Ipv4Addr,
    pub dst_addr: Ipv4Addr,
}

impl Ipv4Header {
    /// A TCP-carrying header with the defaults used for outbound probes.
    pub fn new(src_addr: Ipv4Addr, dst_addr: Ipv4Addr) -> Self {
        Self {
            version: 4,
            ihl: 5,
            dscp_ecn: 0,
            total_length: 0,
            identification: 0,
            flags_fragment: 0,
            ttl: DEFAULT_TTL,
            protocol: IPPROTO_TCP,
            checksum: 0,
            src_addr,
            dst_addr,
        }
    }

    /// Header length in bytes as announced by the IHL nibble.
    pub fn header_len(&self) -> usize {
        usize::from(self.ihl) * 4
    }

    pub fn encode(&self) -> [u8; IPV4_HEADER_LEN] {
        let mut bytes = [0u8; IPV4_HEADER_LEN];

        bytes[0] = (self.version << 4) | (self.ihl & 0x0F);
        bytes[1] = self.dscp_ecn;
        bytes[2..4].copy_from_slice(&self.total_length.to_be_bytes());
        bytes[4..6].copy_from_slice(&self.identification.to_be_bytes());
        bytes[6..8].copy_from_slice(&self.flags_fragment.to_be_bytes());
        bytes[8] = self.ttl;
        bytes[9] = self.protocol;
        bytes[10..12].copy_from_slice(&self.checksum.to_be_bytes());
        bytes[12..16].copy_from_slice(&self.src_addr.octets());
        bytes[16..20].copy_from_slice(&self.dst_addr.octets());

        bytes
    }

    /// Decodes the first 20 bytes of `bytes`. Trailing data is ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < IPV4_HEADER_LEN {
            return Err(ScanError::malformed("IPv4", IPV4_HEADER_LEN, bytes.len()));
        }

        Ok(Self {
            version: bytes[0] >> 4,
            ihl: bytes[0] & 0x0F,
            dscp_ecn: bytes[1],
            total_length: u16::from_be_bytes([bytes[2], bytes[3]]),
            identification: u16::from_be_bytes([bytes[4], bytes[5]]),
            flags_fragment: u16::from_be_bytes([bytes[6], bytes[7]]),
            ttl: bytes[8],
            protocol: bytes[9],
            checksum: u16::from_be_bytes([bytes[10], bytes[11]]),
            src_addr: Ipv4Addr::new(bytes[12], bytes[13], bytes[14], bytes[15]),
            dst_addr: Ipv4Addr::new(bytes[16], bytes[17], bytes[18], bytes[19]),
        })
    }
}

/// The eight TCP control bits, in wire order (FIN is bit 0, CWR is bit 7).
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TcpFlags(u8);

impl TcpFlags {
    pub const FIN: TcpFlags = TcpFlags(0x01);
    pub const SYN: TcpFlags = TcpFlags(0x02);
    pub const RST: TcpFlags = TcpFlags(0x04);
    pub const PSH: TcpFlags = TcpFlags(0x08);
    pub const ACK: TcpFlags = TcpFlags(0x10);
    pub const URG: TcpFlags = TcpFlags(0x20);
    pub const ECE: TcpFlags = TcpFlags(0x40);
    pub const CWR: TcpFlags = TcpFlags(0x80);

    pub const fn empty() -> Self {
        TcpFlags(0)
    }

    pub const fn from_bits(bits: u8) -> Self {
        TcpFlags(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True when every bit of `other` is set in `self`.
    pub const fn contains(self, other: TcpFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: TcpFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: TcpFlags) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for TcpFlags {
    type Output = TcpFlags;

    fn bitor(self, rhs: TcpFlags) -> TcpFlags {
        TcpFlags(self.0 | rhs.0)
    }
}

impl fmt::Debug for TcpFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [&str; 8] = ["FIN", "SYN", "RST", "PSH", "ACK", "URG", "ECE", "CWR"];

        let set: Vec<&str> = NAMES
            .iter()
            .enumerate()
            .filter(|(bit, _)| self.0 & (1 << bit) != 0)
            .map(|(_, name)| *name)
            .collect();

        if set.is_empty() {
            write!(f, "TcpFlags(empty)")
        } else {
            write!(f, "TcpFlags({})", set.join("|"))
        }
    }
}

/// TCP header without options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpHeader {
    pub src_port: u16,
    pub dst_port: u16,
    pub seq_num: u32,
    pub ack_num: u32,
    /// Header length in 32-bit words.
    pub data_offset: u8,
    /// Low nibble of byte 12, carried through untouched.
    pub reserved: u8,
    pub flags: TcpFlags,
    pub window: u16,
    pub checksum: u16,
    pub urgent_ptr: u16,
}

impl TcpHeader {
    pub fn new(src_port: u16, dst_port: u16) -> Self {
        Self {
            src_port,
            dst_port,
            seq_num: 0,
            ack_num: 0,
            data_offset: 5,
            reserved: 0,
            flags: TcpFlags::empty(),
            window: DEFAULT_WINDOW,
            checksum: 0,
            urgent_ptr: 0,
        }
    }

    /// SYN and ACK both set, i.e. the second leg of a handshake.
    pub fn is_syn_ack(&self) -> bool {
        self.flags.contains(TcpFlags::SYN | TcpFlags::ACK)
    }

    pub fn encode(&self) -> [u8; TCP_HEADER_LEN] {
        let mut bytes = [0u8; TCP_HEADER_LEN];

        bytes[0..2].copy_from_slice(&self.src_port.to_be_bytes());
        bytes[2..4].copy_from_slice(&self.dst_port.to_be_bytes());
        bytes[4..8].copy_from_slice(&self.seq_num.to_be_bytes());
        bytes[8..12].copy_from_slice(&self.ack_num.to_be_bytes());
        bytes[12] = (self.data_offset << 4) | (self.reserved & 0x0F);
        bytes[13] = self.flags.bits();
        bytes[14..16].copy_from_slice(&self.window.to_be_bytes());
        bytes[16..18].copy_from_slice(&self.checksum.to_be_bytes());
        bytes[18..20].copy_from_slice(&self.urgent_ptr.to_be_bytes());

        bytes
    }

    /// Decodes the first 20 bytes of `bytes`. Trailing data is ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < TCP_HEADER_LEN {
            return Err(ScanError::malformed("TCP", TCP_HEADER_LEN, bytes.len()));
        }

        Ok(Self {
            src_port: u16::from_be_bytes([bytes[0], bytes[1]]),
            dst_port: u16::from_be_bytes([bytes[2], bytes[3]]),
            seq_num: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            ack_num: u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            data_offset: bytes[12] >> 4,
            reserved: bytes[12] & 0x0F,
            flags: TcpFlags::from_bits(bytes[13]),
            window: u16::from_be_bytes([bytes[14], bytes[15]]),
            checksum: u16::from_be_bytes([bytes[16], bytes[17]]),
            urgent_ptr: u16::from_be_bytes([bytes[18], bytes[19]]),
        })
    }
}
