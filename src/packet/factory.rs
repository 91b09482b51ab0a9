//! Assembles complete IPv4 + TCP datagrams for an `IP_HDRINCL` raw socket.
use std::net::Ipv4Addr;

use super::checksum::{build_pseudo_header, checksum, PSEUDO_HEADER_LEN};
use super::header::{Ipv4Header, TcpFlags, TcpHeader, IPV4_HEADER_LEN, TCP_HEADER_LEN};
use super::IPPROTO_TCP;

/// Header templates for one connection 4-tuple.
///
/// The factory is never mutated by [`PacketFactory::generate_packet`]; the
/// per-packet fields are passed in and every call returns a fresh buffer.
#[derive(Debug, Clone)]
pub struct PacketFactory {
    ip: Ipv4Header,
    tcp: TcpHeader,
}

impl PacketFactory {
    pub fn new(src_addr: Ipv4Addr, src_port: u16, dst_addr: Ipv4Addr, dst_port: u16) -> Self {
        Self {
            ip: Ipv4Header::new(src_addr, dst_addr),
            tcp: TcpHeader::new(src_port, dst_port),
        }
    }

    pub fn tcp_header(&self) -> &TcpHeader {
        &self.tcp
    }

    /// Builds `IP header || TCP header || payload` with a valid TCP checksum.
    ///
    /// The IP total length and header checksum are left at zero for the kernel.
    pub fn generate_packet(&self, flags: TcpFlags, seq: u32, payload: &[u8]) -> Vec<u8> {
        let mut tcp = self.tcp;
        tcp.flags = flags;
        tcp.seq_num = seq;
        tcp.checksum = 0;

        let segment_len = TCP_HEADER_LEN + payload.len();
        let pseudo = build_pseudo_header(
            self.ip.src_addr,
            self.ip.dst_addr,
            IPPROTO_TCP,
            segment_len as u16,
        );

        let mut sum_input = Vec::with_capacity(PSEUDO_HEADER_LEN + segment_len);
        sum_input.extend_from_slice(&pseudo);
        sum_input.extend_from_slice(&tcp.encode());
        sum_input.extend_from_slice(payload);
        tcp.checksum = checksum(&sum_input);

        let mut packet = Vec::with_capacity(IPV4_HEADER_LEN + segment_len);
        packet.extend_from_slice(&self.ip.encode());
        packet.extend_from_slice(&tcp.encode());
        packet.extend_from_slice(payload);
        packet
    }
}
