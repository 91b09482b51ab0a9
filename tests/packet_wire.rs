use std::net::Ipv4Addr;

use synscan::packet::{
    build_pseudo_header, checksum, Ipv4Header, PacketFactory, TcpFlags, TcpHeader, IPPROTO_TCP,
    IPV4_HEADER_LEN, TCP_HEADER_LEN,
};
use synscan::results::PortStatus;
use synscan::scanner::syn::{classify_response, Expected, Response};

const LOCAL: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 10);
const TARGET: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 20);

fn expected() -> Expected {
    Expected {
        target: TARGET,
        target_port: 443,
        local_port: 50_000,
        seq: 4242,
    }
}

/// What the target would send back to our probe.
fn reply(flags: TcpFlags, ack: u32) -> Vec<u8> {
    let mut tcp = TcpHeader::new(443, 50_000);
    tcp.flags = flags;
    tcp.ack_num = ack;

    let mut datagram = Ipv4Header::new(TARGET, LOCAL).encode().to_vec();
    datagram.extend_from_slice(&tcp.encode());
    datagram
}

#[test]
fn probe_segment_checksum_verifies() {
    let factory = PacketFactory::new(LOCAL, 50_000, TARGET, 443);
    let packet = factory.generate_packet(TcpFlags::SYN, 4242, b"");

    assert_eq!(packet.len(), IPV4_HEADER_LEN + TCP_HEADER_LEN);

    let segment = &packet[IPV4_HEADER_LEN..];
    let mut verify = build_pseudo_header(LOCAL, TARGET, IPPROTO_TCP, segment.len() as u16).to_vec();
    verify.extend_from_slice(segment);
    assert_eq!(checksum(&verify), 0);

    let tcp = TcpHeader::decode(segment).unwrap();
    assert_eq!(tcp.flags, TcpFlags::SYN);
    assert_eq!(tcp.seq_num, 4242);
    assert_eq!((tcp.src_port, tcp.dst_port), (50_000, 443));
}

#[test]
fn payload_is_covered_by_checksum() {
    let factory = PacketFactory::new(LOCAL, 50_000, TARGET, 443);
    let packet = factory.generate_packet(TcpFlags::PSH | TcpFlags::ACK, 1, b"hello");

    let segment = &packet[IPV4_HEADER_LEN..];
    assert_eq!(&segment[TCP_HEADER_LEN..], b"hello");

    let mut verify = build_pseudo_header(LOCAL, TARGET, IPPROTO_TCP, segment.len() as u16).to_vec();
    verify.extend_from_slice(segment);
    assert_eq!(checksum(&verify), 0);
}

#[test]
fn handshake_reply_means_open() {
    let datagram = reply(TcpFlags::SYN | TcpFlags::ACK, 4243);
    assert_eq!(
        classify_response(&datagram, &expected()),
        Response::Resolved(PortStatus::Open)
    );
}

#[test]
fn reset_means_closed() {
    let datagram = reply(TcpFlags::RST | TcpFlags::ACK, 4243);
    assert_eq!(
        classify_response(&datagram, &expected()),
        Response::Resolved(PortStatus::Closed)
    );
}

#[test]
fn stale_acknowledgement_means_closed() {
    let datagram = reply(TcpFlags::SYN | TcpFlags::ACK, 9999);
    assert_eq!(
        classify_response(&datagram, &expected()),
        Response::Resolved(PortStatus::Closed)
    );
}

#[test]
fn our_own_probe_is_ignored() {
    // Loopback captures echo our outbound SYN back to the raw socket.
    let factory = PacketFactory::new(LOCAL, 50_000, TARGET, 443);
    let packet = factory.generate_packet(TcpFlags::SYN, 4242, b"");
    assert_eq!(classify_response(&packet, &expected()), Response::Ignore);
}

#[test]
fn sequence_wraps_around() {
    let expected = Expected {
        seq: u32::MAX,
        ..expected()
    };
    let datagram = reply(TcpFlags::SYN | TcpFlags::ACK, 0);
    assert_eq!(
        classify_response(&datagram, &expected),
        Response::Resolved(PortStatus::Open)
    );
}
