//! Raw IPv4 socket plumbing for the half-open scanner.
//!
//! Requires CAP_NET_RAW on Linux or root elsewhere.
use std::io::{self, Read};
use std::iter;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4, TcpListener, UdpSocket};
use std::time::{Duration, Instant};

use log::debug;
use rand::Rng;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::error::{Result, ScanError};

/// Ephemeral port range (RFC 6335).
const EPHEMERAL_PORTS: std::ops::RangeInclusive<u16> = 49152..=65535;
const MAX_PORT_ATTEMPTS: usize = 128;
/// Any address outside the local network works; nothing is ever sent to it.
const ROUTE_PROBE_ADDR: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::new(10, 254, 254, 254), 1);
/// Granularity at which the TCP and ICMP sockets are polled in turn.
const POLL_SLICE: Duration = Duration::from_millis(20);

/// Datagram I/O the SYN state machine runs over.
pub trait RawTransport {
    /// Binds the transport to the local endpoint used as the probe source.
    fn bind(&mut self, local: SocketAddrV4) -> io::Result<()>;

    /// Sends a complete IPv4 datagram (header included) to `dst`.
    fn send(&mut self, packet: &[u8], dst: Ipv4Addr) -> io::Result<()>;

    /// Waits at most `timeout` for the next inbound datagram and copies it,
    /// IP header included, into `buf`. `Ok(None)` means nothing arrived.
    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<Option<usize>>;
}

/// A raw TCP socket with `IP_HDRINCL`, plus a raw ICMP socket for
/// destination-unreachable errors when the platform allows one.
#[derive(Debug)]
pub struct RawSocketTransport {
    tcp: Socket,
    icmp: Option<Socket>,
}

impl RawSocketTransport {
    pub fn open() -> Result<Self> {
        let tcp = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::TCP))
            .map_err(privilege_error)?;
        tcp.set_header_included(true)?;

        let icmp = match Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4)) {
            Ok(socket) => Some(socket),
            Err(e) => {
                debug!("ICMP socket unavailable, unreachable errors will go unseen: {}", e);
                None
            }
        };

        Ok(Self { tcp, icmp })
    }

    fn sockets(&self) -> impl Iterator<Item = &Socket> {
        iter::once(&self.tcp).chain(self.icmp.as_ref())
    }
}

impl RawTransport for RawSocketTransport {
    fn bind(&mut self, local: SocketAddrV4) -> io::Result<()> {
        self.tcp.bind(&SockAddr::from(local))
    }

    fn send(&mut self, packet: &[u8], dst: Ipv4Addr) -> io::Result<()> {
        // The port is meaningless for a raw socket.
        let dst = SockAddr::from(SocketAddrV4::new(dst, 0));
        self.tcp.send_to(packet, &dst).map(|_| ())
    }

    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<Option<usize>> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            // A zero SO_RCVTIMEO would block forever.
            let slice = remaining.clamp(Duration::from_millis(1), POLL_SLICE);

            for mut socket in self.sockets() {
                socket.set_read_timeout(Some(slice))?;
                match socket.read(buf) {
                    Ok(len) => return Ok(Some(len)),
                    Err(e) if is_timeout(&e) => continue,
                    Err(e) => return Err(e),
                }
            }
        }
    }
}

/// Opens and drops a raw socket, surfacing missing privileges up front.
pub fn check_raw_privileges() -> Result<()> {
    Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::TCP))
        .map(drop)
        .map_err(privilege_error)
}

/// Local address the kernel would route outbound traffic from.
///
/// Connects a UDP socket (which sends nothing) and reads back its local
/// address, falling back to loopback.
pub fn discover_local_addr() -> Ipv4Addr {
    let probe = || -> io::Result<SocketAddr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect(ROUTE_PROBE_ADDR)?;
        socket.local_addr()
    };

    match probe() {
        Ok(SocketAddr::V4(addr)) if !addr.ip().is_unspecified() => *addr.ip(),
        Ok(other) => {
            debug!("Unexpected local address {}, falling back to loopback", other);
            Ipv4Addr::LOCALHOST
        }
        Err(e) => {
            debug!("Outbound route discovery failed ({}), falling back to loopback", e);
            Ipv4Addr::LOCALHOST
        }
    }
}

/// Finds an ephemeral port on `addr` that no local socket is using.
///
/// Ports already in use are skipped; any other bind error gives up.
pub fn free_local_port(addr: Ipv4Addr) -> Result<u16> {
    let mut rng = rand::rng();
    for _ in 0..MAX_PORT_ATTEMPTS {
        let port = rng.random_range(EPHEMERAL_PORTS);
        match TcpListener::bind((addr, port)) {
            Ok(_listener) => return Ok(port),
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => continue,
            Err(e) => {
                debug!("Binding {}:{} failed: {}", addr, port, e);
                return Err(ScanError::NoFreePort(IpAddr::V4(addr)));
            }
        }
    }
    Err(ScanError::NoFreePort(IpAddr::V4(addr)))
}

fn privilege_error(e: io::Error) -> ScanError {
    if e.kind() == io::ErrorKind::PermissionDenied {
        ScanError::Privilege(e)
    } else {
        ScanError::Io(e)
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}
