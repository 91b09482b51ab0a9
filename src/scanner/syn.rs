//! Half-open ("stealth") scanning.
//!
//! Every port goes through a small state machine:
//!
//! ```text
//! Init -> SendSyn -> AwaitResponse -+-> SendSyn            (timeout, attempts left)
//!                        ^          +-> Done(Filtered)     (timeout, no attempts left)
//!                        |          +-> Classify
//!                        +--- ignore ------+-> Done(Closed | Filtered)
//!                                          +-> Finalize -> Done(Open)
//! ```
//!
//! Only open ports get a RST in `Finalize`; the peer never sees a completed
//! handshake.
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddrV4};
use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use rand::Rng;

use super::raw::{self, RawSocketTransport, RawTransport};
use super::PortScanner;
use crate::error::{Result, ScanError};
use crate::packet::{
    icmp, IcmpVerdict, Ipv4Header, PacketFactory, TcpFlags, TcpHeader, IPPROTO_TCP, IPV4_HEADER_LEN,
};
use crate::results::{PortStatus, ScanResult};

const SEQ_RANGE: std::ops::Range<u32> = 100..1_000_000_000;
const RECV_BUFFER_LEN: usize = 65535;

#[derive(Debug, Clone)]
pub struct SynScanner {
    timeout: Duration,
    retries: u8,
}

impl SynScanner {
    /// `timeout` bounds each attempt, `retries` is the number of SYNs sent
    /// before a silent port is declared filtered (at least one is always sent).
    pub fn new(timeout: Duration, retries: u8) -> Self {
        Self { timeout, retries }
    }

    /// Fails with [`ScanError::Privilege`] when raw sockets cannot be opened.
    pub fn check_privileges() -> Result<()> {
        raw::check_raw_privileges()
    }

    fn attempts(&self) -> u8 {
        self.retries.max(1)
    }

    /// Scans `ports` on `target` in order over an already opened transport.
    ///
    /// The transport is re-bound to `local` before every port. A port whose
    /// exchange fails on I/O is recorded as filtered and the scan moves on.
    pub fn scan_with<T: RawTransport>(
        &self,
        transport: &mut T,
        local: SocketAddrV4,
        target: Ipv4Addr,
        ports: &[u16],
    ) -> Result<ScanResult> {
        let mut result = ScanResult::new(IpAddr::V4(target));
        let mut buf = vec![0u8; RECV_BUFFER_LEN];

        for &port in ports {
            if let Err(e) = transport.bind(local) {
                debug!("Re-binding raw socket to {} failed: {}", local, e);
            }

            let exchange = PortExchange {
                transport: &mut *transport,
                buf: &mut buf[..],
                factory: PacketFactory::new(*local.ip(), local.port(), target, port),
                expected: Expected {
                    target,
                    target_port: port,
                    local_port: local.port(),
                    seq: 0,
                },
                timeout: self.timeout,
                attempts: self.attempts(),
            };
            let status = match exchange.run() {
                Ok(status) => status,
                Err(e) => {
                    // The exchange never completed; nothing was learned about the port.
                    warn!("SYN exchange with {}:{} failed: {}", target, port, e);
                    PortStatus::Filtered
                }
            };
            debug!("{}:{} is {}", target, port, status);
            result.record(port, status);
        }

        Ok(result)
    }
}

impl PortScanner for SynScanner {
    async fn scan(&self, host: IpAddr, ports: &[u16]) -> Result<ScanResult> {
        let target = match host {
            IpAddr::V4(target) => target,
            IpAddr::V6(_) => {
                warn!("SYN scanning is IPv4 only, nothing learned about {}", host);
                return Ok(ScanResult::new(host));
            }
        };

        let scanner = self.clone();
        let ports = ports.to_vec();
        tokio::task::spawn_blocking(move || {
            let local_addr = raw::discover_local_addr();
            let local_port = raw::free_local_port(local_addr)?;
            let mut transport = RawSocketTransport::open()?;
            debug!(
                "SYN scanning {} from {}:{} ({} ports)",
                target,
                local_addr,
                local_port,
                ports.len()
            );
            scanner.scan_with(
                &mut transport,
                SocketAddrV4::new(local_addr, local_port),
                target,
                &ports,
            )
        })
        .await
        .map_err(|e| ScanError::Worker(e.to_string()))?
    }
}

/// States of one port's exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynState {
    Init,
    SendSyn { attempt: u8 },
    AwaitResponse { attempt: u8, deadline: Instant },
    /// A datagram of `len` bytes sits in the receive buffer.
    Classify { attempt: u8, deadline: Instant, len: usize },
    Finalize,
    Done(PortStatus),
}

/// What a reply must look like to belong to our probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expected {
    pub target: Ipv4Addr,
    pub target_port: u16,
    pub local_port: u16,
    /// Sequence number carried by our SYN.
    pub seq: u32,
}

/// Effect of one inbound datagram on the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// Unrelated traffic or noise; keep waiting.
    Ignore,
    Resolved(PortStatus),
}

/// Decides what an inbound datagram means for the probe described by `expected`.
pub fn classify_response(datagram: &[u8], expected: &Expected) -> Response {
    let ip = match Ipv4Header::decode(datagram) {
        Ok(ip) => ip,
        Err(e) => {
            trace!("Dropping undecodable datagram: {}", e);
            return Response::Ignore;
        }
    };

    if ip.src_addr != expected.target {
        trace!("Dropping datagram from {}", ip.src_addr);
        return Response::Ignore;
    }

    match icmp::classify(datagram) {
        Ok(IcmpVerdict::NotApplicable) => {}
        Ok(verdict) => {
            if !quotes_our_syn(datagram, expected) {
                trace!("Dropping ICMP error about another exchange");
                return Response::Ignore;
            }
            return match verdict {
                IcmpVerdict::Filtered => Response::Resolved(PortStatus::Filtered),
                _ => Response::Resolved(PortStatus::Closed),
            };
        }
        Err(e) => {
            trace!("Dropping truncated ICMP message: {}", e);
            return Response::Ignore;
        }
    }

    if ip.protocol != IPPROTO_TCP || ip.header_len() < IPV4_HEADER_LEN {
        return Response::Ignore;
    }

    let tcp = match datagram.get(ip.header_len()..).map(TcpHeader::decode) {
        Some(Ok(tcp)) => tcp,
        _ => {
            trace!("Dropping truncated TCP segment from {}", ip.src_addr);
            return Response::Ignore;
        }
    };

    if tcp.src_port != expected.target_port || tcp.dst_port != expected.local_port {
        trace!(
            "Dropping segment {} -> {}, not ours",
            tcp.src_port,
            tcp.dst_port
        );
        return Response::Ignore;
    }

    if tcp.is_syn_ack() && tcp.ack_num == expected.seq.wrapping_add(1) {
        Response::Resolved(PortStatus::Open)
    } else {
        debug!("Response from {}:{} is {:?}", ip.src_addr, tcp.src_port, tcp.flags);
        Response::Resolved(PortStatus::Closed)
    }
}

/// The ICMP error quotes the SYN sent for this port.
fn quotes_our_syn(datagram: &[u8], expected: &Expected) -> bool {
    icmp::quoted_segment(datagram).is_some_and(|quoted| {
        quoted.dst_addr == expected.target
            && quoted.src_port == expected.local_port
            && quoted.dst_port == expected.target_port
    })
}

/// One port's run through the state machine.
struct PortExchange<'a, T> {
    transport: &'a mut T,
    buf: &'a mut [u8],
    factory: PacketFactory,
    expected: Expected,
    timeout: Duration,
    attempts: u8,
}

impl<T: RawTransport> PortExchange<'_, T> {
    fn run(mut self) -> io::Result<PortStatus> {
        let mut state = SynState::Init;
        loop {
            state = match self.step(state)? {
                SynState::Done(status) => return Ok(status),
                next => next,
            };
        }
    }

    fn step(&mut self, state: SynState) -> io::Result<SynState> {
        let next = match state {
            SynState::Init => {
                self.expected.seq = rand::rng().random_range(SEQ_RANGE);
                SynState::SendSyn { attempt: 1 }
            }
            SynState::SendSyn { attempt } => {
                debug!(
                    "Sending SYN to {}:{} (attempt {}/{})",
                    self.expected.target, self.expected.target_port, attempt, self.attempts
                );
                let packet = self
                    .factory
                    .generate_packet(TcpFlags::SYN, self.expected.seq, &[]);
                self.transport.send(&packet, self.expected.target)?;
                SynState::AwaitResponse {
                    attempt,
                    deadline: Instant::now() + self.timeout,
                }
            }
            SynState::AwaitResponse { attempt, deadline } => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                let received = if remaining.is_zero() {
                    None
                } else {
                    self.transport.recv(self.buf, remaining)?
                };

                match received {
                    Some(len) => SynState::Classify {
                        attempt,
                        deadline,
                        len,
                    },
                    None if attempt < self.attempts => {
                        debug!(
                            "No response from {}:{}",
                            self.expected.target, self.expected.target_port
                        );
                        SynState::SendSyn {
                            attempt: attempt + 1,
                        }
                    }
                    None => SynState::Done(PortStatus::Filtered),
                }
            }
            SynState::Classify {
                attempt,
                deadline,
                len,
            } => match classify_response(&self.buf[..len], &self.expected) {
                Response::Ignore => SynState::AwaitResponse { attempt, deadline },
                Response::Resolved(PortStatus::Open) => SynState::Finalize,
                Response::Resolved(status) => SynState::Done(status),
            },
            SynState::Finalize => {
                debug!(
                    "Received SYN/ACK from {}:{}, sending RST",
                    self.expected.target, self.expected.target_port
                );
                let packet = self.factory.generate_packet(
                    TcpFlags::RST,
                    self.expected.seq.wrapping_add(1),
                    &[],
                );
                self.transport.send(&packet, self.expected.target)?;
                SynState::Done(PortStatus::Open)
            }
            SynState::Done(status) => SynState::Done(status),
        };
        Ok(next)
    }
}
