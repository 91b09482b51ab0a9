//! Scan orchestration: target bookkeeping, probe gating and fan-out across
//! workers.
//!
//! Each worker owns a disjoint, round-robin slice of the hosts together with
//! its own scanner and probe, so nothing is shared while scans are in flight.
//! Results are only gathered once a worker has finished its whole slice.
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cidr_utils::cidr::IpCidr;
use log::{debug, info, warn};
use tokio::task::JoinSet;

use crate::error::{Result, ScanError};
use crate::probe::{Probe, TcpProbe};
use crate::results::ScanResult;
use crate::scanner::{PortScanner, ScanOptions, ScanType, Strategy, SynScanner};

const LOWEST_PORT_NUMBER: u32 = 1;
const TOP_PORT_NUMBER: u32 = 65535;
/// Largest network `add_target_network` expands (a /12 in IPv4).
pub const MAX_NETWORK_ADDRESSES: usize = 1 << 20;

#[derive(Debug)]
pub struct ScanManager<P = TcpProbe> {
    target_hosts: Vec<IpAddr>,
    target_ports: Vec<u16>,
    scan_type: ScanType,
    ping: bool,
    workers: usize,
    options: ScanOptions,
    probe: P,
    results: Vec<ScanResult>,
    scan_time: Duration,
}

impl ScanManager<TcpProbe> {
    /// A manager with no targets, using [`TcpProbe`] when `ping` is set.
    pub fn new(scan_type: ScanType, ping: bool, workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(ScanError::InvalidWorkerCount);
        }

        Ok(Self {
            target_hosts: Vec::new(),
            target_ports: Vec::new(),
            scan_type,
            ping,
            workers,
            options: ScanOptions::default(),
            probe: TcpProbe::default(),
            results: Vec::new(),
            scan_time: Duration::ZERO,
        })
    }
}

impl<P> ScanManager<P> {
    /// Replaces the connectivity probe. Every worker gets its own clone.
    pub fn with_probe<Q>(self, probe: Q) -> ScanManager<Q> {
        ScanManager {
            target_hosts: self.target_hosts,
            target_ports: self.target_ports,
            scan_type: self.scan_type,
            ping: self.ping,
            workers: self.workers,
            options: self.options,
            probe,
            results: self.results,
            scan_time: self.scan_time,
        }
    }

    pub fn set_scan_options(&mut self, options: ScanOptions) {
        self.options = options;
    }

    pub fn set_workers(&mut self, workers: usize) -> Result<()> {
        if workers == 0 {
            return Err(ScanError::InvalidWorkerCount);
        }
        self.workers = workers;
        Ok(())
    }

    pub fn add_target_host(&mut self, host: IpAddr) {
        self.target_hosts.push(host);
    }

    /// Adds every host address of `network`.
    ///
    /// For IPv4 networks with more than two addresses the network and
    /// broadcast addresses are left out. Networks with more than
    /// `MAX_NETWORK_ADDRESSES` addresses are refused.
    pub fn add_target_network(&mut self, network: &IpCidr) -> Result<()> {
        let total = network.iter().take(MAX_NETWORK_ADDRESSES + 1).count();
        if total > MAX_NETWORK_ADDRESSES {
            return Err(ScanError::NetworkTooLarge {
                network: network.to_string(),
                limit: MAX_NETWORK_ADDRESSES,
            });
        }

        let hosts = network.iter().map(|inet| inet.address());
        let before = self.target_hosts.len();
        if total > 2 && matches!(network, IpCidr::V4(_)) {
            self.target_hosts.extend(hosts.skip(1).take(total - 2));
        } else {
            self.target_hosts.extend(hosts);
        }
        debug!(
            "Network {} expands to {} hosts",
            network,
            self.target_hosts.len() - before
        );
        Ok(())
    }

    /// Sets an explicit port list, scanned in the given order.
    pub fn set_target_ports(&mut self, ports: &[u32]) -> Result<()> {
        let ports = ports
            .iter()
            .map(|&port| {
                if (LOWEST_PORT_NUMBER..=TOP_PORT_NUMBER).contains(&port) {
                    Ok(port as u16)
                } else {
                    Err(ScanError::InvalidPort(port))
                }
            })
            .collect::<Result<Vec<u16>>>()?;

        self.target_ports = ports;
        Ok(())
    }

    /// Sets an inclusive port range. Reversed bounds are swapped.
    pub fn set_target_port_range(&mut self, lower: u32, upper: u32) -> Result<()> {
        let valid = LOWEST_PORT_NUMBER..=TOP_PORT_NUMBER;
        if !valid.contains(&lower) || !valid.contains(&upper) {
            return Err(ScanError::InvalidPortRange { lower, upper });
        }

        let (lower, upper) = if lower > upper {
            (upper, lower)
        } else {
            (lower, upper)
        };
        self.target_ports = (lower as u16..=upper as u16).collect();
        Ok(())
    }

    pub fn target_hosts(&self) -> &[IpAddr] {
        &self.target_hosts
    }

    pub fn target_ports(&self) -> &[u16] {
        &self.target_ports
    }

    pub fn get_results(&self) -> &[ScanResult] {
        &self.results
    }

    pub fn get_scan_time(&self) -> Duration {
        self.scan_time
    }

    /// Forgets previous results so `scan_all` can run again.
    pub fn clear_results(&mut self) {
        self.results.clear();
        self.scan_time = Duration::ZERO;
    }
}

impl<P> ScanManager<P>
where
    P: Probe + Clone + Send + Sync + 'static,
{
    /// Scans every target host and stores the results and elapsed time.
    ///
    /// Fails only on errors that make the whole run pointless, such as missing
    /// raw socket privileges; per-host failures end up in that host's result.
    pub async fn scan_all(&mut self) -> Result<()> {
        if self.scan_type == ScanType::Syn && self.target_hosts.iter().any(IpAddr::is_ipv4) {
            SynScanner::check_privileges()?;
        }

        info!(
            "Scanning {} hosts x {} ports ({:?}, {} workers, ping {})",
            self.target_hosts.len(),
            self.target_ports.len(),
            self.scan_type,
            self.workers,
            self.ping
        );

        let start = Instant::now();
        let results = if self.workers == 1 {
            self.scan_single_worker().await?
        } else {
            self.scan_multi_worker().await?
        };
        self.scan_time = start.elapsed();
        self.results.extend(results);

        info!("Scan finished in {:?}", self.scan_time);
        Ok(())
    }

    async fn scan_single_worker(&self) -> Result<Vec<ScanResult>> {
        let probe = self.ping.then(|| self.probe.clone());
        scan_slice(
            Strategy::build(self.scan_type, &self.options),
            probe,
            self.target_hosts.clone(),
            Arc::from(self.target_ports.as_slice()),
        )
        .await
    }

    async fn scan_multi_worker(&self) -> Result<Vec<ScanResult>> {
        let (scan_type, options) = (self.scan_type, self.options);
        fan_out(
            partition(&self.target_hosts, self.workers),
            move || Strategy::build(scan_type, &options),
            self.ping.then(|| self.probe.clone()),
            Arc::from(self.target_ports.as_slice()),
        )
        .await
    }
}

/// Runs one task per non-empty slice, each with a scanner from `build` and its
/// own probe clone, and concatenates their results as they finish.
///
/// A fatal error from any worker fails the whole batch once all have finished.
async fn fan_out<S, P>(
    slices: Vec<Vec<IpAddr>>,
    build: impl Fn() -> S,
    probe: Option<P>,
    ports: Arc<[u16]>,
) -> Result<Vec<ScanResult>>
where
    S: PortScanner + Send + Sync + 'static,
    P: Probe + Clone + Send + Sync + 'static,
{
    let mut set = JoinSet::new();
    let mut host_count = 0;

    for (worker, hosts) in slices
        .into_iter()
        .enumerate()
        .filter(|(_, hosts)| !hosts.is_empty())
    {
        debug!("Worker {} takes {} hosts", worker, hosts.len());
        host_count += hosts.len();
        set.spawn(scan_slice(build(), probe.clone(), hosts, Arc::clone(&ports)));
    }

    let mut results = Vec::with_capacity(host_count);
    let mut fatal = None;
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Ok(slice)) => results.extend(slice),
            Ok(Err(e)) => {
                fatal.get_or_insert(e);
            }
            Err(e) => {
                fatal.get_or_insert(ScanError::Worker(e.to_string()));
            }
        }
    }

    match fatal {
        Some(e) => Err(e),
        None => Ok(results),
    }
}

/// Splits `items` into `n` interleaved slices: item `i` lands in slice `i % n`.
pub fn partition<T: Clone>(items: &[T], n: usize) -> Vec<Vec<T>> {
    let n = n.max(1);
    let mut slices = vec![Vec::with_capacity(items.len() / n + 1); n];
    for (i, item) in items.iter().enumerate() {
        slices[i % n].push(item.clone());
    }
    slices
}

/// One worker: a private scanner and probe run over `hosts` in order.
async fn scan_slice<S: PortScanner, P: Probe>(
    scanner: S,
    probe: Option<P>,
    hosts: Vec<IpAddr>,
    ports: Arc<[u16]>,
) -> Result<Vec<ScanResult>> {
    let mut results = Vec::with_capacity(hosts.len());
    for host in hosts {
        results.push(scan_host(&scanner, probe.as_ref(), host, &ports).await?);
    }
    Ok(results)
}

/// Probes `host` if asked to, then scans it unless the probe failed.
async fn scan_host<S: PortScanner, P: Probe>(
    scanner: &S,
    probe: Option<&P>,
    host: IpAddr,
    ports: &[u16],
) -> Result<ScanResult> {
    let ping = match probe {
        Some(probe) => Some(probe.probe(host).await),
        None => None,
    };

    if let Some(ping) = ping.filter(|ping| !ping.success) {
        info!("Host {} did not answer the probe, skipping its ports", host);
        return Ok(ScanResult::new(host).with_ping(ping));
    }

    match scanner.scan(host, ports).await {
        Ok(mut result) => {
            result.ping = ping;
            Ok(result)
        }
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!("Scan of {} failed: {}", host, e);
            Ok(ScanResult::failed(host, ping, e.to_string()))
        }
    }
}
