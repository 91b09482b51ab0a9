use std::collections::HashSet;
use std::net::IpAddr;
use std::time::Duration;

use tokio::net::TcpListener;

use synscan::error::ScanError;
use synscan::manager::ScanManager;
use synscan::probe::NoProbe;
use synscan::results::{PingStatus, PortStatus, ScanResult};
use synscan::scanner::{ScanOptions, ScanType};

/// Loopback aliases; every 127/8 address answers on Linux.
fn hosts() -> Vec<IpAddr> {
    (1..=6).map(|i| IpAddr::from([127, 0, 0, i])).collect()
}

async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

async fn run(workers: usize, ports: &[u32]) -> Vec<ScanResult> {
    let mut manager = ScanManager::new(ScanType::Connect, false, workers).unwrap();
    manager.set_scan_options(ScanOptions {
        connect_timeout: Duration::from_millis(500),
        ..ScanOptions::default()
    });
    for host in hosts() {
        manager.add_target_host(host);
    }
    manager.set_target_ports(ports).unwrap();

    manager.scan_all().await.unwrap();
    manager.get_results().to_vec()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn open_and_closed_ports_on_loopback() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let open = listener.local_addr().unwrap().port();
    let closed = closed_port().await;

    let mut manager = ScanManager::new(ScanType::Connect, false, 1).unwrap();
    manager.add_target_host("127.0.0.1".parse().unwrap());
    manager
        .set_target_ports(&[u32::from(open), u32::from(closed)])
        .unwrap();
    manager.scan_all().await.unwrap();

    let results = manager.get_results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].ports[&open], PortStatus::Open);
    assert_eq!(results[0].ports[&closed], PortStatus::Closed);
    assert!(results[0].failure.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn worker_count_does_not_change_results() {
    let listener = TcpListener::bind("0.0.0.0:0").await.unwrap();
    let open = listener.local_addr().unwrap().port();
    let closed = closed_port().await;
    let ports = [u32::from(open), u32::from(closed)];

    let single: HashSet<ScanResult> = run(1, &ports).await.into_iter().collect();
    let parallel = run(4, &ports).await;

    assert_eq!(parallel.len(), hosts().len());
    assert_eq!(single, parallel.into_iter().collect::<HashSet<_>>());
    assert!(single
        .iter()
        .all(|result| result.ports[&open] == PortStatus::Open));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unreachable_hosts_are_skipped_after_probe() {
    let mut manager = ScanManager::new(ScanType::Connect, true, 2)
        .unwrap()
        .with_probe(NoProbe);
    for host in hosts() {
        manager.add_target_host(host);
    }
    manager.set_target_port_range(1, 1024).unwrap();

    manager.scan_all().await.unwrap();

    let results = manager.get_results();
    assert_eq!(results.len(), hosts().len());
    for result in results {
        assert_eq!(result.ping, Some(PingStatus::down()));
        assert!(result.ports.is_empty());
    }
}

#[tokio::test]
async fn scan_time_is_recorded() {
    let mut manager = ScanManager::new(ScanType::Connect, false, 1).unwrap();
    manager.add_target_host("127.0.0.1".parse().unwrap());
    manager.set_target_ports(&[u32::from(closed_port().await)]).unwrap();

    assert_eq!(manager.get_scan_time(), Duration::ZERO);
    manager.scan_all().await.unwrap();
    assert!(manager.get_scan_time() > Duration::ZERO);
}

#[test]
fn bad_configuration_is_fatal() {
    let mut manager = ScanManager::new(ScanType::Syn, false, 1).unwrap();
    let error = manager.set_target_port_range(0, 80).unwrap_err();

    assert!(matches!(error, ScanError::InvalidPortRange { lower: 0, upper: 80 }));
    assert!(error.is_fatal());
}

/// Needs a network where 10.255.255.1 silently drops traffic.
#[tokio::test]
#[ignore]
async fn blackholed_address_is_filtered() {
    let mut manager = ScanManager::new(ScanType::Connect, false, 1).unwrap();
    manager.set_scan_options(ScanOptions {
        connect_timeout: Duration::from_millis(300),
        ..ScanOptions::default()
    });
    manager.add_target_host("10.255.255.1".parse().unwrap());
    manager.set_target_ports(&[80]).unwrap();

    manager.scan_all().await.unwrap();

    assert_eq!(manager.get_results()[0].ports[&80], PortStatus::Filtered);
}
