//! Turns the user's address list into scan targets.
use std::net::IpAddr;
use std::str::FromStr;

use cidr_utils::cidr::IpCidr;
use itertools::Itertools;
use log::warn;

/// One entry of the address list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Host(IpAddr),
    Network(IpCidr),
}

/// Parses IPs and CIDR networks. Entries that are neither are reported and
/// skipped; repeated entries are kept once.
///
/// ```rust
/// # use synscan::address::{parse_targets, Target};
/// let targets = parse_targets(&["127.0.0.1".to_owned(), "nope".to_owned()]);
/// assert_eq!(targets, vec![Target::Host("127.0.0.1".parse().unwrap())]);
/// ```
pub fn parse_targets(input: &[String]) -> Vec<Target> {
    input
        .iter()
        .map(|address| address.trim())
        .filter(|address| !address.is_empty())
        .unique()
        .filter_map(|address| {
            let target = parse_target(address);
            if target.is_none() {
                warn!("{} is neither an IP address nor a CIDR network, skipping", address);
            }
            target
        })
        .collect()
}

/// A bare address is a host; anything with a prefix length is a network.
pub fn parse_target(address: &str) -> Option<Target> {
    if let Ok(ip) = IpAddr::from_str(address) {
        return Some(Target::Host(ip));
    }
    IpCidr::from_str(address).ok().map(Target::Network)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn strings(input: &[&str]) -> Vec<String> {
        input.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn parse_correct_addresses() {
        let targets = parse_targets(&strings(&["127.0.0.1", "192.168.0.0/30", "::1"]));

        assert_eq!(targets.len(), 3);
        assert_eq!(targets[0], Target::Host(IpAddr::V4(Ipv4Addr::LOCALHOST)));
        assert!(matches!(&targets[1], Target::Network(cidr) if cidr.to_string() == "192.168.0.0/30"));
        assert_eq!(targets[2], Target::Host("::1".parse().unwrap()));
    }

    #[test]
    fn parse_correct_and_incorrect_addresses() {
        let targets = parse_targets(&strings(&["127.0.0.1", "im_wrong", "example.com", "300.0.0.1"]));
        assert_eq!(targets, vec![Target::Host(IpAddr::V4(Ipv4Addr::LOCALHOST))]);
    }

    #[test]
    fn repeats_and_blanks_are_dropped() {
        let targets = parse_targets(&strings(&["10.0.0.1", " 10.0.0.1 ", "", "10.0.0.2"]));
        assert_eq!(targets.len(), 2);
    }

    #[test]
    fn parse_incorrect_addresses() {
        assert!(parse_targets(&strings(&["im_wrong", "300.10.1.1/8"])).is_empty());
    }
}
