//! Provides a means to read, parse and hold configuration options for scans.
use clap::Parser;
use serde_derive::Deserialize;
use std::fs;
use std::path::PathBuf;

use crate::scanner::{ScanOptions, ScanType};

const LOWEST_PORT_NUMBER: u32 = 1;
const TOP_PORT_NUMBER: u32 = 65535;

/// Inclusive port range given as `start-end`. The bounds may be reversed.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub start: u32,
    pub end: u32,
}

pub type Ports = Vec<u32>;

/// Parses `80,443,1-3` into ports in the order given, dropping repeats.
pub fn parse_ports_and_ranges(input: &str) -> Result<Ports, String> {
    let mut ports = Vec::new();

    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if part.contains('-') {
            let range = parse_range(part)?;
            if range.start > range.end {
                return Err(format!(
                    "Start port {} is greater than end port {} in range '{part}'",
                    range.start, range.end
                ));
            }
            ports.extend(range.start..=range.end);
        } else {
            ports.push(parse_single_port(part)?);
        }
    }

    if ports.is_empty() {
        return Err(String::from("No valid ports or ranges provided"));
    }

    let mut seen = std::collections::HashSet::with_capacity(ports.len());
    ports.retain(|port| seen.insert(*port));

    Ok(ports)
}

/// Parses a `start-end` range. Both bounds must be valid ports.
pub fn parse_range(input: &str) -> Result<PortRange, String> {
    let Some((start, end)) = input.trim().split_once('-') else {
        return Err(format!(
            "Invalid range format '{input}'. Expected 'start-end'. Example: 1-1000."
        ));
    };
    if end.contains('-') {
        return Err(format!(
            "Invalid range format '{input}'. Expected 'start-end'. Example: 1-1000."
        ));
    }

    let start = parse_bound(start, input, "start")?;
    let end = parse_bound(end, input, "end")?;
    Ok(PortRange { start, end })
}

fn parse_bound(bound: &str, range: &str, which: &str) -> Result<u32, String> {
    bound
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|port| (LOWEST_PORT_NUMBER..=TOP_PORT_NUMBER).contains(port))
        .ok_or_else(|| format!("Invalid {which} port '{bound}' in range '{range}'"))
}

fn parse_single_port(port_str: &str) -> Result<u32, String> {
    let port: u32 = port_str
        .parse()
        .map_err(|_| format!("Invalid port number '{port_str}'"))?;

    if !(LOWEST_PORT_NUMBER..=TOP_PORT_NUMBER).contains(&port) {
        return Err(format!(
            "Port {port} must be between {LOWEST_PORT_NUMBER} and {TOP_PORT_NUMBER}",
        ));
    }

    Ok(port)
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "synscan",
    version = env!("CARGO_PKG_VERSION"),
    max_term_width = 120,
    help_template = "{bin} {version}\n{about}\n\nUSAGE:\n    {usage}\n\nOPTIONS:\n{options}",
)]
#[allow(clippy::struct_excessive_bools)]
/// TCP port scanner with connect and half-open (SYN) strategies.
/// WARNING Only scan hosts you are authorised to scan.
pub struct Opts {
    /// A comma-delimited list of IPs or CIDR networks to be scanned.
    #[arg(short, long, value_delimiter = ',')]
    pub addresses: Vec<String>,

    /// A list of ports and/or port ranges to be scanned. Examples: 80,443,8080 or 1-1000,8080
    #[arg(short, long, value_parser = parse_ports_and_ranges, conflicts_with = "range")]
    pub ports: Option<Ports>,

    /// A single inclusive port range. Example: 1-1024
    #[arg(short, long, value_parser = parse_range)]
    pub range: Option<PortRange>,

    /// The scan strategy. "syn" needs raw socket privileges.
    #[arg(short, long, value_enum, ignore_case = true, default_value = "connect")]
    pub scan_type: ScanType,

    /// Probe each host first and skip the ones that do not answer.
    #[arg(long)]
    pub ping: bool,

    /// Number of hosts scanned in parallel.
    #[arg(short, long, default_value = "1")]
    pub workers: usize,

    /// The timeout in milliseconds before a connect attempt is assumed filtered.
    #[arg(short, long, default_value = "1500")]
    pub timeout: u32,

    /// The time in milliseconds to wait for an answer to one SYN.
    #[arg(long, default_value = "10000")]
    pub syn_timeout: u32,

    /// The number of SYNs sent before a port is assumed filtered.
    /// If set to 0, it is corrected to 1.
    #[arg(long, default_value = "2")]
    pub tries: u8,

    /// Whether to ignore the configuration file or not.
    #[arg(short, long)]
    pub no_config: bool,

    /// Custom path to config file
    #[arg(short, long, value_parser)]
    pub config_path: Option<PathBuf>,

    /// Greppable mode. Only output the open ports per host.
    #[arg(short, long, conflicts_with = "json")]
    pub greppable: bool,

    /// Accessible mode. Turns off features which negatively affect screen readers.
    #[arg(long)]
    pub accessible: bool,

    /// Print all results as JSON.
    #[arg(long)]
    pub json: bool,
}

#[cfg(not(tarpaulin_include))]
impl Opts {
    pub fn read() -> Self {
        let mut opts = Opts::parse();

        if opts.ports.is_none() && opts.range.is_none() {
            opts.range = Some(PortRange {
                start: LOWEST_PORT_NUMBER,
                end: TOP_PORT_NUMBER,
            });
        }

        opts
    }

    /// Merges values found within the user configuration file into the
    /// command line options.
    pub fn merge(&mut self, config: &Config) {
        if !self.no_config {
            self.merge_required(config);
            self.merge_optional(config);
        }
    }

    /// Timeouts and retries for the scanners.
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            connect_timeout: std::time::Duration::from_millis(u64::from(self.timeout)),
            syn_timeout: std::time::Duration::from_millis(u64::from(self.syn_timeout)),
            syn_retries: self.tries,
        }
    }

    fn merge_required(&mut self, config: &Config) {
        macro_rules! merge_required {
            ($($field: ident),+) => {
                $(
                    if let Some(e) = &config.$field {
                        self.$field = e.clone();
                    }
                )+
            }
        }

        merge_required!(
            addresses,
            scan_type,
            ping,
            workers,
            timeout,
            syn_timeout,
            tries,
            greppable,
            accessible,
            json
        );
    }

    fn merge_optional(&mut self, config: &Config) {
        // A port list in the config replaces the default range and vice versa.
        if config.ports.is_some() {
            self.ports = config.ports.clone();
            self.range = None;
        } else if config.range.is_some() {
            self.range = config.range;
            self.ports = None;
        }
    }
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            addresses: vec![],
            ports: None,
            range: None,
            scan_type: ScanType::Connect,
            ping: false,
            workers: 1,
            timeout: 0,
            syn_timeout: 0,
            tries: 0,
            no_config: true,
            config_path: None,
            greppable: true,
            accessible: false,
            json: false,
        }
    }
}

/// Struct used to deserialize the options specified within our config file.
/// These will be further merged with our command line arguments in order to
/// generate the final Opts struct.
#[cfg(not(tarpaulin_include))]
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    addresses: Option<Vec<String>>,
    ports: Option<Vec<u32>>,
    range: Option<PortRange>,
    scan_type: Option<ScanType>,
    ping: Option<bool>,
    workers: Option<usize>,
    timeout: Option<u32>,
    syn_timeout: Option<u32>,
    tries: Option<u8>,
    greppable: Option<bool>,
    accessible: Option<bool>,
    json: Option<bool>,
}

#[cfg(not(tarpaulin_include))]
#[allow(clippy::doc_link_with_quotes)]
impl Config {
    /// Reads the configuration file with TOML format and parses it into a
    /// Config struct. A missing or unreadable file yields an empty config.
    ///
    /// # Format
    ///
    /// addresses = ["127.0.0.1", "10.0.0.0/24"]
    /// ports = [80, 443, 8080]
    /// range = { start = 1, end = 1024 }
    /// scan_type = "syn"
    /// workers = 4
    /// greppable = true
    ///
    pub fn read(custom_config_path: Option<PathBuf>) -> Result<Self, toml::de::Error> {
        let content = custom_config_path
            .or_else(default_config_path)
            .filter(|path| path.exists())
            .and_then(|path| fs::read_to_string(path).ok())
            .unwrap_or_default();

        toml::from_str(&content)
    }
}

/// Constructs default path to config toml
pub fn default_config_path() -> Option<PathBuf> {
    let mut config_path = dirs::home_dir()?;
    config_path.push(".synscan.toml");
    Some(config_path)
}
