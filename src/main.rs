use std::io;

use anyhow::{bail, Context};
use log::{debug, warn};

use synscan::address::{parse_targets, Target};
use synscan::input::{Config, Opts};
use synscan::manager::ScanManager;
use synscan::output::{write_results, OutputStyle};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut opts = Opts::read();
    let config = Config::read(opts.config_path.clone()).context("Invalid configuration file")?;
    opts.merge(&config);
    debug!("Main() `opts` arguments are {:?}", opts);

    let targets = parse_targets(&opts.addresses);
    if targets.is_empty() {
        bail!("No valid addresses to scan. Pass IPs or CIDR networks with -a");
    }

    let mut manager = ScanManager::new(opts.scan_type, opts.ping, opts.workers)?;
    manager.set_scan_options(opts.scan_options());
    for target in &targets {
        match target {
            Target::Host(ip) => manager.add_target_host(*ip),
            Target::Network(cidr) => manager.add_target_network(cidr)?,
        }
    }

    if let Some(ports) = &opts.ports {
        manager.set_target_ports(ports)?;
    } else if let Some(range) = opts.range {
        manager.set_target_port_range(range.start, range.end)?;
    }

    if opts.workers > manager.target_hosts().len() {
        warn!(
            "{} workers for {} hosts, some workers will stay idle",
            opts.workers,
            manager.target_hosts().len()
        );
    }

    manager
        .scan_all()
        .await
        .context("Scan aborted")?;

    let style = if opts.json {
        OutputStyle::Json
    } else if opts.greppable {
        OutputStyle::Greppable
    } else {
        OutputStyle::Human {
            accessible: opts.accessible,
        }
    };
    write_results(
        &mut io::stdout().lock(),
        manager.get_results(),
        manager.get_scan_time(),
        style,
    )?;

    Ok(())
}
