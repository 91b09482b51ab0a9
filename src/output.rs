//! Prints scan results for people, for grep, or as JSON.
use std::io::{self, Write};
use std::time::Duration;

use colored::Colorize;
use itertools::Itertools;
use serde_json::json;

use crate::results::{PortStatus, ScanResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStyle {
    /// Per-host summary. `accessible` drops colors for screen readers.
    Human { accessible: bool },
    /// One `host -> [open ports]` line per host that has any.
    Greppable,
    Json,
}

pub fn write_results<W: Write>(
    out: &mut W,
    results: &[ScanResult],
    scan_time: Duration,
    style: OutputStyle,
) -> io::Result<()> {
    match style {
        OutputStyle::Human { accessible } => write_human(out, results, scan_time, accessible),
        OutputStyle::Greppable => write_greppable(out, results),
        OutputStyle::Json => write_json(out, results, scan_time),
    }
}

fn write_human<W: Write>(
    out: &mut W,
    results: &[ScanResult],
    scan_time: Duration,
    accessible: bool,
) -> io::Result<()> {
    for result in results {
        let host = result.host.to_string();
        match (&result.failure, result.ping) {
            (Some(reason), _) => {
                if accessible {
                    writeln!(out, "{host}: scan failed ({reason})")?;
                } else {
                    writeln!(out, "{}: {}", host.bold(), format!("scan failed ({reason})").red())?;
                }
                continue;
            }
            (None, Some(ping)) if !ping.success => {
                writeln!(out, "{host}: down")?;
                continue;
            }
            (None, Some(ping)) => writeln!(out, "{host}: up ({} ms)", ping.latency_ms)?,
            (None, None) => writeln!(out, "{host}:")?,
        }

        for (port, status) in &result.ports {
            if accessible {
                writeln!(out, "  {port} {status}")?;
            } else {
                let status = match status {
                    PortStatus::Open => status.to_string().green(),
                    PortStatus::Closed => status.to_string().red(),
                    PortStatus::Filtered => status.to_string().yellow(),
                };
                writeln!(out, "  {} {}", port.to_string().purple(), status)?;
            }
        }
    }

    writeln!(out, "Scanned {} hosts in {:.2}s", results.len(), scan_time.as_secs_f64())
}

fn write_greppable<W: Write>(out: &mut W, results: &[ScanResult]) -> io::Result<()> {
    for result in results {
        let mut open = result.ports_with(PortStatus::Open).peekable();
        if open.peek().is_some() {
            writeln!(out, "{} -> [{}]", result.host, open.join(","))?;
        }
    }
    Ok(())
}

fn write_json<W: Write>(out: &mut W, results: &[ScanResult], scan_time: Duration) -> io::Result<()> {
    let document = json!({
        "scan_time_ms": scan_time.as_millis() as u64,
        "results": results,
    });
    serde_json::to_writer_pretty(&mut *out, &document)?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::PingStatus;

    fn sample() -> Vec<ScanResult> {
        let mut up = ScanResult::new("10.0.0.1".parse().unwrap()).with_ping(PingStatus::up(4));
        up.record(80, PortStatus::Open);
        up.record(22, PortStatus::Open);
        up.record(23, PortStatus::Closed);
        up.record(25, PortStatus::Filtered);

        let down = ScanResult::new("10.0.0.2".parse().unwrap()).with_ping(PingStatus::down());
        let failed = ScanResult::failed("10.0.0.3".parse().unwrap(), None, "no free port");

        vec![up, down, failed]
    }

    fn render(style: OutputStyle) -> String {
        let mut out = Vec::new();
        write_results(&mut out, &sample(), Duration::from_millis(1500), style).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn greppable_lists_open_ports_only() {
        assert_eq!(render(OutputStyle::Greppable), "10.0.0.1 -> [22,80]\n");
    }

    #[test]
    fn accessible_output_is_plain() {
        let text = render(OutputStyle::Human { accessible: true });
        assert_eq!(
            text,
            "10.0.0.1: up (4 ms)\n  22 open\n  23 closed\n  25 filtered\n  80 open\n\
             10.0.0.2: down\n\
             10.0.0.3: scan failed (no free port)\n\
             Scanned 3 hosts in 1.50s\n"
        );
    }

    #[test]
    fn json_carries_every_result() {
        let value: serde_json::Value = serde_json::from_str(&render(OutputStyle::Json)).unwrap();

        assert_eq!(value["scan_time_ms"], 1500);
        assert_eq!(value["results"].as_array().unwrap().len(), 3);
        assert_eq!(value["results"][0]["ports"]["25"], "filtered");
        assert_eq!(value["results"][1]["ping"]["success"], false);
        assert_eq!(value["results"][2]["failure"], "no free port");
    }
}
