//! portwall: CLI tool for checking packets against a CSV firewall rule file.

use clap::{Args, Parser, Subcommand};
use portwall::{read_rows, Firewall, IndexConfig, RuleRow};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "portwall")]
#[command(version)]
#[command(about = "Check packets against a static firewall rule file", long_about = None)]
struct Cli {
    #[command(flatten)]
    rules: RuleArgs,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RuleArgs {
    /// CSV rule file (direction,protocol,port,address)
    #[arg(short, long, global = true, default_value = "rules.csv")]
    rules: PathBuf,

    /// Accept overlapping rules on the same port instead of failing
    #[arg(long, global = true)]
    allow_overlaps: bool,
}

impl RuleArgs {
    fn config(&self) -> IndexConfig {
        let name = self
            .rules
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "rules".to_string());
        IndexConfig::new(name).with_reject_overlaps(!self.allow_overlaps)
    }

    fn open(&self) -> portwall::Result<Firewall> {
        Firewall::open_with_config(&self.rules, self.config())
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Check a single packet; exits 0 when allowed, 1 when denied
    Check {
        /// inbound or outbound
        direction: String,

        /// tcp or udp
        protocol: String,

        /// Destination port
        #[arg(allow_negative_numbers = true)]
        port: i64,

        /// IPv4 address
        address: String,
    },

    /// Check every packet listed in a CSV file with the same columns as the rules
    Batch {
        /// CSV file of packets to check
        #[arg(short, long)]
        queries: PathBuf,
    },

    /// Print statistics about the compiled rule index
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

const EXIT_DENY: u8 = 1;
const EXIT_ERROR: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let result = match cli.command {
        Commands::Check {
            direction,
            protocol,
            port,
            address,
        } => check(&cli.rules, &direction, &protocol, port, &address),
        Commands::Batch { queries } => batch(&cli.rules, &queries),
        Commands::Stats { json } => stats(&cli.rules, json),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn decision(allowed: bool) -> &'static str {
    if allowed {
        "ALLOW"
    } else {
        "DENY"
    }
}

/// Exit status of `check`: 0 when allowed, 1 when denied.
fn check_status(allowed: bool) -> u8 {
    if allowed {
        0
    } else {
        EXIT_DENY
    }
}

/// Exit status of `batch`: 2 when any packet could not be checked.
fn batch_status(failures: usize) -> u8 {
    if failures > 0 {
        EXIT_ERROR
    } else {
        0
    }
}

/// Check one packet row, reporting malformed fields as a message.
fn evaluate(firewall: &Firewall, packet: &RuleRow) -> Result<bool, String> {
    let port = packet
        .port
        .trim()
        .parse::<i64>()
        .map_err(|_| format!("invalid port: {}", packet.port.trim()))?;
    firewall
        .is_allowed(&packet.direction, &packet.protocol, port, &packet.address)
        .map_err(|e| e.to_string())
}

/// Output line for one packet: its fields followed by the decision.
fn batch_line(packet: &RuleRow, outcome: &Result<bool, String>) -> String {
    let verdict = match outcome {
        Ok(allowed) => decision(*allowed),
        Err(_) => "ERROR",
    };
    format!(
        "{},{},{},{},{}",
        packet.direction, packet.protocol, packet.port, packet.address, verdict
    )
}

fn check(
    rules: &RuleArgs,
    direction: &str,
    protocol: &str,
    port: i64,
    address: &str,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let firewall = rules.open()?;
    let allowed = firewall.is_allowed(direction, protocol, port, address)?;

    println!("{}", decision(allowed));
    Ok(ExitCode::from(check_status(allowed)))
}

fn batch(rules: &RuleArgs, queries: &Path) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let firewall = rules.open()?;
    let packets = read_rows(File::open(queries)?)?;
    let mut failures = 0usize;

    for packet in &packets {
        let outcome = evaluate(&firewall, packet);
        println!("{}", batch_line(packet, &outcome));
        if let Err(message) = outcome {
            failures += 1;
            log::error!("line {}: {}", packet.line, message);
        }
    }

    log::info!(
        "Checked {} packets ({} errors)",
        packets.len(),
        failures
    );

    Ok(ExitCode::from(batch_status(failures)))
}

fn stats(rules: &RuleArgs, json: bool) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let firewall = rules.open()?;
    let stats = firewall.stats();

    if json {
        println!("{}", stats.to_json()?);
        return Ok(ExitCode::SUCCESS);
    }

    println!("Rule set: {}", stats.name);
    println!("Rules: {}", stats.rules);
    println!("Port entries: {}", stats.port_entries);
    println!("Max intervals per port: {}", stats.max_intervals_per_port);
    for table in &stats.tables {
        println!(
            "  {:<8} {:<3}  {} ports, {} intervals",
            table.direction, table.protocol, table.occupied_ports, table.intervals
        );
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use portwall::RuleIndex;

    fn firewall() -> Firewall {
        Firewall::new(
            RuleIndex::from_rows(vec![
                RuleRow::new("inbound", "tcp", "80", "192.168.1.0-192.168.1.255"),
                RuleRow::new("outbound", "udp", "1000-2000", "52.12.48.92"),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn test_check_status() {
        let firewall = firewall();

        let allowed = firewall.is_allowed("inbound", "tcp", 80, "192.168.1.2").unwrap();
        assert_eq!(decision(allowed), "ALLOW");
        assert_eq!(check_status(allowed), 0);

        let denied = firewall.is_allowed("inbound", "tcp", 81, "192.168.1.2").unwrap();
        assert_eq!(decision(denied), "DENY");
        assert_eq!(check_status(denied), EXIT_DENY);
        assert_eq!(EXIT_ERROR, 2);
    }

    #[test]
    fn test_batch_lines() {
        let firewall = firewall();
        let packets = [
            RuleRow::new("inbound", "tcp", "80", "192.168.1.2"),
            RuleRow::new("outbound", "udp", "999", "52.12.48.92"),
            RuleRow::new("inbound", "icmp", "80", "192.168.1.2"),
            RuleRow::new("inbound", "tcp", "http", "192.168.1.2"),
            RuleRow::new("inbound", "tcp", "70000", "192.168.1.2"),
        ];

        let lines: Vec<String> = packets
            .iter()
            .map(|packet| batch_line(packet, &evaluate(&firewall, packet)))
            .collect();

        assert_eq!(
            lines,
            [
                "inbound,tcp,80,192.168.1.2,ALLOW",
                "outbound,udp,999,52.12.48.92,DENY",
                "inbound,icmp,80,192.168.1.2,ERROR",
                "inbound,tcp,http,192.168.1.2,ERROR",
                "inbound,tcp,70000,192.168.1.2,ERROR",
            ]
        );
    }

    #[test]
    fn test_evaluate_reports_reason() {
        let firewall = firewall();

        let err = evaluate(&firewall, &RuleRow::new("inbound", "tcp", "http", "1.1.1.1"))
            .unwrap_err();
        assert_eq!(err, "invalid port: http");

        let err = evaluate(&firewall, &RuleRow::new("inbound", "icmp", "80", "1.1.1.1"))
            .unwrap_err();
        assert!(err.contains("icmp"), "got: {}", err);
    }

    #[test]
    fn test_batch_status() {
        assert_eq!(batch_status(0), 0);
        assert_eq!(batch_status(3), EXIT_ERROR);
    }

    #[test]
    fn test_cli_parses_negative_port() {
        let cli = Cli::try_parse_from(["portwall", "check", "inbound", "tcp", "-1", "1.1.1.1"])
            .unwrap();
        match cli.command {
            Commands::Check { port, .. } => assert_eq!(port, -1),
            _ => panic!("expected check"),
        }
        assert_eq!(cli.rules.rules, PathBuf::from("rules.csv"));
        assert!(cli.rules.config().reject_overlaps);
    }
}
