//! Host simulator for wifiprov devices
//!
//! Runs the provisioning and connection lifecycle against in-memory
//! collaborators and prints what the device would have done.

mod scenario;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use env_logger::{Builder, Env};
use wifiprov_mcu::SupervisorConfig;
use wifiprov_proto::{MacAddress, SERVICE_NAME_PREFIX, ServiceName};

use scenario::{Report, Run, Scenario};

#[derive(Parser)]
#[command(name = "wifiprov-sim")]
#[command(about = "Simulate Wi-Fi provisioning for wifiprov devices")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the provisioning service name for a MAC address
    ServiceName {
        /// Station MAC, e.g. AA:BB:CC:DD:EE:FF
        #[arg(short, long)]
        mac: MacAddress,
        /// Service name prefix (5 characters)
        #[arg(short, long, default_value = SERVICE_NAME_PREFIX)]
        prefix: String,
    },
    /// Run a scripted scenario
    Run {
        #[arg(short, long, value_enum)]
        scenario: Scenario,
        /// Station MAC; random when omitted
        #[arg(short, long)]
        mac: Option<MacAddress>,
        /// JSON supervisor config
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Pause between connect and reset in the bootstrap scenario, in seconds
        #[arg(long, default_value = "5")]
        pause: u64,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::ServiceName { mac, prefix } => {
            let name = ServiceName::with_prefix(&prefix, &mac)?;
            println!("{name}");
        }
        Commands::Run {
            scenario,
            mac,
            config,
            pause,
            json,
        } => {
            let config = match config {
                Some(path) => read_config(&path)?,
                None => SupervisorConfig::default(),
            };
            let mac = mac.unwrap_or_else(random_mac);
            let report = Run::new(mac, config)?.play(scenario, Duration::from_secs(pause))?;
            if json {
                print_json(&report)?;
            } else {
                print_report(&report);
            }
        }
    }

    Ok(())
}

fn read_config(path: &Path) -> anyhow::Result<SupervisorConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    SupervisorConfig::from_json(&content).with_context(|| format!("invalid config {}", path.display()))
}

/// Locally administered unicast address
fn random_mac() -> MacAddress {
    let mut octets: [u8; 6] = rand::random();
    octets[0] = (octets[0] & 0xFC) | 0x02;
    MacAddress(octets)
}

fn print_report(report: &Report) {
    println!("MAC:      {}", report.mac);
    println!("State:    {:?}", report.state);
    println!("Retries:  {}", report.retries);
    println!("Provisioned: {}", if report.provisioned { "yes" } else { "no" });
    match report.address {
        Some(address) => println!("Address:  {address}"),
        None => println!("Address:  none"),
    }
    println!("\nPlatform calls ({}):", report.calls.len());
    for (i, call) in report.calls.iter().enumerate() {
        println!("  {:>3}. {:?}", i + 1, call);
    }
}

fn print_json(report: &Report) -> anyhow::Result<()> {
    let value = serde_json::json!({
        "mac": report.mac.to_string(),
        "state": format!("{:?}", report.state),
        "retries": report.retries,
        "provisioned": report.provisioned,
        "address": report.address.map(|a| a.to_string()),
        "calls": report.calls.iter().map(|c| format!("{c:?}")).collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
