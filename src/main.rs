//! CLI entry point for di-appliance — a Deep Instinct appliance REST client.
//!
//! Authenticates with a full-access API key, then dispatches to the
//! selected report or collection based on CLI flags (`--devices`,
//! `--events`, `--license-report`, `--compliance`).
//!
//! Exit codes:
//! - 0: success
//! - 1: runtime error (bad key, API error, exhausted retries, etc.)
//! - 2: argument validation error (clap handles this automatically)

use std::process::ExitCode;

use clap::Parser;
use serde_json::Value;

use di_appliance::client::ApplianceClient;
use di_appliance::collect::CollectConfig;
use di_appliance::devices::list_devices;
use di_appliance::error::Result;
use di_appliance::events::{list_events, list_suspicious_events};
use di_appliance::multitenancy::{list_msps, list_tenants};
use di_appliance::policies::list_policies_with_data;
use di_appliance::reports::{license_usage, windows_policy_compliance, windows_prevention_summary};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Appliance hostname, e.g. "di-server.customer.com".
    #[arg(long)]
    fqdn: String,

    /// Full-access API key for the appliance. Prefer setting via the
    /// DI_API_KEY environment variable to avoid exposing the key in
    /// process listings and shell history.
    #[arg(long, env = "DI_API_KEY")]
    api_key: String,

    /// Include deactivated devices in the listing (used with --devices).
    #[arg(long)]
    include_deactivated: bool,

    /// Collect from the suspicious-event index instead of threat events
    /// (used with --events).
    #[arg(long)]
    suspicious: bool,

    /// JSON search filter forwarded verbatim to the event search endpoint
    /// (used with --events).
    #[arg(long)]
    search: Option<String>,

    /// Only collect events with an ID greater than this value
    /// (used with --events).
    #[arg(long)]
    min_event_id: Option<u64>,

    #[command(flatten)]
    actions: ActionFlags,
}

/// Action flags — exactly one must be set per invocation.
///
/// Clap enforces this at parse time via the `group` attribute:
/// - If none are set, clap prints an error and exits with code 2.
/// - If more than one is set, clap prints an error and exits with code 2.
#[derive(clap::Args)]
#[group(required = true, multiple = false)]
struct ActionFlags {
    /// List the devices registered on the appliance.
    #[arg(long)]
    devices: bool,

    /// Collect events from the appliance.
    #[arg(long)]
    events: bool,

    /// Print per-tenant license usage plus Windows prevention/detection
    /// device counts.
    #[arg(long)]
    license_report: bool,

    /// Check every Windows policy against the expected prevention settings.
    #[arg(long)]
    compliance: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Cli::parse();

    // Cross-flag requirements that clap groups can't express: the modifier
    // flags only mean something under their own action.
    if args.include_deactivated && !args.actions.devices {
        eprintln!("Error: --include-deactivated only applies to --devices");
        return ExitCode::FAILURE;
    }
    if !args.actions.events {
        if args.suspicious {
            eprintln!("Error: --suspicious only applies to --events");
            return ExitCode::FAILURE;
        }
        if args.search.is_some() {
            eprintln!("Error: --search only applies to --events");
            return ExitCode::FAILURE;
        }
        if args.min_event_id.is_some() {
            eprintln!("Error: --min-event-id only applies to --events");
            return ExitCode::FAILURE;
        }
    }

    let search = match args.search.as_deref() {
        Some(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(value) => Some(value),
            Err(e) => {
                eprintln!("Error: --search is not valid JSON: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };

    let client = match ApplianceClient::new(&args.fqdn, &args.api_key) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let outcome = if args.actions.devices {
        run_devices(&client, args.include_deactivated).await
    } else if args.actions.events {
        run_events(
            &client,
            args.suspicious,
            search.as_ref(),
            args.min_event_id.unwrap_or(0),
        )
        .await
    } else if args.actions.license_report {
        run_license_report(&client).await
    } else {
        run_compliance(&client).await
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run_devices(client: &ApplianceClient, include_deactivated: bool) -> Result<()> {
    let devices = list_devices(client, include_deactivated, None).await?;
    println!("{} devices", devices.len());
    for device in &devices {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            device.id,
            device.hostname.as_deref().unwrap_or("-"),
            device.ip_address.as_deref().unwrap_or("-"),
            device.license_status.as_deref().unwrap_or("-"),
            device.group_name.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

async fn run_events(
    client: &ApplianceClient,
    suspicious: bool,
    search: Option<&Value>,
    start_after: u64,
) -> Result<()> {
    let config = CollectConfig {
        start_after,
        ..CollectConfig::default()
    };
    let events = if suspicious {
        list_suspicious_events(client, search, Some(&config)).await?
    } else {
        list_events(client, search, Some(&config)).await?
    };

    println!("{} events", events.len());
    for event in &events {
        println!(
            "{}\t{}\t{}\tdevice {}",
            event.id,
            event.event_type.as_deref().unwrap_or("-"),
            event.threat_severity.as_deref().unwrap_or("-"),
            event
                .device_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string()),
        );
    }
    Ok(())
}

async fn run_license_report(client: &ApplianceClient) -> Result<()> {
    let tenants = list_tenants(client).await?;
    let msps = list_msps(client).await?;
    let devices = list_devices(client, false, None).await?;

    for row in license_usage(&tenants, &msps, &devices) {
        println!(
            "{}\t{}\t{} of {} licenses used ({:.1}%)",
            row.msp_name.as_deref().unwrap_or("-"),
            row.tenant_name,
            row.licenses_used,
            row.license_limit,
            row.percent_used,
        );
    }

    let policies = list_policies_with_data(client).await?;
    let summary = windows_prevention_summary(&devices, &policies);
    println!(
        "Windows devices: {} in prevention mode, {} in detection mode",
        summary.prevention, summary.detection
    );
    Ok(())
}

async fn run_compliance(client: &ApplianceClient) -> Result<()> {
    let report = windows_policy_compliance(&list_policies_with_data(client).await?);
    let non_compliant = report.iter().filter(|row| !row.compliant).count();
    println!(
        "Checked {} Windows policies, {} not compliant",
        report.len(),
        non_compliant
    );
    for row in &report {
        if row.compliant {
            continue;
        }
        println!(
            "Policy {} '{}' ({}) is not compliant:",
            row.policy_id,
            row.policy_name,
            row.msp_name.as_deref().unwrap_or("-"),
        );
        for violation in &row.violations {
            println!("    {violation}");
        }
    }
    Ok(())
}
