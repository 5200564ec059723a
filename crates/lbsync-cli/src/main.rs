//! lbsync - reconcile one OpenStack load balancer.
//!
//! Reads the desired load balancer from a JSON file, runs a single pass
//! (find, check, render) against the Octavia and Neutron APIs, and prints the
//! descriptor with its remote-assigned fields as JSON on stdout.
//!
//! Provider endpoints and the auth token come from `OS_*` environment
//! variables (see `CloudConfig::from_env`), the poller schedule from
//! `LBSYNC_BACKOFF_*`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use lbsync_cloud::{CloudConfig, OpenStackCloud};
use lbsync_core::Lifecycle;
use lbsync_task::{Backoff, LoadBalancer, LoadBalancerTask, PassReport, WaitReport};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Reconcile one OpenStack load balancer.
#[derive(Parser, Debug)]
#[command(name = "lbsync")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the desired load balancer, as JSON.
    #[arg(long, env = "LBSYNC_SPEC")]
    spec: PathBuf,

    /// Override the lifecycle given in the spec file.
    #[arg(long, env = "LBSYNC_LIFECYCLE")]
    lifecycle: Option<Lifecycle>,

    /// After rendering, wait for the load balancer to become ACTIVE.
    #[arg(long)]
    wait_active: bool,

    /// Enable debug logging.
    #[arg(long, default_value = "false")]
    debug: bool,
}

#[derive(Serialize)]
struct Output<'a> {
    load_balancer: &'a LoadBalancer,
    #[serde(flatten)]
    report: &'a PassReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    provisioning: Option<WaitReport>,
}

fn init_tracing(debug: bool) {
    let default_filter = if debug { "debug" } else { "info,lbsync=debug" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Read the desired descriptor, applying the lifecycle override if any.
fn load_desired(path: &Path, lifecycle: Option<Lifecycle>) -> anyhow::Result<LoadBalancer> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mut desired: LoadBalancer = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse load balancer from {}", path.display()))?;
    if let Some(lifecycle) = lifecycle {
        desired.lifecycle = lifecycle;
    }
    Ok(desired)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.debug);

    let mut desired = load_desired(&args.spec, args.lifecycle)?;
    let name = desired.name.clone().unwrap_or_default();

    let cloud = OpenStackCloud::new(CloudConfig::from_env())
        .context("invalid cloud configuration")?;
    let task = LoadBalancerTask::with_backoff(Arc::new(cloud), Backoff::from_env());

    tracing::info!(
        name = %name,
        lifecycle = %desired.lifecycle,
        "Starting reconciliation pass"
    );

    let report = match task.reconcile(&mut desired).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(name = %name, retriable = e.is_retriable(), error = %e, "Reconciliation failed");
            return Err(anyhow::Error::new(e)
                .context(format!("reconciliation of load balancer {name:?} failed")));
        }
    };

    let provisioning = if args.wait_active && report.outcome.is_some() {
        task.wait_active(&desired)
            .await
            .with_context(|| format!("load balancer {name:?} did not become ACTIVE"))?
    } else {
        None
    };

    let output = Output {
        load_balancer: &desired,
        report: &report,
        provisioning,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
