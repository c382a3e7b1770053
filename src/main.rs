// ABOUTME: CLI entry point for carbon-copy
// ABOUTME: Loads the job and whitelist files, then clones and dumps every configured host

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use carbon_copy::config::JobConfig;
use carbon_copy::dump::{
    local_today, DumpSettings, DumpSupervisor, DEFAULT_OUTPUT_DIR, DEFAULT_POLL_INTERVAL,
};
use carbon_copy::mysql::MySqlConnector;
use carbon_copy::provision::DevInstanceProvisioner;
use carbon_copy::rds::RdsClient;
use carbon_copy::wait::{Exhaustion, RetryPolicy};
use carbon_copy::whitelist::IdentifierWhitelist;
use carbon_copy::workflow::WorkflowDriver;

#[derive(Parser, Debug)]
#[command(name = "carbon-copy")]
#[command(about = "Clone production RDS instances into sanitized development copies and dump them")]
#[command(version)]
struct Args {
    /// Job file listing production instances and their logical databases
    #[arg(long, env = "CARBON_COPY_CONFIG", default_value = "CarbonCopyConfig.json")]
    config: PathBuf,

    /// JSON object mapping production instance identifiers to development ones
    #[arg(long, env = "CARBON_COPY_WHITELIST", default_value = "CarbonCopyWhitelist.json")]
    whitelist: PathBuf,

    /// Directory the .sql dumps are written to
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// AWS region (defaults to the standard AWS provider chain)
    #[arg(long)]
    region: Option<String>,

    /// mysqldump binary (default: looked up on PATH)
    #[arg(long)]
    mysqldump: Option<PathBuf>,

    /// Kill a dump that runs longer than this many seconds (default: no limit)
    #[arg(long)]
    dump_timeout: Option<u64>,

    /// Attempt credential rotation even if the reset admin password never
    /// becomes usable
    #[arg(long)]
    proceed_without_admin_access: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let job = JobConfig::load(&args.config)?;
    let whitelist = Arc::new(IdentifierWhitelist::load(&args.whitelist)?);

    let program = match args.mysqldump {
        Some(path) => path,
        None => which::which("mysqldump")
            .context("mysqldump not found on PATH. Install the MySQL client tools or pass --mysqldump")?,
    };

    tokio::fs::create_dir_all(&args.output_dir)
        .await
        .with_context(|| format!("Failed to create output directory {}", args.output_dir.display()))?;

    let cancel = CancellationToken::new();

    let mut rotation_policy = RetryPolicy::for_credential_change();
    if args.proceed_without_admin_access {
        rotation_policy.on_exhausted = Exhaustion::Proceed;
    }

    let provisioner = DevInstanceProvisioner::new(
        RdsClient::new(args.region.as_deref())
            .await
            .with_cancellation(cancel.clone()),
        MySqlConnector::default(),
        whitelist.clone(),
        rotation_policy,
    );
    let dumper = DumpSupervisor::new(
        DumpSettings {
            program,
            output_dir: args.output_dir,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: args.dump_timeout.map(Duration::from_secs),
            today: local_today,
        },
        whitelist,
        cancel.clone(),
    );

    let driver = WorkflowDriver::new(provisioner, dumper, cancel.clone());
    let summary = tokio::select! {
        result = driver.run(&job) => result?,
        _ = second_interrupt(cancel) => anyhow::bail!("Interrupted twice, abandoning the run"),
    };
    for path in &summary.dumps {
        info!(path = %path.display(), "Wrote dump");
    }
    Ok(())
}

/// The first Ctrl-C cancels `cancel`, which stops the run at its next wait or
/// step boundary. Resolves on the second Ctrl-C; dropping the run future then
/// kills any dump still in flight.
async fn second_interrupt(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_err() {
        return std::future::pending().await;
    }
    warn!("Interrupt received, stopping at the next step. Press Ctrl-C again to abort now");
    cancel.cancel();

    if tokio::signal::ctrl_c().await.is_err() {
        return std::future::pending().await;
    }
    warn!("Second interrupt received, aborting");
}
