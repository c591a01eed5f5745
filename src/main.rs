//! Seo-Sweep main entry point
//!
//! This is the command-line interface for the Seo-Sweep site auditor.

use anyhow::{bail, Context};
use clap::Parser;
use seo_sweep::audit::TierPolicy;
use seo_sweep::config::{load_config_with_hash, Config};
use seo_sweep::job::{AuditOptions, JobRunner, Target};
use seo_sweep::output::{job_summary_line, write_markdown_report};
use seo_sweep::storage::{open_storage, shared};
use seo_sweep::JobStatus;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Seo-Sweep: an on-page SEO auditor
///
/// Seo-Sweep discovers the pages of a site, analyzes each one for SEO
/// deficiencies, scores the site, stores the result in SQLite and writes
/// a markdown report.
#[derive(Parser, Debug)]
#[command(name = "seo-sweep")]
#[command(version = "1.0.0")]
#[command(about = "An on-page SEO auditor", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Site to audit, e.g. example.com or https://example.com
    #[arg(long, conflicts_with = "client", required_unless_present_any = ["client", "status"])]
    url: Option<String>,

    /// Id of a `[[client]]` entry in the configuration
    #[arg(long, conflicts_with = "url")]
    client: Option<String>,

    /// Maximum number of pages to discover
    #[arg(long)]
    max_pages: Option<usize>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be audited without auditing
    #[arg(long, conflicts_with = "status")]
    dry_run: bool,

    /// Show the stored status of an audit and exit
    #[arg(long, value_name = "AUDIT_ID")]
    status: Option<Uuid>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if let Some(audit_id) = cli.status {
        return handle_status(&config, audit_id);
    }

    let target = match (&cli.url, &cli.client) {
        (Some(url), _) => Target::ByDomain(url.clone()),
        (None, Some(client)) => Target::ByClientRef(client.clone()),
        (None, None) => bail!("either --url or --client is required"),
    };
    let options = AuditOptions {
        max_pages: cli.max_pages,
    };

    if cli.dry_run {
        handle_dry_run(&config, &target, &options);
        return Ok(());
    }

    handle_audit(config, config_hash, target, options).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("seo_sweep=info,warn"),
            1 => EnvFilter::new("seo_sweep=debug,info"),
            2 => EnvFilter::new("seo_sweep=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective policy and target
fn handle_dry_run(config: &Config, target: &Target, options: &AuditOptions) {
    let policy = TierPolicy::from_config(&config.audit);

    println!("=== Seo-Sweep Dry Run ===\n");
    println!("Target: {}", target);

    println!("\nMemory Tier: {}", policy.tier);
    println!("  Max pages: {}", policy.clamp_max_pages(options.max_pages));
    println!("  Max analyzed pages: {}", policy.max_analysis);
    println!(
        "  Batches: {} pages x {} in parallel",
        policy.batch_size, policy.parallel_batches
    );
    println!("  Delay between batch groups: {:?}", policy.group_delay);
    println!("  Deep checks: {}", policy.deep_analysis);

    println!("\nJob:");
    println!("  Max attempts: {}", config.job.max_attempts);
    println!("  Timeout: {}s", config.job.timeout_secs);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Report: {}", config.output.report_path);

    println!("\nClients ({}):", config.clients.len());
    for client in &config.clients {
        println!("  - {} ({})", client.id, client.website);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --status mode: prints a stored job
fn handle_status(config: &Config, audit_id: Uuid) -> anyhow::Result<()> {
    let storage = open_storage(Path::new(&config.output.database_path))?;
    let store = shared(storage);
    let runner = JobRunner::new(Arc::new(config.clone()), store);

    let Some(job) = runner.job(audit_id)? else {
        bail!("no audit with id {}", audit_id);
    };
    let result = runner.result(audit_id)?;
    println!("{} {}", audit_id, job_summary_line(&job, result.as_ref()));
    Ok(())
}

/// Handles the main audit operation
async fn handle_audit(
    config: Config,
    config_hash: String,
    target: Target,
    options: AuditOptions,
) -> anyhow::Result<()> {
    let storage = open_storage(Path::new(&config.output.database_path))
        .context("failed to open the audit database")?;
    let report_path = PathBuf::from(&config.output.report_path);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling audit");
            on_signal.cancel();
        }
    });

    let runner = JobRunner::new(Arc::new(config), shared(storage))
        .with_cancellation(cancel)
        .with_config_hash(config_hash);

    tracing::info!("Starting audit of {}", target);
    let job = runner.execute(target, options).await?;

    let result = runner.result(job.audit_id)?;
    println!("{} {}", job.audit_id, job_summary_line(&job, result.as_ref()));

    if job.status != JobStatus::Completed {
        bail!(
            "audit {} failed: {}",
            job.audit_id,
            job.error.as_deref().unwrap_or("unknown error")
        );
    }

    if let Some(result) = result {
        write_markdown_report(&result, &report_path)?;
        println!("✓ Report written to: {}", report_path.display());
    }
    Ok(())
}
