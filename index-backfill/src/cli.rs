/// # index-backfill CLI Interface (Module)
///
/// Command parsing and the async entrypoint for index-backfill. All pipeline
/// logic lives in `index-backfill-core`; this module loads the config, builds the
/// Algolia client and prints the final report.
///
/// ## How To Use
/// - Command-line users: `index-backfill sync --config backfill.yaml`
/// - Programmatic/integration use: call [`run`] with a constructed [`Cli`].
use crate::load_config::load_config;
use crate::store::AlgoliaClient;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use index_backfill_core::cancel::CancelFlag;
use index_backfill_core::synchronise::{self, SyncMode, SynchroniseReport};
use std::path::PathBuf;

/// CLI for index-backfill: upload the records of a local export missing from an index.
#[derive(Parser)]
#[clap(
    name = "index-backfill",
    version,
    about = "Find the records of a CSV export that are missing from an Algolia index and upload them"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload every record missing from the index, using the given config file
    Sync {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
    /// Report the records missing from the index without uploading them
    Check {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Sync { config } => execute(config, SyncMode::Upload).await,
        Commands::Check { config } => execute(config, SyncMode::CheckOnly).await,
    }
}

async fn execute(config_path: PathBuf, mode: SyncMode) -> Result<()> {
    let config = load_config(config_path)?;
    tracing::info!(?mode, "Starting synchronisation process");

    let client = AlgoliaClient::new(config.store).context("Failed to construct index client")?;

    let cancel = CancelFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing the current batch");
            on_interrupt.cancel();
        }
    });

    let report = match synchronise::run(&config.sync, &client, mode, &cancel).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, "Synchronisation failed");
            return Err(anyhow::Error::new(e));
        }
    };

    print_report(&report, mode);

    if report.has_failures() {
        anyhow::bail!(
            "{} records failed permanently, {} records hit fatal errors, {} probe chunks failed",
            report.permanently_failed.len(),
            report.fatally_errored.len(),
            report.failed_probe_chunks
        );
    }
    Ok(())
}

fn print_report(report: &SynchroniseReport, mode: SyncMode) {
    println!("Synchronise complete.\nReport:");
    println!("  records loaded:          {}", report.records_loaded);
    println!("  duplicates merged:       {}", report.duplicates);
    println!("  records probed:          {}", report.probed);
    println!("  missing from index:      {}", report.missing);
    if mode == SyncMode::Upload {
        println!("  uploaded:                {}", report.uploaded);
        println!("  permanently failed:      {}", report.permanently_failed.len());
        println!("  fatally errored:         {}", report.fatally_errored.len());
    }
    println!("  not submitted:           {}", report.not_submitted.len());
    println!("  anomalies:               {}", report.anomalies());
    if report.cancelled {
        println!("  run was cancelled; {} records not probed", report.unprobed);
    }
    for record in &report.permanently_failed {
        println!("  failed: {}", record.object_id);
    }
    if mode == SyncMode::CheckOnly {
        for record in &report.not_submitted {
            println!("  missing: {}", record.object_id);
        }
    }
}
