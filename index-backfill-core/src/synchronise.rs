//! High-level pipeline: load → probe → diff → upload.
//!
//! This module wires the stages together for one run:
//!   - Loads the local export into a [`LocalDataset`] (duplicates merged)
//!   - Probes the remote index chunk by chunk through an [`ExistenceOracle`]
//!   - Diffs each chunk's not-found ids against the dataset
//!   - Uploads that chunk's missing records before moving on to the next chunk
//!
//! Working chunk by chunk keeps each upload bounded and means a cancelled or
//! interrupted run has already uploaded everything it found up to that point.
//!
//! # Error Handling
//! Only setup fails the run ([`SyncError`]): invalid config, unreadable
//! source, audit file conflicts. Once probing starts every failure is recovered
//! locally and counted in the [`SynchroniseReport`].
//!
//! # Navigation
//! - Entrypoint from config: [`run`]
//! - Entrypoint with prepared inputs: [`synchronise`]

use thiserror::Error;
use tracing::{error, info, warn};

use crate::audit::{AuditError, AuditLog};
use crate::cancel::CancelFlag;
use crate::config::{ConfigError, SyncConfig};
use crate::contract::{ExistenceOracle, Record, RemoteStore};
use crate::dataset::{load_dataset_from_path, LoadError, LocalDataset};
use crate::diff::compute_missing;
use crate::probe::{MessageParsingOracle, Prober};
use crate::uploader::{UploadReport, Uploader};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Audit(#[from] AuditError),
}

/// Whether missing records are uploaded or only reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Upload,
    CheckOnly,
}

/// Final counts of a run.
#[derive(Debug, Default)]
pub struct SynchroniseReport {
    pub records_loaded: usize,
    pub duplicates: usize,
    pub malformed_rows: usize,
    pub probed: usize,
    /// Local records confirmed absent remotely.
    pub missing: usize,
    pub uploaded: usize,
    pub permanently_failed: Vec<Record>,
    pub fatally_errored: Vec<Record>,
    /// Missing records not submitted (cancelled or check-only run).
    pub not_submitted: Vec<Record>,
    /// Ids reported missing remotely that were never requested or are unknown locally.
    pub inconsistent: usize,
    /// Ids the remote response said nothing about.
    pub unresolved: usize,
    pub failed_probe_chunks: usize,
    /// Ids never probed, either because their chunk failed or the run was cancelled.
    pub unprobed: usize,
    pub backoff_sleeps: u32,
    pub cancelled: bool,
}

impl SynchroniseReport {
    /// Parse and consistency anomalies recovered during the run.
    pub fn anomalies(&self) -> usize {
        self.malformed_rows + self.inconsistent + self.unresolved
    }

    pub fn has_failures(&self) -> bool {
        !self.permanently_failed.is_empty()
            || !self.fatally_errored.is_empty()
            || self.failed_probe_chunks > 0
    }

    fn absorb_upload(&mut self, upload: UploadReport) {
        self.uploaded += upload.succeeded;
        self.permanently_failed.extend(upload.permanently_failed);
        self.fatally_errored.extend(upload.fatally_errored);
        self.not_submitted.extend(upload.skipped);
        self.backoff_sleeps += upload.backoff_sleeps;
    }

    pub fn trace_summary(&self) {
        info!(
            missing = self.missing,
            uploaded = self.uploaded,
            permanently_failed = self.permanently_failed.len(),
            fatally_errored = self.fatally_errored.len(),
            anomalies = self.anomalies(),
            cancelled = self.cancelled,
            "Synchronisation finished"
        );
    }
}

/// Runs the whole pipeline from a validated config against `store`.
pub async fn run<S>(
    config: &SyncConfig,
    store: &S,
    mode: SyncMode,
    cancel: &CancelFlag,
) -> Result<SynchroniseReport, SyncError>
where
    S: RemoteStore + ?Sized,
{
    config.validate()?;
    config.trace_loaded();

    let dataset = load_dataset_from_path(&config.source)?;
    let audit = AuditLog::create(&config.audit.path, config.audit.overwrite)?;
    let oracle = MessageParsingOracle::new(store, &config.source.name_attribute);

    Ok(synchronise(config, &dataset, &oracle, store, Some(&audit), mode, cancel).await)
}

/// Probes, diffs and uploads `dataset` one probe chunk at a time.
pub async fn synchronise<O, S>(
    config: &SyncConfig,
    dataset: &LocalDataset,
    oracle: &O,
    store: &S,
    audit: Option<&AuditLog>,
    mode: SyncMode,
    cancel: &CancelFlag,
) -> SynchroniseReport
where
    O: ExistenceOracle + ?Sized,
    S: RemoteStore + ?Sized,
{
    info!(records = dataset.len(), ?mode, "[SYNC] Starting synchronisation");

    let mut report = SynchroniseReport {
        records_loaded: dataset.len(),
        duplicates: dataset.duplicates,
        malformed_rows: dataset.malformed,
        ..Default::default()
    };

    let mut prober =
        Prober::new(oracle, config.probe.batch_size).with_retry(config.probe.retry.clone());
    if let Some(audit) = audit {
        prober = prober.with_audit(audit);
    }
    let uploader = Uploader::new(store, config.upload.batch_size, config.upload.retry.clone());

    let ids = dataset.ids();
    let mut chunks = ids.chunks(prober.batch_size());
    for chunk in chunks.by_ref() {
        if cancel.is_cancelled() {
            report.unprobed += chunk.len();
            break;
        }
        let existence = match prober.probe_chunk(chunk).await {
            Ok(existence) => existence,
            Err(e) => {
                error!(error = %e, ids = chunk.len(), "[SYNC] Skipping chunk that could not be probed");
                report.failed_probe_chunks += 1;
                report.unprobed += chunk.len();
                continue;
            }
        };
        report.probed += chunk.len();
        report.unresolved += existence.unresolved.len();
        report.inconsistent += existence.unexpected.len();

        let missing = compute_missing(dataset, &existence.not_found);
        report.inconsistent += missing.inconsistent.len();
        report.missing += missing.records.len();
        info!(
            missing = missing.records.len(),
            total_missing = report.missing,
            "[SYNC] Found objects not in index"
        );

        match mode {
            SyncMode::Upload => report.absorb_upload(uploader.upload(&missing.records, cancel).await),
            SyncMode::CheckOnly => report.not_submitted.extend(missing.records),
        }
    }
    for chunk in chunks {
        report.unprobed += chunk.len();
    }

    report.cancelled = cancel.is_cancelled();
    if report.cancelled {
        warn!(unprobed = report.unprobed, "[SYNC] Run cancelled before completion");
    }
    report.trace_summary();
    report
}
