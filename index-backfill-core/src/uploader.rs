//! # uploader: resilient batched upload of missing records
//!
//! Every batch runs through a small state machine:
//!
//! - **Attempt**: one bulk `save_batch` call.
//! - **Payload too large**: fall back to `save_one` per record, in batch order.
//!   Records that still fail are *permanently failed*.
//! - **Unreachable**: sleep with exponential backoff and re-attempt the whole
//!   batch, at most [`RetryPolicy::max_attempts`] times in total. Exhaustion
//!   makes the batch *fatally errored*.
//! - **Any other error**: the batch is *fatally errored* and not retried.
//!
//! Each submitted record ends in exactly one of succeeded, permanently failed
//! or fatally errored. Outcomes are returned by value and merged by the caller.

use tracing::{error, info, warn};

use crate::cancel::CancelFlag;
use crate::config::RetryPolicy;
use crate::contract::{Record, RemoteStore, StoreError};

/// Terminal states of the records of one or more batches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadReport {
    pub succeeded: usize,
    /// Records rejected individually after a payload-too-large fallback.
    pub permanently_failed: Vec<Record>,
    /// Records of batches abandoned on a fatal or exhausted-retry error.
    pub fatally_errored: Vec<Record>,
    /// Records never submitted because the run was cancelled.
    pub skipped: Vec<Record>,
    pub backoff_sleeps: u32,
}

impl UploadReport {
    pub fn merge(&mut self, other: UploadReport) {
        self.succeeded += other.succeeded;
        self.permanently_failed.extend(other.permanently_failed);
        self.fatally_errored.extend(other.fatally_errored);
        self.skipped.extend(other.skipped);
        self.backoff_sleeps += other.backoff_sleeps;
    }

    /// Number of records accounted for in any terminal state.
    pub fn accounted(&self) -> usize {
        self.succeeded
            + self.permanently_failed.len()
            + self.fatally_errored.len()
            + self.skipped.len()
    }
}

pub struct Uploader<'a, S: ?Sized> {
    store: &'a S,
    batch_size: usize,
    retry: RetryPolicy,
}

impl<'a, S: RemoteStore + ?Sized> Uploader<'a, S> {
    pub fn new(store: &'a S, batch_size: usize, retry: RetryPolicy) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            retry,
        }
    }

    /// Uploads `records` in batches, strictly in order.
    pub async fn upload(&self, records: &[Record], cancel: &CancelFlag) -> UploadReport {
        let mut report = UploadReport::default();
        for batch in records.chunks(self.batch_size) {
            if cancel.is_cancelled() {
                warn!(records = batch.len(), "Cancelled, batch not submitted");
                report.skipped.extend(batch.iter().cloned());
                continue;
            }
            report.merge(self.upload_batch(batch).await);
        }
        report
    }

    pub async fn upload_batch(&self, batch: &[Record]) -> UploadReport {
        let mut report = UploadReport::default();
        if batch.is_empty() {
            return report;
        }

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            info!(records = batch.len(), attempt, "Sending batch to index");
            match self.store.save_batch(batch).await {
                Ok(()) => {
                    report.succeeded += batch.len();
                    info!(records = batch.len(), "Batch saved");
                    return report;
                }
                Err(StoreError::PayloadTooLarge(msg)) => {
                    warn!(error = %msg, records = batch.len(), "Batch too big, saving records one by one");
                    let fallback = self.save_individually(batch).await;
                    report.merge(fallback);
                    return report;
                }
                Err(e @ StoreError::Unreachable(_)) => {
                    if attempt >= self.retry.max_attempts {
                        error!(error = %e, attempt, records = batch.len(), "Store still unreachable, giving up on batch");
                        report.fatally_errored.extend(batch.iter().cloned());
                        return report;
                    }
                    let delay = self.retry.delay_for(attempt - 1);
                    warn!(error = %e, attempt, delay_secs = delay.as_secs(), "Store unreachable, backing off");
                    report.backoff_sleeps += 1;
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(error = %e, records = batch.len(), "Unexpected error saving batch");
                    report.fatally_errored.extend(batch.iter().cloned());
                    return report;
                }
            }
        }
    }

    async fn save_individually(&self, batch: &[Record]) -> UploadReport {
        let mut report = UploadReport::default();
        for record in batch {
            match self.store.save_one(record).await {
                Ok(()) => report.succeeded += 1,
                Err(e) => {
                    error!(object_id = %record.object_id, error = %e, "Error saving individual record");
                    report.permanently_failed.push(record.clone());
                }
            }
        }
        report
    }
}
