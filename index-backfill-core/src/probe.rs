//! Remote existence probing.
//!
//! [`MessageParsingOracle`] adapts stores that do not flag absent ids per item
//! but report them in one free-text message (`"ObjectID 42 does not exist"`).
//! [`Prober`] walks the candidate ids chunk by chunk, persists every raw
//! response to the audit log and collects the verdicts.

use std::collections::HashSet;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::{error, info, warn};

use crate::audit::AuditLog;
use crate::config::RetryPolicy;
use crate::contract::{ExistenceOracle, ExistenceReport, RemoteStore, StoreError};

fn not_found_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"ObjectID\s+([^\s,;]+)").expect("valid ObjectID pattern"))
}

/// Extracts every `ObjectID <id>` occurrence from a store message, in order.
///
/// Sentence punctuation and quotes around an id are not part of it.
pub fn extract_not_found_ids(message: &str) -> Vec<String> {
    not_found_pattern()
        .captures_iter(message)
        .filter_map(|c| {
            let id = c[1]
                .trim_start_matches(['"', '\'', '('])
                .trim_end_matches(['.', ')', '"', '\'', ':', '!']);
            (!id.is_empty()).then(|| id.to_string())
        })
        .collect()
}

/// [`ExistenceOracle`] over a [`RemoteStore`] whose absence signal is a message.
pub struct MessageParsingOracle<'a, S: ?Sized> {
    store: &'a S,
    attributes_to_retrieve: Vec<String>,
}

impl<'a, S: RemoteStore + ?Sized> MessageParsingOracle<'a, S> {
    /// Only `name_attribute` is retrieved to keep response payloads small.
    pub fn new(store: &'a S, name_attribute: &str) -> Self {
        Self {
            store,
            attributes_to_retrieve: vec![name_attribute.to_string()],
        }
    }
}

#[async_trait]
impl<'a, S: RemoteStore + ?Sized> ExistenceOracle for MessageParsingOracle<'a, S> {
    async fn check(&self, ids: &[String]) -> Result<ExistenceReport, StoreError> {
        let response = self
            .store
            .get_by_ids(ids, &self.attributes_to_retrieve)
            .await?;

        let requested: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let extracted = response
            .message
            .as_deref()
            .map(extract_not_found_ids)
            .unwrap_or_default();
        let named_missing: HashSet<&str> = extracted.iter().map(String::as_str).collect();
        let returned: HashSet<&str> = response.returned_ids().collect();

        let mut report = ExistenceReport {
            raw: response.raw.clone(),
            ..Default::default()
        };

        for id in ids {
            let id_str = id.as_str();
            if named_missing.contains(id_str) {
                if returned.contains(id_str) {
                    warn!(object_id = %id, "Id both returned and reported missing; treating as missing");
                }
                report.not_found.push(id.clone());
            } else if returned.contains(id_str) {
                report.found.push(id.clone());
            } else {
                warn!(object_id = %id, "Response says nothing about id; treating as missing");
                report.unresolved.push(id.clone());
                report.not_found.push(id.clone());
            }
        }

        let mut seen = HashSet::new();
        for id in &extracted {
            if !requested.contains(id.as_str()) && seen.insert(id.as_str()) {
                warn!(object_id = %id, "Store reported an id that was not requested");
                report.unexpected.push(id.clone());
            }
        }

        Ok(report)
    }
}

/// Aggregate result of probing a list of candidate ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeOutcome {
    pub present: Vec<String>,
    /// Absent ids in discovery order.
    pub not_found: Vec<String>,
    pub unresolved: usize,
    pub unexpected: usize,
    /// Ids of chunks that could not be probed; neither present nor missing.
    pub failed: Vec<String>,
    pub failed_chunks: usize,
}

impl ProbeOutcome {
    pub fn present_set(&self) -> HashSet<&str> {
        self.present.iter().map(String::as_str).collect()
    }

    pub fn not_found_set(&self) -> HashSet<&str> {
        self.not_found.iter().map(String::as_str).collect()
    }

    fn absorb(&mut self, report: ExistenceReport) {
        self.unresolved += report.unresolved.len();
        self.unexpected += report.unexpected.len();
        self.present.extend(report.found);
        self.not_found.extend(report.not_found);
    }
}

/// Chunked, strictly sequential existence prober.
pub struct Prober<'a, O: ?Sized> {
    oracle: &'a O,
    audit: Option<&'a AuditLog>,
    batch_size: usize,
    retry: RetryPolicy,
}

impl<'a, O: ExistenceOracle + ?Sized> Prober<'a, O> {
    pub fn new(oracle: &'a O, batch_size: usize) -> Self {
        Self {
            oracle,
            audit: None,
            batch_size: batch_size.max(1),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_audit(mut self, audit: &'a AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Probes one chunk, retrying connectivity failures with backoff.
    pub async fn probe_chunk(&self, ids: &[String]) -> Result<ExistenceReport, StoreError> {
        let mut attempt = 0u32;
        let report = loop {
            attempt += 1;
            match self.oracle.check(ids).await {
                Ok(report) => break report,
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt - 1);
                    warn!(error = %e, attempt, delay_secs = delay.as_secs(), "Store unreachable while probing, backing off");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(error = %e, attempt, ids = ids.len(), "Probe chunk failed");
                    return Err(e);
                }
            }
        };

        if let Some(audit) = self.audit {
            if let Err(e) = audit.append(&report.raw) {
                error!(error = %e, "Failed to append probe response to audit file");
            }
        }

        info!(
            requested = ids.len(),
            found = report.found.len(),
            not_found = report.not_found.len(),
            unresolved = report.unresolved.len(),
            "Probed chunk"
        );
        Ok(report)
    }

    /// Probes every id in chunks of `batch_size`, in order.
    pub async fn probe(&self, ids: &[String]) -> ProbeOutcome {
        let mut outcome = ProbeOutcome::default();
        let total = ids.len();
        for (n, chunk) in ids.chunks(self.batch_size).enumerate() {
            info!(offset = n * self.batch_size, total, "Checking index chunk");
            match self.probe_chunk(chunk).await {
                Ok(report) => outcome.absorb(report),
                Err(_) => {
                    outcome.failed_chunks += 1;
                    outcome.failed.extend(chunk.iter().cloned());
                }
            }
        }
        outcome
    }
}
