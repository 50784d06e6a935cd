use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Largest number of ids the remote index accepts in one fetch request.
pub const MAX_PROBE_BATCH_SIZE: usize = 1000;

/// Validated configuration for one backfill run.
///
/// Built (and validated) before the pipeline starts; the pipeline never
/// prompts for or re-reads configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub source: SourceConfig,
    pub audit: AuditConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

/// Where the local dataset lives and how its rows are laid out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub path: PathBuf,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    #[serde(default)]
    pub id_column: IdColumn,
    /// A row whose identifier field contains this marker is a header.
    #[serde(default = "default_header_marker")]
    pub header_marker: String,
    /// Attribute the row content is stored under.
    #[serde(default = "default_name_attribute")]
    pub name_attribute: String,
}

/// Column holding the record identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdColumn {
    First,
    #[default]
    Last,
    Index(usize),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    pub path: PathBuf,
    /// Truncate an existing audit file instead of refusing to start.
    #[serde(default)]
    pub overwrite: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_probe_batch_size")]
    pub batch_size: usize,
    /// Backoff for an unreachable store while probing. Independent of `upload.retry`.
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            batch_size: default_probe_batch_size(),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_upload_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            batch_size: default_upload_batch_size(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Bounded exponential backoff for transient connectivity failures.
///
/// `max_attempts` counts every attempt, including the first one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_secs")]
    pub initial_backoff_secs: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub multiplier: u32,
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_secs: default_initial_backoff_secs(),
            multiplier: default_backoff_multiplier(),
            max_backoff_secs: default_max_backoff_secs(),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0 = first retry), capped at `max_backoff_secs`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = u64::from(self.multiplier.max(1)).saturating_pow(retry);
        let secs = self
            .initial_backoff_secs
            .saturating_mul(factor)
            .min(self.max_backoff_secs);
        Duration::from_secs(secs)
    }
}

fn default_delimiter() -> char {
    ','
}

fn default_header_marker() -> String {
    "object_id".to_string()
}

fn default_name_attribute() -> String {
    "name".to_string()
}

fn default_probe_batch_size() -> usize {
    MAX_PROBE_BATCH_SIZE
}

fn default_upload_batch_size() -> usize {
    500
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff_secs() -> u64 {
    20
}

fn default_backoff_multiplier() -> u32 {
    2
}

fn default_max_backoff_secs() -> u64 {
    300
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),
    #[error("probe.batch_size {0} exceeds the remote limit of {max}", max = MAX_PROBE_BATCH_SIZE)]
    ProbeBatchTooLarge(usize),
    #[error("source.name_attribute must not be empty")]
    EmptyNameAttribute,
    #[error("source.delimiter {0:?} must be a single-byte character")]
    InvalidDelimiter(char),
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.probe.batch_size == 0 {
            return Err(ConfigError::ZeroValue("probe.batch_size"));
        }
        if self.probe.batch_size > MAX_PROBE_BATCH_SIZE {
            return Err(ConfigError::ProbeBatchTooLarge(self.probe.batch_size));
        }
        if self.probe.retry.max_attempts == 0 {
            return Err(ConfigError::ZeroValue("probe.retry.max_attempts"));
        }
        if self.upload.batch_size == 0 {
            return Err(ConfigError::ZeroValue("upload.batch_size"));
        }
        if self.upload.retry.max_attempts == 0 {
            return Err(ConfigError::ZeroValue("upload.retry.max_attempts"));
        }
        if self.source.name_attribute.trim().is_empty() {
            return Err(ConfigError::EmptyNameAttribute);
        }
        if !self.source.delimiter.is_ascii() {
            return Err(ConfigError::InvalidDelimiter(self.source.delimiter));
        }
        Ok(())
    }

    pub fn trace_loaded(&self) {
        info!(
            source = %self.source.path.display(),
            audit = %self.audit.path.display(),
            name_attribute = %self.source.name_attribute,
            probe_batch_size = self.probe.batch_size,
            upload_batch_size = self.upload.batch_size,
            max_attempts = self.upload.retry.max_attempts,
            "Loaded SyncConfig"
        );
        debug!(?self, "SyncConfig loaded (full debug)");
    }
}

impl SourceConfig {
    /// Source settings with the defaults of the usual export format.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delimiter: default_delimiter(),
            id_column: IdColumn::default(),
            header_marker: default_header_marker(),
            name_attribute: default_name_attribute(),
        }
    }
}
