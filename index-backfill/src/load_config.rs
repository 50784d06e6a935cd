/// `load_config` module: Loads a static YAML config and injects secrets from the environment.
///
/// This module is the only place where untrusted YAML is parsed and mapped to the
/// strongly-typed core [`SyncConfig`] and the client [`StoreSettings`].
///
/// # Responsibilities
/// - Parse the YAML file into intermediate structs
/// - Inject `ALGOLIA_API_KEY` (required) and `ALGOLIA_APP_ID` (unless set in YAML)
/// - Validate the result, so the pipeline never starts from a bad config
///
/// # Errors
/// All errors use `anyhow::Error` for context-rich diagnostics and are surfaced at the CLI boundary.
use anyhow::{Context, Result};
use index_backfill_core::config::{AuditConfig, ProbeConfig, SourceConfig, SyncConfig, UploadConfig};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};

use crate::store::StoreSettings;

pub const APP_ID_ENV: &str = "ALGOLIA_APP_ID";
pub const API_KEY_ENV: &str = "ALGOLIA_API_KEY";

#[derive(Debug)]
pub struct CliConfig {
    pub sync: SyncConfig,
    pub store: StoreSettings,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    source: SourceConfig,
    audit: AuditConfig,
    #[serde(default)]
    probe: ProbeConfig,
    #[serde(default)]
    upload: UploadConfig,
    store: StoreSection,
}

#[derive(Debug, Deserialize)]
struct StoreSection {
    index_name: String,
    #[serde(default)]
    app_id: Option<String>,
    #[serde(default = "default_connect_timeout_secs")]
    connect_timeout_secs: u64,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
    #[serde(default)]
    hosts: Option<Vec<String>>,
}

fn default_connect_timeout_secs() -> u64 {
    2
}

fn default_timeout_secs() -> u64 {
    30
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let raw: RawConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    let app_id = match raw.store.app_id.filter(|id| !id.trim().is_empty()) {
        Some(id) => id,
        None => std::env::var(APP_ID_ENV).map_err(|e| {
            error!(error = ?e, "{APP_ID_ENV} not set and store.app_id missing from config");
            anyhow::anyhow!("{APP_ID_ENV} environment variable not set: {e}")
        })?,
    };

    let api_key = match std::env::var(API_KEY_ENV) {
        Ok(key) => {
            info!("{API_KEY_ENV} found in env");
            key
        }
        Err(e) => {
            error!(error = ?e, "{API_KEY_ENV} environment variable not set");
            return Err(anyhow::anyhow!(
                "{API_KEY_ENV} environment variable not set: {e}"
            ));
        }
    };

    if raw.store.index_name.trim().is_empty() {
        anyhow::bail!("store.index_name must not be empty");
    }

    let sync = SyncConfig {
        source: raw.source,
        audit: raw.audit,
        probe: raw.probe,
        upload: raw.upload,
    };
    sync.validate().context("Invalid configuration")?;

    let store = StoreSettings {
        app_id,
        api_key,
        index_name: raw.store.index_name,
        connect_timeout: Duration::from_secs(raw.store.connect_timeout_secs),
        timeout: Duration::from_secs(raw.store.timeout_secs),
        hosts: raw.store.hosts,
    };

    info!(
        index = %store.index_name,
        source = %sync.source.path.display(),
        "Config loaded and merged successfully"
    );

    Ok(CliConfig { sync, store })
}
