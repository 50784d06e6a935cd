use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit file {0} already exists (set audit.overwrite to replace it)")]
    AlreadyExists(PathBuf),
    #[error("audit file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialise audit entry: {0}")]
    Serialise(#[from] serde_json::Error),
}

/// Append-only log of raw probe responses, kept for post-hoc inspection.
///
/// Each entry is written and flushed as soon as it arrives so an interrupted
/// run still leaves every response it received on disk.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn create(path: impl AsRef<Path>, overwrite: bool) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        if path.exists() && !overwrite {
            return Err(AuditError::AlreadyExists(path));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| AuditError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&path, b"").map_err(|source| AuditError::Io {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), overwrite, "Audit file created");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &Value) -> Result<(), AuditError> {
        let mut body = serde_json::to_string_pretty(entry)?;
        body.push('\n');
        let io_err = |source| AuditError::Io {
            path: self.path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;
        file.write_all(body.as_bytes()).map_err(io_err)?;
        file.flush().map_err(io_err)?;
        debug!(path = %self.path.display(), bytes = body.len(), "Appended audit entry");
        Ok(())
    }
}
