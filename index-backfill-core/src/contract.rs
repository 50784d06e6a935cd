//! # contract: data model and remote store interface
//!
//! This module defines the plain data types shared by every pipeline stage
//! ([`Record`], [`GetObjectsResponse`], [`ExistenceReport`]) and the two traits
//! the pipeline is written against:
//!
//! - [`RemoteStore`]: the narrow client contract of the remote document index
//!   (batch fetch by id, batch save, single save).
//! - [`ExistenceOracle`]: answers "which of these ids are already indexed?".
//!   The prober only talks to this trait, so the message-parsing adapter in
//!   [`crate::probe`] can be swapped for a structured existence API.
//!
//! ## Mocking & Testing
//! - Both traits are annotated for `mockall` (behind the `test-export-mocks`
//!   feature) so tests and downstream crates can script store behaviour.
//!
//! ## Error classes
//! Every store failure is a [`StoreError`]. The uploader recovers differently
//! per variant, so implementors must classify carefully: use
//! [`StoreError::from_response`] for HTTP failures and
//! [`StoreError::Unreachable`] for connection-level failures.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use mockall::automock;

/// The attribute name the remote index uses for the record identifier.
pub const OBJECT_ID_FIELD: &str = "objectID";

/// A single record: a unique identifier plus content attributes.
///
/// Serialises flat, e.g. `{"objectID": "42", "name": "Alice"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "objectID")]
    pub object_id: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Record {
    pub fn new(object_id: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
            attributes: Map::new(),
        }
    }

    /// Builder-style helper to set a string attribute.
    pub fn with_attribute(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attributes
            .insert(name.to_string(), Value::String(value.into()));
        self
    }

    /// Returns the attribute as a string slice, if present and a string.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }
}

/// Failure classes reported by a [`RemoteStore`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The request body (or a record in it) exceeds the remote size limit.
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),
    /// No host of the remote store could be reached (connect error, timeout).
    #[error("remote store unreachable: {0}")]
    Unreachable(String),
    /// Any other remote failure (auth, validation, server error).
    #[error("remote store error (status {status:?}): {message}")]
    Other {
        status: Option<u16>,
        message: String,
    },
}

impl StoreError {
    /// Classifies a non-success HTTP response from the remote index.
    pub fn from_response(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if status == 413 || message.contains("is too big") {
            StoreError::PayloadTooLarge(message)
        } else {
            StoreError::Other {
                status: Some(status),
                message,
            }
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        StoreError::Other {
            status: None,
            message: message.into(),
        }
    }

    /// Only connectivity failures are worth retrying as-is.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unreachable(_))
    }
}

/// Response of a batch fetch by identifier.
///
/// `results` is positional with the requested ids; `None` marks an id the
/// store did not return. Some stores only report absence through `message`,
/// which then names every missing id as `ObjectID <id>`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetObjectsResponse {
    pub results: Vec<Option<Value>>,
    pub message: Option<String>,
    /// Untouched response body, persisted to the audit artifact.
    pub raw: Value,
}

impl GetObjectsResponse {
    /// Builds a response from a raw JSON body (`{"results": [...], "message": "..."}`).
    pub fn from_raw(raw: Value) -> Self {
        let results = raw
            .get("results")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|item| if item.is_null() { None } else { Some(item.clone()) })
                    .collect()
            })
            .unwrap_or_default();
        let message = raw
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string);
        Self {
            results,
            message,
            raw,
        }
    }

    /// Identifiers of every non-null result that carries an `objectID`.
    pub fn returned_ids(&self) -> impl Iterator<Item = &str> {
        self.results
            .iter()
            .flatten()
            .filter_map(|obj| obj.get(OBJECT_ID_FIELD).and_then(Value::as_str))
    }
}

/// Trait for the remote document index.
///
/// The implementor is responsible for transport, authentication and for
/// mapping failures onto the right [`StoreError`] variant.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch the given ids, retrieving only `attributes_to_retrieve`.
    async fn get_by_ids(
        &self,
        ids: &[String],
        attributes_to_retrieve: &[String],
    ) -> Result<GetObjectsResponse, StoreError>;

    /// Save all records in one bulk write.
    async fn save_batch(&self, records: &[Record]) -> Result<(), StoreError>;

    /// Save a single record.
    async fn save_one(&self, record: &Record) -> Result<(), StoreError>;
}

/// Existence verdict for one probed chunk of identifiers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExistenceReport {
    /// Ids confirmed present remotely.
    pub found: Vec<String>,
    /// Ids to treat as absent remotely, in request order. Includes `unresolved`.
    pub not_found: Vec<String>,
    /// Requested ids the response said nothing about.
    pub unresolved: Vec<String>,
    /// Ids named as missing that were never requested.
    pub unexpected: Vec<String>,
    /// Raw response payload for the audit artifact.
    pub raw: Value,
}

/// Capability: decide which requested identifiers already exist remotely.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ExistenceOracle: Send + Sync {
    async fn check(&self, ids: &[String]) -> Result<ExistenceReport, StoreError>;
}
