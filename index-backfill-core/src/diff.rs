use std::collections::HashSet;

use tracing::warn;

use crate::contract::Record;
use crate::dataset::LocalDataset;

/// Records to upload, plus ids the store reported missing that are not in the dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MissingRecords {
    pub records: Vec<Record>,
    pub inconsistent: Vec<String>,
}

/// Looks up every not-found id in the local dataset, keeping discovery order.
///
/// Each id yields at most one record. Ids without a local record are reported
/// in `inconsistent` and skipped.
pub fn compute_missing(dataset: &LocalDataset, not_found: &[String]) -> MissingRecords {
    let mut seen = HashSet::with_capacity(not_found.len());
    let mut missing = MissingRecords::default();
    for id in not_found {
        if !seen.insert(id.as_str()) {
            continue;
        }
        match dataset.get(id) {
            Some(record) => missing.records.push(record.clone()),
            None => {
                warn!(object_id = %id, "Object reported missing remotely is not in the local dataset");
                missing.inconsistent.push(id.clone());
            }
        }
    }
    missing
}
