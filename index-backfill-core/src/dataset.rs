//! Dataset loader: turns a delimited export into a [`LocalDataset`].
//!
//! Rows sharing an identifier are merged rather than dropped: the content of
//! every later row is appended to the name attribute with [`MERGE_SEPARATOR`].

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{IdColumn, SourceConfig};
use crate::contract::Record;

pub const MERGE_SEPARATOR: &str = " | ";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open dataset {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Insertion-ordered map of identifier to merged record.
#[derive(Debug, Clone, Default)]
pub struct LocalDataset {
    records: Vec<Record>,
    index: HashMap<String, usize>,
    /// Rows merged into an earlier record with the same identifier.
    pub duplicates: usize,
    /// Rows skipped because no identifier or content could be extracted.
    pub malformed: usize,
}

impl LocalDataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, object_id: &str) -> Option<&Record> {
        self.index.get(object_id).map(|&i| &self.records[i])
    }

    pub fn contains(&self, object_id: &str) -> bool {
        self.index.contains_key(object_id)
    }

    /// Identifiers in first-seen order.
    pub fn ids(&self) -> Vec<String> {
        self.records.iter().map(|r| r.object_id.clone()).collect()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Inserts a row's content, merging into an existing record if the id is known.
    fn insert_row(&mut self, object_id: &str, content: String, name_attribute: &str) {
        match self.index.get(object_id) {
            Some(&i) => {
                let record = &mut self.records[i];
                let merged = match record.attribute(name_attribute) {
                    Some(existing) => format!("{existing}{MERGE_SEPARATOR}{content}"),
                    None => content,
                };
                record
                    .attributes
                    .insert(name_attribute.to_string(), Value::String(merged));
                self.duplicates += 1;
                debug!(object_id, "Merged duplicate row");
            }
            None => {
                self.index.insert(object_id.to_string(), self.records.len());
                self.records
                    .push(Record::new(object_id).with_attribute(name_attribute, content));
            }
        }
    }
}

pub fn load_dataset_from_path(config: &SourceConfig) -> Result<LocalDataset, LoadError> {
    let path = &config.path;
    info!(path = %path.display(), "Reading dataset");
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(load_dataset(file, config))
}

/// Parses rows from `reader`. Malformed rows are skipped with a diagnostic.
pub fn load_dataset<R: Read>(reader: R, config: &SourceConfig) -> LocalDataset {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(config.delimiter as u8)
        .from_reader(reader);

    let delimiter = config.delimiter.to_string();
    let mut dataset = LocalDataset::default();

    for row in csv_reader.records() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable row");
                dataset.malformed += 1;
                continue;
            }
        };
        let line = row.position().map(|p| p.line()).unwrap_or_default();

        if row.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        let Some((object_id, content)) = split_row(&row, config.id_column, &delimiter) else {
            warn!(line, "Skipping malformed row: no identifier or content");
            dataset.malformed += 1;
            continue;
        };
        if object_id.contains(&config.header_marker) {
            debug!(line, "Skipping header row");
            continue;
        }
        dataset.insert_row(&object_id, content, &config.name_attribute);
    }

    if dataset.duplicates > 0 {
        info!(
            duplicates = dataset.duplicates,
            remaining = dataset.len(),
            "Found duplicate objects in the input file"
        );
    }
    info!(
        records = dataset.len(),
        malformed = dataset.malformed,
        "Dataset loaded"
    );
    dataset
}

fn split_row(row: &csv::StringRecord, id_column: IdColumn, delimiter: &str) -> Option<(String, String)> {
    if row.len() < 2 {
        return None;
    }
    let id_pos = match id_column {
        IdColumn::First => 0,
        IdColumn::Last => row.len() - 1,
        IdColumn::Index(i) if i < row.len() => i,
        IdColumn::Index(_) => return None,
    };
    let object_id = row.get(id_pos)?.trim();
    if object_id.is_empty() {
        return None;
    }
    let content = row
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != id_pos)
        .map(|(_, field)| field)
        .collect::<Vec<_>>()
        .join(delimiter);
    Some((object_id.to_string(), content))
}
