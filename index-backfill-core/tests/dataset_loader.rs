use index_backfill_core::config::{IdColumn, SourceConfig};
use index_backfill_core::dataset::{load_dataset, load_dataset_from_path, LoadError};
use std::io::Write;
use tempfile::NamedTempFile;

fn source(id_column: IdColumn) -> SourceConfig {
    let mut config = SourceConfig::new("unused.csv");
    config.id_column = id_column;
    config
}

#[test]
fn test_duplicate_rows_are_merged_with_separator() {
    let input = "id1,Alice\nid1,Alice-dup\n";
    let dataset = load_dataset(input.as_bytes(), &source(IdColumn::First));

    assert_eq!(dataset.len(), 1, "Duplicates collapse into one record");
    assert_eq!(dataset.duplicates, 1);
    let record = dataset.get("id1").expect("id1 should be loaded");
    assert_eq!(record.object_id, "id1");
    assert_eq!(record.attribute("name"), Some("Alice | Alice-dup"));
}

#[test]
fn test_merge_keeps_row_order_and_counts_every_extra_occurrence() {
    let input = "\
title,object_id
Red shoe,100
Blue hat,200
Red shoe v2,100
Red shoe v3,100
";
    let dataset = load_dataset(input.as_bytes(), &source(IdColumn::Last));

    assert_eq!(dataset.ids(), vec!["100".to_string(), "200".to_string()]);
    assert_eq!(dataset.duplicates, 2, "Three rows for 100 means two duplicates");
    assert_eq!(
        dataset.get("100").and_then(|r| r.attribute("name")),
        Some("Red shoe | Red shoe v2 | Red shoe v3")
    );
    assert_eq!(dataset.get("200").and_then(|r| r.attribute("name")), Some("Blue hat"));
    assert!(!dataset.contains("object_id"), "Header row must be skipped");
}

#[test]
fn test_content_keeps_all_non_identifier_fields() {
    let input = "Acme,Widget,Large,sku-9\n";
    let dataset = load_dataset(input.as_bytes(), &source(IdColumn::Last));

    assert_eq!(
        dataset.get("sku-9").and_then(|r| r.attribute("name")),
        Some("Acme,Widget,Large")
    );
}

#[test]
fn test_quoted_fields_are_unquoted() {
    let input = "\"Smith, John\",42\n";
    let dataset = load_dataset(input.as_bytes(), &source(IdColumn::Last));

    assert_eq!(dataset.get("42").and_then(|r| r.attribute("name")), Some("Smith, John"));
}

#[test]
fn test_malformed_rows_are_skipped_and_counted() {
    let input = "\
Alice,1
no-separator
Bob,
,
Carol,3

";
    let dataset = load_dataset(input.as_bytes(), &source(IdColumn::Last));

    assert_eq!(dataset.ids(), vec!["1".to_string(), "3".to_string()]);
    // "no-separator" has a single field, "Bob," has an empty identifier.
    // ",": both fields empty, ignored like a blank line.
    assert_eq!(dataset.malformed, 2);
    assert_eq!(dataset.duplicates, 0);
}

#[test]
fn test_custom_delimiter_attribute_and_index_column() {
    let mut config = source(IdColumn::Index(1));
    config.delimiter = ';';
    config.name_attribute = "title".into();
    let input = "Lamp;L-1;Living room\n";

    let dataset = load_dataset(input.as_bytes(), &config);

    let record = dataset.get("L-1").expect("L-1 should be loaded");
    assert_eq!(record.attribute("title"), Some("Lamp;Living room"));
    assert_eq!(record.attribute("name"), None);
}

#[test]
fn test_load_from_path_reads_file() {
    let mut file = NamedTempFile::new().expect("temp file");
    writeln!(file, "name,object_id\nAlice,a1\nBob,b2").unwrap();

    let dataset = load_dataset_from_path(&SourceConfig::new(file.path())).expect("Should load");

    assert_eq!(dataset.len(), 2);
    assert_eq!(dataset.get("b2").and_then(|r| r.attribute("name")), Some("Bob"));
}

#[test]
fn test_load_from_missing_path_fails() {
    let err = load_dataset_from_path(&SourceConfig::new("/definitely/not/here.csv")).unwrap_err();
    assert!(matches!(err, LoadError::Io { .. }), "Expected Io error, got {err:?}");
}

#[test]
fn test_loading_is_deterministic() {
    let input = "a,1\nb,2\nc,1\nd,3\n";
    let first = load_dataset(input.as_bytes(), &source(IdColumn::Last));
    let second = load_dataset(input.as_bytes(), &source(IdColumn::Last));

    assert_eq!(first.records(), second.records());
}
