use index_backfill_core::config::SourceConfig;
use index_backfill_core::dataset::{load_dataset, LocalDataset};
use index_backfill_core::diff::compute_missing;

fn dataset() -> LocalDataset {
    let input = "Alice,a\nBob,b\nCarol,c\nDave,d\nBob again,b\n";
    load_dataset(input.as_bytes(), &SourceConfig::new("unused.csv"))
}

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_missing_records_follow_discovery_order() {
    let dataset = dataset();
    let missing = compute_missing(&dataset, &ids(&["d", "b"]));

    let got: Vec<&str> = missing.records.iter().map(|r| r.object_id.as_str()).collect();
    assert_eq!(got, vec!["d", "b"]);
    assert_eq!(missing.records[1].attribute("name"), Some("Bob | Bob again"));
    assert!(missing.inconsistent.is_empty());
}

#[test]
fn test_unknown_ids_are_counted_separately() {
    let dataset = dataset();
    let missing = compute_missing(&dataset, &ids(&["a", "ghost", "c"]));

    assert_eq!(missing.records.len(), 2);
    assert_eq!(missing.inconsistent, ids(&["ghost"]));
}

#[test]
fn test_each_known_id_appears_exactly_once() {
    let dataset = dataset();
    let not_found = ids(&["a", "c", "a", "ghost", "c", "ghost"]);
    let missing = compute_missing(&dataset, &not_found);

    for id in ["a", "c"] {
        let count = missing.records.iter().filter(|r| r.object_id == id).count();
        assert_eq!(count, 1, "{id} should be emitted once");
    }
    assert_eq!(missing.inconsistent, ids(&["ghost"]));
}

#[test]
fn test_compute_missing_is_idempotent() {
    let dataset = dataset();
    let not_found = ids(&["c", "x", "a", "d"]);

    let first = compute_missing(&dataset, &not_found);
    let second = compute_missing(&dataset, &not_found);

    assert_eq!(first, second);
}

#[test]
fn test_empty_not_found_set_yields_nothing() {
    let missing = compute_missing(&dataset(), &[]);
    assert!(missing.records.is_empty());
    assert!(missing.inconsistent.is_empty());
}
