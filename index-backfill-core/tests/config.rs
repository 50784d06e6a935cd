use index_backfill_core::config::{
    AuditConfig, ConfigError, ProbeConfig, RetryPolicy, SourceConfig, SyncConfig, UploadConfig,
};
use std::time::Duration;

fn config() -> SyncConfig {
    SyncConfig {
        source: SourceConfig::new("records.csv"),
        audit: AuditConfig {
            path: "audit.json".into(),
            overwrite: false,
        },
        probe: ProbeConfig::default(),
        upload: UploadConfig::default(),
    }
}

#[test]
fn test_defaults_are_valid() {
    let config = config();
    assert_eq!(config.probe.batch_size, 1000);
    assert_eq!(config.upload.batch_size, 500);
    assert_eq!(config.source.name_attribute, "name");
    assert_eq!(config.validate(), Ok(()));
}

#[test]
fn test_backoff_grows_exponentially_and_is_capped() {
    let retry = RetryPolicy::default();
    assert_eq!(retry.delay_for(0), Duration::from_secs(20));
    assert_eq!(retry.delay_for(1), Duration::from_secs(40));
    assert_eq!(retry.delay_for(2), Duration::from_secs(80));
    assert_eq!(retry.delay_for(10), Duration::from_secs(300));
    assert_eq!(retry.delay_for(u32::MAX), Duration::from_secs(300));
}

#[test]
fn test_validate_rejects_bad_values() {
    struct TestCase {
        name: &'static str,
        mutate: fn(&mut SyncConfig),
        expected: ConfigError,
    }

    let cases = vec![
        TestCase {
            name: "zero probe batch",
            mutate: |c| c.probe.batch_size = 0,
            expected: ConfigError::ZeroValue("probe.batch_size"),
        },
        TestCase {
            name: "probe batch above remote limit",
            mutate: |c| c.probe.batch_size = 1001,
            expected: ConfigError::ProbeBatchTooLarge(1001),
        },
        TestCase {
            name: "no probe attempts",
            mutate: |c| c.probe.retry.max_attempts = 0,
            expected: ConfigError::ZeroValue("probe.retry.max_attempts"),
        },
        TestCase {
            name: "zero upload batch",
            mutate: |c| c.upload.batch_size = 0,
            expected: ConfigError::ZeroValue("upload.batch_size"),
        },
        TestCase {
            name: "no attempts",
            mutate: |c| c.upload.retry.max_attempts = 0,
            expected: ConfigError::ZeroValue("upload.retry.max_attempts"),
        },
        TestCase {
            name: "blank name attribute",
            mutate: |c| c.source.name_attribute = "  ".into(),
            expected: ConfigError::EmptyNameAttribute,
        },
        TestCase {
            name: "multi-byte delimiter",
            mutate: |c| c.source.delimiter = '§',
            expected: ConfigError::InvalidDelimiter('§'),
        },
    ];

    for case in cases {
        let mut config = config();
        (case.mutate)(&mut config);
        assert_eq!(config.validate(), Err(case.expected), "case: {}", case.name);
    }
}
