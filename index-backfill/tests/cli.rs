use assert_cmd::Command;
use predicates::prelude::*;
use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, Layer, Registry};

#[test]
fn help_lists_subcommands() {
    let mut cmd = Command::cargo_bin("index-backfill").expect("Binary exists");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("sync").and(predicate::str::contains("check")));
}

#[test]
fn sync_with_missing_config_fails() {
    let mut cmd = Command::cargo_bin("index-backfill").expect("Binary exists");
    cmd.arg("sync")
        .arg("--config")
        .arg("/no/such/backfill.yaml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.events.lock().unwrap().push(format!("{:?}", event));
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use index_backfill::cli::{run, Cli, Commands};

    let cli = Cli {
        command: Commands::Check {
            config: std::path::PathBuf::from("dummy.yaml"),
        },
    };

    let result = run(cli).await;
    assert!(result.is_err(), "dummy.yaml does not exist");

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
