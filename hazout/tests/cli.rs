use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::write;
use tempfile::{tempdir, NamedTempFile};

fn hazout() -> Command {
    let mut cmd = Command::cargo_bin("hazout").expect("Binary exists");
    cmd.env_remove("HAZOUT_BUCKET")
        .env_remove("HAZOUT_ENDPOINT")
        .env_remove("HAZOUT_TIMEOUT_SECS");
    cmd
}

/// Writes a curve table and a config file pointing at it.
fn curve_config(dir: &std::path::Path) -> std::path::PathBuf {
    let table = dir.join("curves.json");
    write(
        &table,
        r#"{"curves": [{"model": "NSHMP_WUS_2008", "imt": "PGA", "lat": 34.05, "lon": -118.25,
            "xs": [0.005, 0.1, 1.0], "ys": [0.02, 0.0004, 0.00001]}]}"#,
    )
    .expect("Writing curve table failed");
    let config = dir.join("hazout.yaml");
    write(&config, format!("curves:\n  table: {}\n", table.display()))
        .expect("Writing config failed");
    config
}

#[test]
fn curve_without_path_prints_usage() {
    hazout()
        .arg("curve")
        .assert()
        .success()
        .stdout(predicate::str::contains("HazardCurve usage"));
}

#[test]
fn curve_prints_two_comma_separated_lines() {
    let dir = tempdir().unwrap();
    let config = curve_config(dir.path());

    hazout()
        .args(["curve", "/2008/WUS/PGA/-118.25/34.05", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("0.005,0.1,1\n0.02,0.0004,0.00001"));
}

#[test]
fn curve_with_malformed_path_prints_usage() {
    let dir = tempdir().unwrap();
    let config = curve_config(dir.path());

    hazout()
        .args(["curve", "/2008/WUS/PGA", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("HazardCurve usage"));
}

#[test]
fn curve_for_unsupported_model_fails() {
    let dir = tempdir().unwrap();
    let config = curve_config(dir.path());

    hazout()
        .args(["curve", "/2020/WUS/PGA/-118.25/34.05", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stdout(predicate::str::contains("Model NSHMP_WUS_2020 not currently supported"));
}

#[test]
fn results_against_unreachable_store_prints_error_envelope() {
    let config = NamedTempFile::new().expect("Creating temp config file failed");
    write(
        config.path(),
        "store:\n  endpoint: http://127.0.0.1:9\n  bucket: nshmp-hazout\nindex:\n  timeout_secs: 20\n",
    )
    .expect("Writing temp config failed");

    hazout()
        .args(["results", "--config"])
        .arg(config.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"status\": \"ERROR\""))
        .stdout(predicate::str::contains("\"date\""))
        .stdout(predicate::str::contains("hazardResults").not());
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, Layer, Registry};

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

    use hazout::cli::{run, Cli, Commands};

    let cli = Cli {
        command: Commands::Curve {
            path: None,
            config: None,
        },
    };
    run(cli).await.expect("Usage request succeeds");

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
