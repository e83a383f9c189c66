use std::{
    cell::Cell,
    io,
    net::Ipv4Addr,
    sync::{Arc, Mutex},
};

use color_eyre::eyre::eyre;
use erp_query_config::Settings;
use erp_query_web::{
    app::{App, Shutdown},
    error::Error,
    readiness::HealthCheck,
    runtime::{ServeOutcome, ServerRuntime},
    server::ServerRuntimeConfig,
    tracing::LOG_FILE,
};
use tracing_subscriber::fmt::MakeWriter;

use crate::test_settings;

/// Records every configuration it is started with and answers with a fixed outcome.
struct RecordingRuntime {
    outcome: fn() -> ServeOutcome,
    runs: Mutex<Vec<ServerRuntimeConfig>>,
}

impl RecordingRuntime {
    fn new(outcome: fn() -> ServeOutcome) -> Self {
        Self {
            outcome,
            runs: Mutex::new(Vec::new()),
        }
    }

    fn runs(&self) -> Vec<ServerRuntimeConfig> {
        self.runs.lock().unwrap().clone()
    }
}

impl ServerRuntime for RecordingRuntime {
    fn run(&self, _settings: &Settings, config: ServerRuntimeConfig) -> ServeOutcome {
        self.runs.lock().unwrap().push(config);
        (self.outcome)()
    }
}

/// Collects the output of a scoped subscriber.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Boots with a subscriber scoped to this thread and returns what it logged.
fn boot_logged(
    settings: &Settings,
    health: &impl HealthCheck,
    runtime: &impl ServerRuntime,
) -> (Result<Shutdown, Error>, String) {
    let logs = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .finish();

    let result = tracing::subscriber::with_default(subscriber, || {
        App::boot(settings, health, runtime)
    });

    (result, logs.contents())
}

fn healthy() -> bool {
    true
}

fn unhealthy() -> bool {
    false
}

fn production_settings(log_dir: &std::path::Path) -> Settings {
    Settings {
        log_dir: log_dir.join("logs"),
        ..test_settings("production")
    }
}

#[test]
fn failing_readiness_never_starts_the_runtime() {
    let runtime = RecordingRuntime::new(|| ServeOutcome::Completed);

    let shutdown = App::boot(&test_settings("development"), &unhealthy, &runtime).unwrap();

    assert!(matches!(shutdown, Shutdown::Fatal(Error::Readiness)));
    assert_eq!(shutdown.code(), 1);
    assert!(runtime.runs().is_empty());
}

#[test]
fn passing_readiness_starts_the_runtime_once() {
    let runtime = RecordingRuntime::new(|| ServeOutcome::Completed);

    let shutdown = App::boot(&test_settings("development"), &healthy, &runtime).unwrap();

    assert!(matches!(shutdown, Shutdown::Graceful));
    let runs = runtime.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].host, Ipv4Addr::LOCALHOST);
    assert_eq!(runs[0].production, None);
}

#[test]
fn interrupt_exits_cleanly() {
    let runtime = RecordingRuntime::new(|| ServeOutcome::Interrupted);

    let (result, logs) = boot_logged(&test_settings("development"), &healthy, &runtime);
    let shutdown = result.unwrap();

    assert!(matches!(shutdown, Shutdown::Graceful));
    assert_eq!(shutdown.code(), 0);
    assert!(logs.contains("shutting down gracefully"), "{logs}");
}

#[test]
fn runtime_fault_exits_with_failure() {
    let runtime = RecordingRuntime::new(|| ServeOutcome::Faulted(eyre!("address in use")));

    let (result, logs) = boot_logged(&test_settings("development"), &healthy, &runtime);
    let shutdown = result.unwrap();

    assert!(matches!(shutdown, Shutdown::Fatal(Error::Runtime(_))));
    assert_eq!(shutdown.code(), 1);
    assert!(logs.contains("ERROR"), "{logs}");
    assert!(logs.contains("server runtime failed"), "{logs}");
    assert!(logs.contains("address in use"), "{logs}");
}

#[test]
fn failing_readiness_is_logged() {
    let runtime = RecordingRuntime::new(|| ServeOutcome::Completed);

    let (result, logs) = boot_logged(&test_settings("development"), &unhealthy, &runtime);

    assert!(matches!(result, Ok(Shutdown::Fatal(Error::Readiness))));
    assert!(logs.contains("starting ERP query service"), "{logs}");
    assert!(logs.contains("database health check failed"), "{logs}");
}

#[test]
fn config_change_asks_for_a_restart() {
    let runtime = RecordingRuntime::new(|| ServeOutcome::Reload);

    let shutdown = App::boot(&test_settings("development"), &healthy, &runtime).unwrap();

    assert!(matches!(shutdown, Shutdown::Restart));
    assert_eq!(shutdown.code(), 0);
}

#[test]
fn production_boot_writes_the_log_file_and_tunes_the_runtime() {
    let dir = tempfile::tempdir().unwrap();
    let settings = production_settings(dir.path());
    let runtime = RecordingRuntime::new(|| ServeOutcome::Interrupted);

    let shutdown = App::boot(&settings, &healthy, &runtime).unwrap();

    assert!(matches!(shutdown, Shutdown::Graceful));
    assert!(settings.log_dir.join(LOG_FILE).is_file());
    let runs = runtime.runs();
    assert_eq!(runs[0].host, Ipv4Addr::UNSPECIFIED);
    assert_eq!(runs[0].workers(), Some(4));
}

#[test]
fn invalid_log_level_stops_before_the_readiness_check() {
    let probed = Cell::new(false);
    let probe = || {
        probed.set(true);
        true
    };
    let runtime = RecordingRuntime::new(|| ServeOutcome::Completed);
    let settings = Settings {
        log_level: "chatty".to_string(),
        ..test_settings("development")
    };

    let result = App::boot(&settings, &probe, &runtime);

    assert!(matches!(result, Err(Error::InvalidLogLevel(_))));
    assert!(!probed.get());
    assert!(runtime.runs().is_empty());
}

#[test]
fn invalid_log_settings_leave_no_log_directory() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = RecordingRuntime::new(|| ServeOutcome::Completed);
    let bad_level = Settings {
        log_level: "chatty".to_string(),
        ..production_settings(dir.path())
    };
    let bad_format = Settings {
        log_format: "%(message)s".to_string(),
        ..production_settings(dir.path())
    };

    let level_result = App::boot(&bad_level, &healthy, &runtime);
    let format_result = App::boot(&bad_format, &healthy, &runtime);

    assert!(matches!(level_result, Err(Error::InvalidLogLevel(_))));
    assert!(matches!(format_result, Err(Error::InvalidLogFormat(_))));
    assert!(!dir.path().join("logs").exists());
    assert!(runtime.runs().is_empty());
}
