use std::{fs, process::ExitCode};

use erp_query_config::Settings;
use tracing::{error, info};

use crate::{
    error::Error,
    readiness::{HealthCheck, check_prerequisites},
    runtime::{ServeOutcome, ServerRuntime},
    server::ServerRuntimeConfig,
    tracing::{LogFormat, Tracing, parse_level},
};

/// The terminal state of one boot.
#[derive(Debug)]
pub enum Shutdown {
    /// Stopped by an operator interrupt or on its own.
    Graceful,
    /// Stopped to pick up changed configuration; the caller boots again.
    Restart,
    /// Stopped on a failed readiness check or a runtime fault, already logged.
    Fatal(Error),
}

impl Shutdown {
    /// The process exit code for this terminal state.
    pub fn code(&self) -> u8 {
        match self {
            Shutdown::Graceful | Shutdown::Restart => 0,
            Shutdown::Fatal(_) => 1,
        }
    }
}

impl From<Shutdown> for ExitCode {
    fn from(shutdown: Shutdown) -> Self {
        ExitCode::from(shutdown.code())
    }
}

pub struct App;

impl App {
    // Boots the query service: logging, readiness, server configuration,
    // then blocks in the server runtime until it stops.
    //
    // Errors returned from here happened before logging was
    // available and still need to be reported by the caller.
    pub fn boot(
        settings: &Settings,
        health: &impl HealthCheck,
        runtime: &impl ServerRuntime,
    ) -> Result<Shutdown, Error> {
        let environment = settings.environment();

        // A rejected level or format must not leave a log directory behind.
        parse_level(&settings.log_level)?;
        settings.log_format.parse::<LogFormat>()?;

        if environment.is_production() {
            fs::create_dir_all(&settings.log_dir).map_err(|source| Error::LogSink {
                path: settings.log_dir.clone(),
                source,
            })?;
        }

        Tracing::init(environment, settings)?;

        info!("starting ERP query service");
        info!("environment: {}", settings.environment);
        info!("port: {}", settings.api_port);

        if let Err(err) = check_prerequisites(health) {
            return Ok(Shutdown::Fatal(err));
        }

        let config = ServerRuntimeConfig::build(environment, settings);

        info!("starting with configuration:");
        for (name, value) in config.options() {
            info!("   {name}: {value}");
        }

        let shutdown = match runtime.run(settings, config) {
            ServeOutcome::Interrupted => {
                info!("shutting down gracefully");
                Shutdown::Graceful
            }
            ServeOutcome::Completed => {
                info!("server shutdown successfully");
                Shutdown::Graceful
            }
            ServeOutcome::Reload => {
                info!("configuration changed, restarting");
                Shutdown::Restart
            }
            ServeOutcome::Faulted(report) => {
                error!("server runtime failed: {report:?}");
                Shutdown::Fatal(Error::Runtime(report))
            }
        };

        Ok(shutdown)
    }
}
