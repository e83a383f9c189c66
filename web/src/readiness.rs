use erp_query_config::DatabaseConfig;
use tracing::{debug, error};

use crate::error::Error;

/// A dependency probe that answers whether the service can start taking traffic.
pub trait HealthCheck {
    fn is_healthy(&self) -> bool;
}

impl<F> HealthCheck for F
where
    F: Fn() -> bool,
{
    fn is_healthy(&self) -> bool {
        self()
    }
}

/// Probes the configured database with a one-off connection.
pub struct DatabaseHealthCheck {
    config: DatabaseConfig,
}

impl DatabaseHealthCheck {
    pub fn new(config: &DatabaseConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl HealthCheck for DatabaseHealthCheck {
    // The bootstrap is synchronous and the server runtime does not exist yet, so the
    // probe gets a throwaway runtime of its own.
    fn is_healthy(&self) -> bool {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                error!("could not start the health probe runtime: {err}");
                return false;
            }
        };

        runtime.block_on(erp_query_db::check_health(&self.config))
    }
}

/// Runs the readiness probe once. There is no retry: a failing dependency stops the boot.
pub fn check_prerequisites(health: &impl HealthCheck) -> Result<(), Error> {
    if !health.is_healthy() {
        error!("database health check failed, refusing to start");
        return Err(Error::Readiness);
    }

    debug!("all prerequisites checked");
    Ok(())
}
