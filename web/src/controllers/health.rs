use axum::{Json, Router, extract::State, routing::get};
use erp_query_db::{ConnectionInfo, connection_info, ping};
use serde::Serialize;

use crate::state::AppState;

pub const SERVICE_NAME: &str = "Query Service";

#[derive(Serialize)]
pub struct ServiceStatus {
    pub status: &'static str,
    pub service: &'static str,
    pub environment: String,
}

#[derive(Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub database: String,
    pub service: &'static str,
    pub environment: String,
    pub operations: [&'static str; 1],
    pub companion: String,
    pub pool: ConnectionInfo,
}

pub struct HealthController;

impl HealthController {
    pub fn router() -> Router<AppState> {
        Router::new()
            .route("/", get(HealthController::status))
            .route("/health", get(HealthController::report))
            .route("/api/health", get(HealthController::report))
            .route("/api/query/health", get(HealthController::report))
    }

    pub async fn status(State(state): State<AppState>) -> Json<ServiceStatus> {
        Json(ServiceStatus {
            status: "healthy",
            service: SERVICE_NAME,
            environment: state.settings.environment.clone(),
        })
    }

    /// Reports the database state alongside the service identity.
    ///
    /// Always answers `200 OK`; an unreachable database turns the status into "degraded".
    pub async fn report(State(state): State<AppState>) -> Json<HealthReport> {
        let database = match ping(&state.db_pool).await {
            Ok(()) => "connected".to_string(),
            Err(err) => {
                tracing::warn!("health route could not reach the database: {err}");
                format!("error: {err}")
            }
        };

        Json(HealthReport {
            status: if database == "connected" {
                "healthy"
            } else {
                "degraded"
            },
            database,
            service: SERVICE_NAME,
            environment: state.settings.environment.clone(),
            operations: ["READ"],
            companion: format!("Command Service on port {}", state.settings.command_port),
            pool: connection_info(&state.db_pool),
        })
    }
}
