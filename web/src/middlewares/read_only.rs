use axum::{
    Json,
    extract::{Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{info, warn};

use crate::state::AppState;

const ALLOWED_METHODS: [&str; 2] = ["GET", "OPTIONS"];
const BLOCKED_METHODS: [&str; 4] = ["POST", "PUT", "DELETE", "PATCH"];

fn is_write(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::DELETE | Method::PATCH
    )
}

/// Rejects every write with `405 Method Not Allowed`, pointing the caller at the command
/// service. Reads pass through and are logged.
pub async fn guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    if is_write(&method) {
        let command_url = format!(
            "http://localhost:{}{}",
            state.settings.command_port, path
        );
        warn!(%method, %path, "blocked write on the query service");

        let body = json!({
            "error": "Method Not Allowed",
            "message": format!("{method} operations are not permitted on the query service"),
            "details": {
                "current_service": "Query Service (Read-Only)",
                "command_service_url": command_url,
                "allowed_methods": ALLOWED_METHODS,
                "blocked_methods": BLOCKED_METHODS,
            },
        });

        return (StatusCode::METHOD_NOT_ALLOWED, Json(body)).into_response();
    }

    info!(%method, %path, "query");
    next.run(request).await
}
