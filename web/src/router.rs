use std::time::Duration;

use axum::{
    Json, Router,
    http::{HeaderValue, Method, StatusCode, Uri, header},
    middleware,
    response::IntoResponse,
};
use erp_query_config::Environment;
use serde_json::json;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{
    controllers::health::HealthController,
    middlewares::{read_only, trusted_host},
    server::ServerRuntimeConfig,
    state::AppState,
    tracing::parse_level,
};

/// Value of the `server` header when the runtime identifies itself.
pub const SERVER_NAME: &str = concat!("erp-query-service/", env!("CARGO_PKG_VERSION"));

/// The only origin allowed outside development.
pub const FRONTEND_ORIGIN: &str = "http://localhost:3000";

pub fn init_router(app_state: &AppState, config: &ServerRuntimeConfig) -> Router {
    let environment = app_state.settings.environment();

    let mut router = Router::new()
        .merge(HealthController::router())
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            read_only::guard,
        ))
        .layer(cors_layer(environment))
        .with_state(app_state.clone())
        // Graceful shutdown will wait for outstanding requests to complete. Add a timeout so
        // requests don't hang forever.
        .layer(TimeoutLayer::new(Duration::from_secs(10)));

    if environment.is_production() {
        router = router.layer(middleware::from_fn(trusted_host::guard));
    }

    if config.access_log {
        let level = access_log_level(config);
        router = router.layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(level))
                .on_request(DefaultOnRequest::new().level(level))
                .on_response(DefaultOnResponse::new().level(level)),
        );
    }

    if config.server_header() {
        router = router.layer(SetResponseHeaderLayer::if_not_present(
            header::SERVER,
            HeaderValue::from_static(SERVER_NAME),
        ));
    }

    router
}

/// Any origin may call a development server; everything else only serves the frontend.
fn cors_layer(environment: Environment) -> CorsLayer {
    let origin = match environment {
        Environment::Development => AllowOrigin::mirror_request(),
        Environment::Production => AllowOrigin::exact(HeaderValue::from_static(FRONTEND_ORIGIN)),
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::mirror_request())
}

/// Access events follow the process log level once the runtime defers its log config,
/// otherwise they stay at the tower-http defaults.
fn access_log_level(config: &ServerRuntimeConfig) -> Level {
    if config.defers_log_config() {
        parse_level(&config.log_level).unwrap_or(Level::INFO)
    } else {
        Level::DEBUG
    }
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Not Found", "path": uri.path() })),
    )
}
