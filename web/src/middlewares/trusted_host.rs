use axum::{
    extract::Request,
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

/// Hosts production answers for. A leading `*.` matches any subdomain.
pub const ALLOWED_HOSTS: [&str; 3] = ["localhost", "127.0.0.1", "*.tle.co.id"];

/// Rejects requests whose `Host` is not one of [`ALLOWED_HOSTS`] with `400 Bad Request`.
pub async fn guard(request: Request, next: Next) -> Response {
    let host = request_host(&request);

    if !is_allowed(host.as_deref().unwrap_or_default()) {
        warn!(host = host.as_deref().unwrap_or("<none>"), "rejected untrusted host");
        return (StatusCode::BAD_REQUEST, "Invalid host header").into_response();
    }

    next.run(request).await
}

// HTTP/1 carries the host in the header, HTTP/2 in the request target.
fn request_host(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| request.uri().host())
        .map(strip_port)
        .map(str::to_lowercase)
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return host.split_inclusive(']').next().unwrap_or(host);
    }

    host.split(':').next().unwrap_or(host)
}

fn is_allowed(host: &str) -> bool {
    ALLOWED_HOSTS.iter().any(|pattern| match pattern.strip_prefix('*') {
        Some(suffix) => host.ends_with(suffix),
        None => host == *pattern,
    })
}
