use axum::http::{StatusCode, header};

use crate::test_request;

#[tokio::test]
async fn production_rejects_unknown_hosts() {
    test_request("production", |request, _| async move {
        let response = request
            .get("/health")
            .add_header(header::HOST, "erp.example.com")
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_text("Invalid host header");
    })
    .await;
}

#[tokio::test]
async fn production_serves_trusted_hosts() {
    test_request("production", |request, _| async move {
        for host in ["localhost:2025", "127.0.0.1", "erp.tle.co.id"] {
            request
                .get("/health")
                .add_header(header::HOST, host)
                .await
                .assert_status_ok();
        }
    })
    .await;
}

#[tokio::test]
async fn development_serves_any_host() {
    test_request("development", |request, _| async move {
        request
            .get("/health")
            .add_header(header::HOST, "erp.example.com")
            .await
            .assert_status_ok();
    })
    .await;
}
