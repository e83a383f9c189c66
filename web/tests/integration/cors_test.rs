use axum::http::{Method, header};

use crate::test_request;

#[tokio::test]
async fn development_accepts_any_origin() {
    test_request("development", |request, _| async move {
        let response = request
            .get("/health")
            .add_header(header::ORIGIN, "http://phone.local:8081")
            .await;

        response.assert_status_ok();
        assert_eq!(
            response.header(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            "http://phone.local:8081"
        );
        assert_eq!(
            response.header(header::ACCESS_CONTROL_ALLOW_CREDENTIALS),
            "true"
        );
    })
    .await;
}

#[tokio::test]
async fn production_only_allows_the_frontend() {
    test_request("production", |request, _| async move {
        let response = request
            .get("/health")
            .add_header(header::ORIGIN, "http://phone.local:8081")
            .await;

        response.assert_status_ok();
        assert_eq!(
            response.header(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            "http://localhost:3000"
        );
    })
    .await;
}

#[tokio::test]
async fn preflight_lists_methods_and_mirrors_headers() {
    test_request("development", |request, _| async move {
        let response = request
            .method(Method::OPTIONS, "/api/query/orders")
            .add_header(header::ORIGIN, "http://localhost:3000")
            .add_header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .add_header(header::ACCESS_CONTROL_REQUEST_HEADERS, "x-device-id")
            .await;

        response.assert_status_ok();
        let methods = response.header(header::ACCESS_CONTROL_ALLOW_METHODS);
        assert!(methods.to_str().unwrap().contains("GET"), "{methods:?}");
        assert_eq!(
            response.header(header::ACCESS_CONTROL_ALLOW_HEADERS),
            "x-device-id"
        );
    })
    .await;
}

#[tokio::test]
async fn blocked_writes_still_carry_cors_headers() {
    test_request("development", |request, _| async move {
        let response = request
            .post("/health")
            .add_header(header::ORIGIN, "http://localhost:3000")
            .await;

        assert_eq!(
            response.header(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            "http://localhost:3000"
        );
    })
    .await;
}
