use axum::http::StatusCode;
use serde_json::Value;

use crate::test_request;

#[tokio::test]
async fn writes_are_redirected_to_the_command_service() {
    test_request("development", |request, _| async move {
        let response = request.post("/health").await;

        response.assert_status(StatusCode::METHOD_NOT_ALLOWED);
        let body: Value = response.json();
        assert_eq!(
            body["details"]["command_service_url"],
            "http://localhost:3108/health"
        );
        assert_eq!(body["details"]["allowed_methods"][0], "GET");
    })
    .await;
}

#[tokio::test]
async fn every_write_method_is_blocked_on_any_path() {
    test_request("production", |request, _| async move {
        request
            .put("/api/query/orders")
            .await
            .assert_status(StatusCode::METHOD_NOT_ALLOWED);
        request
            .patch("/api/query/orders/1")
            .await
            .assert_status(StatusCode::METHOD_NOT_ALLOWED);
        request
            .delete("/")
            .await
            .assert_status(StatusCode::METHOD_NOT_ALLOWED);
    })
    .await;
}

#[tokio::test]
async fn reads_pass_through() {
    test_request("production", |request, _| async move {
        request.get("/health").await.assert_status_ok();
        request
            .get("/does-not-exist")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    })
    .await;
}
