//! Request client against a local stub backend.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::routing::{any, get};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use workboard_common::{ErrorKind, UserId};

use super::*;
use crate::auth::{AuthTokenStore, Credential};
use crate::test_support::{client_for, serve};

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Value> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "authorization": header("authorization"),
        "contentType": header("content-type"),
        "body": String::from_utf8_lossy(&body),
    }))
}

fn stub() -> Router {
    Router::new()
        .route("/api/echo", any(echo))
        .route("/api/empty", get(|| async { (StatusCode::OK, "") }))
        .route(
            "/api/rejected-json",
            get(|| async { (StatusCode::BAD_REQUEST, Json(json!({"message": "x"}))) }),
        )
        .route(
            "/api/rejected-text",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        )
        .route("/api/garbled", get(|| async { (StatusCode::OK, "not json") }))
        .route(
            "/api/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                "late"
            }),
        )
}

async fn stub_client(auth: Arc<AuthTokenStore>) -> RequestClient {
    let origin = serve(stub()).await;
    client_for(&origin, auth)
}

#[tokio::test]
async fn empty_success_body_normalizes_to_empty_object() {
    let client = stub_client(Arc::new(AuthTokenStore::in_memory())).await;
    let value = client.send(ApiRequest::get("/api/empty")).await.unwrap();
    assert_eq!(value, json!({}));
}

#[tokio::test]
async fn non_2xx_json_body_is_returned_as_data() {
    let client = stub_client(Arc::new(AuthTokenStore::in_memory())).await;
    let value = client.send(ApiRequest::get("/api/rejected-json")).await.unwrap();
    assert_eq!(value, json!({"message": "x"}));

    let raw = client.execute(ApiRequest::get("/api/rejected-json")).await.unwrap();
    assert_eq!(raw.status, 400);
    assert!(!raw.is_success());
}

#[tokio::test]
async fn non_2xx_text_body_is_remote_rejected() {
    let client = stub_client(Arc::new(AuthTokenStore::in_memory())).await;
    let err = client.send(ApiRequest::get("/api/rejected-text")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteRejected);
    assert_eq!(err.user_message(), "boom");
}

#[tokio::test]
async fn malformed_success_body_is_parse_error() {
    let client = stub_client(Arc::new(AuthTokenStore::in_memory())).await;
    let err = client.send(ApiRequest::get("/api/garbled")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
}

#[tokio::test]
async fn bearer_token_attached_when_present() {
    let auth = Arc::new(AuthTokenStore::in_memory());
    let client = stub_client(Arc::clone(&auth)).await;

    let anonymous = client.send(ApiRequest::get("/api/echo")).await.unwrap();
    assert_eq!(anonymous["authorization"], Value::Null);

    auth.set_credential(Credential::new("T", UserId::new("u1")));
    let signed = client.send(ApiRequest::get("/api/echo")).await.unwrap();
    assert_eq!(signed["authorization"], "Bearer T");
}

#[tokio::test]
async fn json_body_sets_content_type() {
    let client = stub_client(Arc::new(AuthTokenStore::in_memory())).await;
    let value = client
        .send(ApiRequest::post("/api/echo").json(json!({"title": "t"})))
        .await
        .unwrap();
    assert_eq!(value["method"], "POST");
    assert_eq!(value["contentType"], "application/json");
    assert_eq!(value["body"], r#"{"title":"t"}"#);
}

#[tokio::test]
async fn raw_bytes_body_has_no_content_type() {
    let client = stub_client(Arc::new(AuthTokenStore::in_memory())).await;
    let value = client
        .send(ApiRequest::put("/api/echo").body(RequestBody::Bytes(b"raw".to_vec())))
        .await
        .unwrap();
    assert_eq!(value["contentType"], Value::Null);
    assert_eq!(value["body"], "raw");
}

#[tokio::test]
async fn multipart_body_carries_transport_boundary() {
    let client = stub_client(Arc::new(AuthTokenStore::in_memory())).await;
    let form = reqwest::multipart::Form::new().text("name", "report");
    let value = client
        .send(ApiRequest::post("/api/echo").body(RequestBody::Multipart(form)))
        .await
        .unwrap();
    let content_type = value["contentType"].as_str().unwrap();
    assert!(content_type.starts_with("multipart/form-data; boundary="));
}

#[tokio::test]
async fn query_is_serialized_canonically() {
    let client = stub_client(Arc::new(AuthTokenStore::in_memory())).await;
    let value = client
        .send(ApiRequest::get("/api/echo").query("z", 1).query("a", "b c"))
        .await
        .unwrap();
    assert_eq!(value["query"], "a=b+c&z=1");
}

#[tokio::test]
async fn send_as_deserializes() {
    #[derive(serde::Deserialize)]
    struct Echo {
        method: String,
    }
    let client = stub_client(Arc::new(AuthTokenStore::in_memory())).await;
    let echo: Echo = client
        .send_as(ApiRequest::delete("/api/echo"))
        .await
        .unwrap();
    assert_eq!(echo.method, "DELETE");
}

#[tokio::test]
async fn unreachable_backend_is_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(&format!("http://{addr}"), Arc::new(AuthTokenStore::in_memory()));
    let err = client.send(ApiRequest::get("/api/empty")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
}

#[tokio::test]
async fn cancellation_resolves_promptly() {
    let client = stub_client(Arc::new(AuthTokenStore::in_memory())).await;
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let err = client
        .send_with_cancel(ApiRequest::get("/api/slow"), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn invalid_path_never_reaches_network() {
    let client = client_for("http://127.0.0.1:9", Arc::new(AuthTokenStore::in_memory()));
    let err = client.send(ApiRequest::get("/health")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
}
