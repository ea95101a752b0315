// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP content store tests against a mock server.

use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scriptexec_core::{Diagnostic, EventKind};
use scriptexec_worker::config::ContentStoreSettings;
use scriptexec_worker::content_store::{ContentStore, ContentStoreError, HttpContentStore};

fn store_for(server: &MockServer) -> HttpContentStore {
    HttpContentStore::new(&ContentStoreSettings::new(server.uri())).unwrap()
}

fn snippet_path(id: Uuid, suffix: &str) -> String {
    format!("/internal/snippets/{}/{}", id, suffix)
}

#[tokio::test]
async fn test_get_content() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path(snippet_path(id, "content")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": "let x = 1;"})))
        .expect(1)
        .mount(&server)
        .await;

    let content = store_for(&server).get_content(id).await.unwrap();
    assert_eq!(content, "let x = 1;");
}

#[tokio::test]
async fn test_get_content_sends_bearer_token() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path(snippet_path(id, "content")))
        .and(header("authorization", "Bearer s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": "x"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut settings = ContentStoreSettings::new(format!("{}/", server.uri()));
    settings.api_token = Some("s3cret".into());
    let store = HttpContentStore::new(&settings).unwrap();

    assert_eq!(store.get_content(id).await.unwrap(), "x");
}

#[tokio::test]
async fn test_get_content_without_content_field() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path(snippet_path(id, "content")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": null})))
        .mount(&server)
        .await;

    let err = store_for(&server).get_content(id).await.unwrap_err();
    assert!(matches!(err, ContentStoreError::MissingContent(missing) if missing == id));
    assert_eq!(err.error_code(), "CONTENT_NOT_FOUND");
}

#[tokio::test]
async fn test_error_status_is_reported_with_truncated_body() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path(snippet_path(id, "content")))
        .respond_with(ResponseTemplate::new(503).set_body_string("x".repeat(2000)))
        .mount(&server)
        .await;

    let err = store_for(&server).get_content(id).await.unwrap_err();
    match err {
        ContentStoreError::Http { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body.len(), 503);
            assert!(body.ends_with("..."));
        }
        other => panic!("expected Http error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_save_formatted_posts_content() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path(snippet_path(id, "format")))
        .and(body_json(json!({"content": "let x = 1;\n"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    store_for(&server)
        .save_formatted(id, "let x = 1;\n")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_save_lint_posts_violations() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    let violations = vec![
        Diagnostic::new("camel-case", "x_y should be camelCase", 1, 5),
        Diagnostic::new("println-args", "println takes an identifier or literal", 3, 1),
    ];

    Mock::given(method("POST"))
        .and(path(snippet_path(id, "lint")))
        .and(body_json(serde_json::to_value(&violations).unwrap()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    store_for(&server).save_lint(id, &violations).await.unwrap();
}

#[tokio::test]
async fn test_mark_failed_uses_topic_path() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path(snippet_path(id, "lint/failed")))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(snippet_path(id, "format/failed")))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server);
    store.mark_failed(id, EventKind::Linting).await.unwrap();
    store.mark_failed(id, EventKind::Formatting).await.unwrap();
}

#[tokio::test]
async fn test_write_failure_is_http_error() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path(snippet_path(id, "format")))
        .respond_with(ResponseTemplate::new(500).set_body_string("database down"))
        .mount(&server)
        .await;

    let err = store_for(&server).save_formatted(id, "x").await.unwrap_err();
    assert_eq!(err.error_code(), "CONTENT_STORE_HTTP");
    assert_eq!(
        err.to_string(),
        "Content store returned HTTP 500: database down"
    );
}

#[tokio::test]
async fn test_unreachable_store_is_transport_error() {
    let store = HttpContentStore::new(&ContentStoreSettings::new("http://127.0.0.1:1")).unwrap();
    let err = store.get_content(Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.error_code(), "CONTENT_STORE_TRANSPORT");
}
