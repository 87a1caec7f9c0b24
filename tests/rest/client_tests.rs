//! REST client tests

use std::time::Duration;

use pretty_assertions::assert_eq;
use reqwest::Method;
use serde_json::json;

use chat_client::infrastructure::http::{FileAttachment, HttpClient, RestSender};
use chat_client::shared::error::HttpError;

use crate::common::{MockServer, TEST_TOKEN};

fn client(server: &MockServer, token: &str) -> HttpClient {
    HttpClient::new(
        &server.api_url(),
        10,
        token,
        "DiscordBot (chat-client-tests, 0.1.0)",
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn test_current_user_with_valid_token() {
    let server = MockServer::start().await;
    let user = client(&server, TEST_TOKEN).current_user().await.unwrap();

    assert_eq!(user["username"], "test-bot");
    assert_eq!(user["bot"], true);
}

#[tokio::test]
async fn test_current_user_with_bad_token_is_unauthorized() {
    let server = MockServer::start().await;
    let err = client(&server, "wrong").current_user().await.unwrap_err();

    assert!(matches!(err, HttpError::Unauthorized(_)));
}

#[tokio::test]
async fn test_json_body_is_sent_as_json() {
    let server = MockServer::start().await;
    let response = client(&server, TEST_TOKEN)
        .send(
            Method::POST,
            "/channels/42/messages",
            Some(json!({"content": "hello"})),
            Vec::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert!(response.body["content_type"]
        .as_str()
        .unwrap()
        .starts_with("application/json"));
    assert_eq!(response.body["body"]["content"], "hello");
}

#[tokio::test]
async fn test_files_switch_to_multipart() {
    let server = MockServer::start().await;
    let response = client(&server, TEST_TOKEN)
        .send(
            Method::POST,
            "/channels/42/messages",
            Some(json!({"content": "see attached"})),
            vec![FileAttachment::new("notes.txt", b"some notes".to_vec())],
        )
        .await
        .unwrap();

    assert!(response.body["content_type"]
        .as_str()
        .unwrap()
        .starts_with("multipart/form-data"));
    assert_eq!(response.body["has_payload_json"], true);
    assert_eq!(response.body["has_file"], true);
}

#[tokio::test]
async fn test_unknown_route_is_status_error() {
    let server = MockServer::start().await;
    let err = client(&server, TEST_TOKEN)
        .send(Method::GET, "/guilds/1", None, Vec::new())
        .await
        .unwrap_err();

    assert!(matches!(err, HttpError::Status { status: 404, .. }));
}
