//! Resume, reconnect and terminal close tests

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use chat_client::shared::error::GatewayError;

use crate::common::{gateway_config, MockServer, RunningClient, TEST_TOKEN};

#[tokio::test]
async fn test_reconnect_request_resumes_session() {
    let mut server = MockServer::start().await;
    let mut client = RunningClient::spawn(gateway_config(server.gateway_url()));

    let mut conn = server.accept().await;
    conn.hello(45000);
    conn.recv_op(2).await;
    conn.ready("abc", 41);
    conn.dispatch(42, "MESSAGE_CREATE", json!({"content": "hi"}));
    client.next_event().await;
    client.next_event().await;

    conn.op(7, Value::Null);
    assert_eq!(conn.recv_close().await, Some(4000));

    let mut conn = server.accept().await;
    conn.hello(45000);
    let resume = conn.recv_op(6).await;
    assert_eq!(
        resume["d"],
        json!({"token": TEST_TOKEN, "session_id": "abc", "seq": 42})
    );

    conn.dispatch(43, "RESUMED", json!({}));
    assert_eq!(client.next_event().await.0, "RESUMED");
    assert_eq!(client.handle.sequence(), Some(43));

    client.handle.stop();
    client.finish().await.unwrap();
}

#[tokio::test]
async fn test_session_timeout_close_identifies_again() {
    let mut server = MockServer::start().await;
    let mut client = RunningClient::spawn(gateway_config(server.gateway_url()));

    let mut conn = server.accept().await;
    conn.hello(45000);
    conn.recv_op(2).await;
    conn.ready("abc", 1);
    client.next_event().await;

    conn.close(4009, "Session timed out");
    assert_eq!(client.next_error_code().await, 4009);

    let mut conn = server.accept().await;
    conn.hello(45000);
    let identify = conn.recv_op(2).await;
    assert_eq!(identify["d"]["token"], TEST_TOKEN);

    client.handle.stop();
    client.finish().await.unwrap();
}

#[tokio::test]
async fn test_resumable_close_code_resumes() {
    let mut server = MockServer::start().await;
    let mut client = RunningClient::spawn(gateway_config(server.gateway_url()));

    let mut conn = server.accept().await;
    conn.hello(45000);
    conn.recv_op(2).await;
    conn.ready("abc", 5);
    client.next_event().await;

    conn.close(4000, "Unknown error");
    assert_eq!(client.next_error_code().await, 4000);

    let mut conn = server.accept().await;
    conn.hello(45000);
    let resume = conn.recv_op(6).await;
    assert_eq!(resume["d"]["session_id"], "abc");
    assert_eq!(resume["d"]["seq"], 5);

    client.handle.stop();
    client.finish().await.unwrap();
}

#[tokio::test]
async fn test_authentication_failure_is_terminal() {
    let mut server = MockServer::start().await;
    let mut client = RunningClient::spawn(gateway_config(server.gateway_url()));

    let mut conn = server.accept().await;
    conn.hello(45000);
    conn.recv_op(2).await;
    conn.close(4004, "Authentication failed");

    assert_eq!(client.next_error_code().await, 4004);
    let err = client.finish().await.unwrap_err();
    assert!(matches!(err, GatewayError::Auth(_)));
}

#[tokio::test]
async fn test_disallowed_intents_is_terminal() {
    let mut server = MockServer::start().await;
    let client = RunningClient::spawn(gateway_config(server.gateway_url()));

    let mut conn = server.accept().await;
    conn.hello(45000);
    conn.recv_op(2).await;
    conn.close(4014, "Disallowed intent(s)");

    let err = client.finish().await.unwrap_err();
    assert!(matches!(err, GatewayError::Closed { code: 4014, .. }));
}

#[tokio::test]
async fn test_invalid_session_not_resumable_identifies() {
    let mut server = MockServer::start().await;
    let mut client = RunningClient::spawn(gateway_config(server.gateway_url()));

    let mut conn = server.accept().await;
    conn.hello(45000);
    conn.recv_op(2).await;
    conn.ready("abc", 3);
    client.next_event().await;

    conn.op(9, json!(false));
    assert_eq!(conn.recv_close().await, Some(1000));

    let mut conn = server.accept().await;
    conn.hello(45000);
    conn.recv_op(2).await;
    assert_eq!(client.handle.sequence(), None);

    client.handle.stop();
    client.finish().await.unwrap();
}

#[tokio::test]
async fn test_invalid_session_resumable_resumes() {
    let mut server = MockServer::start().await;
    let mut client = RunningClient::spawn(gateway_config(server.gateway_url()));

    let mut conn = server.accept().await;
    conn.hello(45000);
    conn.recv_op(2).await;
    conn.ready("abc", 3);
    client.next_event().await;

    conn.op(9, json!(true));
    assert_eq!(conn.recv_close().await, Some(4000));

    let mut conn = server.accept().await;
    conn.hello(45000);
    let resume = conn.recv_op(6).await;
    assert_eq!(resume["d"]["seq"], 3);

    client.handle.stop();
    client.finish().await.unwrap();
}

#[tokio::test]
async fn test_undecodable_frame_drops_session() {
    let mut server = MockServer::start().await;
    let mut client = RunningClient::spawn(gateway_config(server.gateway_url()));

    let mut conn = server.accept().await;
    conn.hello(45000);
    conn.recv_op(2).await;
    conn.ready("abc", 1);
    client.next_event().await;

    conn.send_text("{not json");
    assert_eq!(client.next_error_code().await, 20001);

    let mut conn = server.accept().await;
    conn.hello(45000);
    conn.recv_op(2).await;

    client.handle.stop();
    client.finish().await.unwrap();
}

#[tokio::test]
async fn test_missing_acks_trip_the_watchdog() {
    let mut server = MockServer::start().await;
    let mut config = gateway_config(server.gateway_url());
    config.max_missed_acks = 2;
    let client = RunningClient::spawn(config);

    let mut conn = server.accept().await;
    conn.hello(50);
    conn.recv_op(2).await;

    // No ACKs: the client gives up on this socket and resumes.
    assert_eq!(conn.recv_close().await, Some(4000));

    let mut conn = server.accept().await;
    conn.hello(45000);
    conn.recv_op(2).await;

    client.handle.stop();
    client.finish().await.unwrap();
}
