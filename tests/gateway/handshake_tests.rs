//! Handshake, dispatch and command tests

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use chat_client::domain::Intents;

use crate::common::{gateway_config, within, MockServer, RunningClient, TEST_TOKEN};

#[tokio::test]
async fn test_identify_then_dispatches_in_wire_order() {
    let mut server = MockServer::start().await;
    let mut client = RunningClient::spawn(gateway_config(server.gateway_url()));

    let mut conn = server.accept().await;
    assert_eq!(
        conn.query.as_deref(),
        Some("v=10&encoding=json&compress=zlib-stream")
    );

    conn.hello(45000);
    let identify = conn.recv_op(2).await;
    assert_eq!(identify["d"]["token"], TEST_TOKEN);
    assert_eq!(identify["d"]["intents"], Intents::standard().bits());

    conn.send_compressed(
        json!({"op": 0, "s": 1, "t": "READY", "d": {"session_id": "abc"}}),
        1,
    );
    for seq in 2..=4u64 {
        conn.send_compressed(
            json!({"op": 0, "s": seq, "t": "MESSAGE_CREATE", "d": {"content": format!("m{}", seq)}}),
            3,
        );
    }

    assert_eq!(client.next_event().await.0, "READY");
    for seq in 2..=4u64 {
        let (name, data) = client.next_event().await;
        assert_eq!(name, "MESSAGE_CREATE");
        assert_eq!(data["content"], format!("m{}", seq));
    }
    assert_eq!(client.handle.sequence(), Some(4));
    assert!(client.handle.is_connected());

    conn.close(1000, "bye");
    client.finish().await.unwrap();
    server.assert_no_connection(Duration::from_millis(300)).await;
}

#[tokio::test]
async fn test_local_stop_closes_normally() {
    let mut server = MockServer::start().await;
    let mut client = RunningClient::spawn(gateway_config(server.gateway_url()));

    let mut conn = server.accept().await;
    conn.hello(45000);
    conn.recv_op(2).await;
    conn.ready("abc", 1);
    assert_eq!(client.next_event().await.0, "READY");

    client.handle.stop();

    assert_eq!(conn.recv_close().await, Some(1000));
    client.finish().await.unwrap();
}

#[tokio::test]
async fn test_commands_go_out_on_current_socket() {
    let mut server = MockServer::start().await;
    let mut client = RunningClient::spawn(gateway_config(server.gateway_url()));

    let mut conn = server.accept().await;
    conn.hello(45000);
    conn.recv_op(2).await;
    conn.ready("abc", 1);
    client.next_event().await;

    client
        .handle
        .update_presence(json!({"status": "idle", "afk": true}))
        .unwrap();
    client.handle.request_guild_members("42", "ab", 10).unwrap();

    let presence = conn.recv_op(3).await;
    assert_eq!(presence["d"]["status"], "idle");
    let members = conn.recv_op(8).await;
    assert_eq!(members["d"], json!({"guild_id": "42", "query": "ab", "limit": 10}));

    let handle = client.handle.clone();
    handle.stop();
    client.finish().await.unwrap();
    assert!(!handle.is_connected());
    assert!(handle.update_presence(json!({"status": "online"})).is_err());
}

#[tokio::test]
async fn test_server_heartbeat_request_is_answered() {
    let mut server = MockServer::start().await;
    let client = RunningClient::spawn(gateway_config(server.gateway_url()));

    let mut conn = server.accept().await;
    conn.hello(45000);
    conn.recv_op(2).await;

    conn.op(1, Value::Null);
    let beat = conn.recv_op(1).await;
    assert_eq!(beat["d"], Value::Null);

    client.handle.stop();
    client.finish().await.unwrap();
}

#[tokio::test]
async fn test_heartbeats_carry_last_sequence() {
    let mut server = MockServer::start().await;
    let mut client = RunningClient::spawn(gateway_config(server.gateway_url()));

    let mut conn = server.accept().await;
    conn.hello(100);
    conn.recv_op(2).await;
    conn.ready("abc", 7);
    client.next_event().await;

    within(async {
        loop {
            let beat = conn.recv_op(1).await;
            conn.op(11, Value::Null);
            if beat["d"] == 7 {
                break;
            }
        }
    })
    .await;

    client.handle.stop();
    client.finish().await.unwrap();
}
