use serde_json::json;
use tandem_server::RelayConfig;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::integration::init_tracing;
use crate::utils::{WsClient, spawn_relay};

#[tokio::test]
async fn test_welcome_and_ice_config_on_connect() {
    init_tracing();

    let config = RelayConfig::default().with_ice_servers(
        vec!["stun:stun.l.google.com:19302".into()],
        None,
        None,
        None,
    );
    let (addr, state) = spawn_relay(config).await;

    let mut client = WsClient::connect_path(addr, "/api/socket").await;
    let ice = client.recv().await;
    assert_eq!(
        ice,
        json!({
            "type": "ice-config",
            "iceServers": [{ "urls": ["stun:stun.l.google.com:19302"] }]
        })
    );
    assert_eq!(state.signaling.session_count(), 1);

    client.close().await;
}

#[tokio::test]
async fn test_abrupt_disconnect_is_a_single_leave() {
    init_tracing();

    let (addr, _state) = spawn_relay(RelayConfig::default()).await;
    let mut s1 = WsClient::connect(addr).await;
    let mut s2 = WsClient::connect(addr).await;
    let mut s3 = WsClient::connect(addr).await;

    assert_eq!(s1.join("abc", "s1", None).await["type"], "room-joined");
    assert_eq!(s2.join("abc", "s2", None).await["type"], "room-joined");
    assert_eq!(s3.join("abc", "s3", None).await["type"], "room-joined");

    let s1_id = s1.session_id.to_string();
    drop(s1);

    for client in [&mut s2, &mut s3] {
        let left = client.recv_type("user-left").await;
        assert_eq!(left["peerId"], s1_id.as_str());
        assert_eq!(left["username"], "s1");
        assert_eq!(left["users"].as_array().unwrap().len(), 2);
    }

    // The next departure s3 sees is s2's, not a second one for s1.
    s2.send(json!({ "type": "leave-room", "roomId": "abc", "username": "s2" }))
        .await;
    let left = s3.recv_type("user-left").await;
    assert_eq!(left["peerId"], s2.session_id.to_string().as_str());
    assert_eq!(left["users"].as_array().unwrap().len(), 1);

    s2.close().await;
    s3.close().await;
}

#[tokio::test]
async fn test_health_endpoint() {
    init_tracing();

    let (addr, _state) = spawn_relay(RelayConfig::default()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.ends_with("ok"));
}
