//! End-to-end gateway tests against a fake in-process server.

use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use pylon_core::{ClientProperties, IdentifyPayload, Presence};
use pylon_gateway::{ConnectionState, Gateway, GatewayConfig, GatewayEvent, ReconnectPolicy};

const TIMEOUT: Duration = Duration::from_secs(5);

type ServerWs = WebSocketStream<TcpStream>;

fn identify_payload() -> IdentifyPayload {
    IdentifyPayload {
        token: "test-token".into(),
        properties: ClientProperties::default(),
        presence: Presence::default(),
        intents: 0,
    }
}

fn test_config(url: &str) -> GatewayConfig {
    GatewayConfig {
        url: url.into(),
        identify: identify_payload(),
        reconnect: ReconnectPolicy::with_schedule(
            Duration::from_millis(10),
            Duration::from_millis(80),
            3,
        ),
    }
}

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

async fn accept_ws(listener: &TcpListener) -> ServerWs {
    let (stream, _) = timeout(TIMEOUT, listener.accept()).await.unwrap().unwrap();
    tokio_tungstenite::accept_async(stream).await.unwrap()
}

async fn send_json(ws: &mut ServerWs, value: Value) {
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}

async fn recv_frame(ws: &mut ServerWs) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next()).await.unwrap().unwrap().unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn next_event(rx: &mut broadcast::Receiver<GatewayEvent>) -> GatewayEvent {
    timeout(TIMEOUT, rx.recv()).await.unwrap().unwrap()
}

#[tokio::test]
async fn handshake_identifies_once_and_heartbeats_at_cadence() {
    let (listener, url) = bind().await;

    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        send_json(&mut ws, json!({"op": 10, "d": {"heartbeat_interval": 100}})).await;

        // Exactly one identify in response to hello.
        let identify = recv_frame(&mut ws).await;
        assert_eq!(identify["op"], 2);
        assert_eq!(identify["d"]["token"], "test-token");
        assert_eq!(identify["d"]["presence"]["status"], "online");

        send_json(
            &mut ws,
            json!({"op": 0, "t": "READY", "s": 1, "d": {"session_id": "sess-1"}}),
        )
        .await;

        // Two heartbeats roughly one interval apart, echoing the sequence.
        let first = recv_frame(&mut ws).await;
        let first_at = Instant::now();
        assert_eq!(first["op"], 1, "expected heartbeat, got {first}");
        assert_eq!(first["d"], 1);
        send_json(&mut ws, json!({"op": 11})).await;

        let second = recv_frame(&mut ws).await;
        let gap = first_at.elapsed();
        assert_eq!(second["op"], 1);
        assert!(
            gap >= Duration::from_millis(60) && gap <= Duration::from_millis(500),
            "heartbeat cadence off: {gap:?}"
        );
        send_json(&mut ws, json!({"op": 11})).await;
    });

    let gateway = Gateway::new(test_config(&url));
    let mut events = gateway.subscribe();
    gateway.connect();

    assert!(matches!(next_event(&mut events).await, GatewayEvent::Connected));
    match next_event(&mut events).await {
        GatewayEvent::Ready(info) => assert_eq!(info.session_id, "sess-1"),
        other => panic!("expected ready, got {other:?}"),
    }

    assert_eq!(gateway.state(), ConnectionState::Ready);
    server.await.unwrap();
    gateway.disconnect();
}

#[tokio::test]
async fn dispatches_are_forwarded_with_event_type() {
    let (listener, url) = bind().await;

    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        send_json(&mut ws, json!({"op": 10, "d": {"heartbeat_interval": 30_000}})).await;
        let _identify = recv_frame(&mut ws).await;
        send_json(
            &mut ws,
            json!({"op": 0, "t": "READY", "s": 1, "d": {"session_id": "s"}}),
        )
        .await;
        send_json(
            &mut ws,
            json!({"op": 0, "t": "MESSAGE_CREATE", "s": 2, "d": {"id": "42"}}),
        )
        .await;
        // Unrecognized opcode must be dropped without killing the connection.
        send_json(&mut ws, json!({"op": 9, "d": false})).await;
        send_json(
            &mut ws,
            json!({"op": 0, "t": "MESSAGE_UPDATE", "s": 3, "d": {"id": "42"}}),
        )
        .await;
        ws
    });

    let gateway = Gateway::new(test_config(&url));
    let mut events = gateway.subscribe();
    gateway.connect();

    assert!(matches!(next_event(&mut events).await, GatewayEvent::Connected));
    assert!(matches!(next_event(&mut events).await, GatewayEvent::Ready(_)));
    match next_event(&mut events).await {
        GatewayEvent::Dispatch { event_type, data } => {
            assert_eq!(event_type, "MESSAGE_CREATE");
            assert_eq!(data["id"], "42");
        }
        other => panic!("expected dispatch, got {other:?}"),
    }
    // The bad opcode was skipped; the next dispatch still arrives.
    match next_event(&mut events).await {
        GatewayEvent::Dispatch { event_type, .. } => assert_eq!(event_type, "MESSAGE_UPDATE"),
        other => panic!("expected dispatch, got {other:?}"),
    }

    let _ws = server.await.unwrap();
    gateway.disconnect();
}

#[tokio::test]
async fn clean_disconnect_closes_with_sentinel_and_never_reconnects() {
    let (listener, url) = bind().await;

    let (close_tx, close_rx) = tokio::sync::oneshot::channel::<u16>();
    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        send_json(&mut ws, json!({"op": 10, "d": {"heartbeat_interval": 30_000}})).await;
        let _identify = recv_frame(&mut ws).await;

        // Read until the client's close frame and report its code.
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(Some(frame)))) => {
                    close_tx.send(u16::from(frame.code)).unwrap();
                    break;
                }
                Some(Ok(_)) => {}
                _ => panic!("connection dropped without close frame"),
            }
        }

        // A reconnect would dial within ~10ms on the test schedule; give it
        // 300ms and require silence.
        let second = timeout(Duration::from_millis(300), listener.accept()).await;
        assert!(second.is_err(), "client reconnected after a clean disconnect");
    });

    let gateway = Gateway::new(test_config(&url));
    let mut events = gateway.subscribe();
    gateway.connect();

    assert!(matches!(next_event(&mut events).await, GatewayEvent::Connected));
    gateway.disconnect();

    loop {
        match next_event(&mut events).await {
            GatewayEvent::Disconnected { code, .. } => {
                assert_eq!(code, 1000);
                break;
            }
            GatewayEvent::Error(e) => panic!("unexpected error: {e}"),
            _ => {}
        }
    }

    assert_eq!(close_rx.await.unwrap(), 1000);
    server.await.unwrap();
    assert_eq!(gateway.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn abnormal_closes_reconnect_until_the_budget_is_spent() {
    let (listener, url) = bind().await;

    let server = tokio::spawn(async move {
        let mut accepted = 0u32;
        // Initial attempt + 3 reconnects on the test schedule.
        for _ in 0..4 {
            let mut ws = accept_ws(&listener).await;
            accepted += 1;
            ws.close(Some(CloseFrame {
                code: CloseCode::from(4001),
                reason: "go away".into(),
            }))
            .await
            .unwrap();
            // Drain until the stream ends so the close completes.
            while ws.next().await.is_some() {}
        }
        // After exhaustion there must be no further dial.
        let extra = timeout(Duration::from_millis(300), listener.accept()).await;
        assert!(extra.is_err(), "client reconnected past the attempt budget");
        accepted
    });

    let gateway = Gateway::new(test_config(&url));
    let mut events = gateway.subscribe();
    gateway.connect();

    let mut disconnects = 0u32;
    loop {
        match next_event(&mut events).await {
            GatewayEvent::Disconnected { code, reason } => {
                assert_eq!(code, 4001);
                assert_eq!(reason, "go away");
                disconnects += 1;
            }
            GatewayEvent::ReconnectExhausted => break,
            _ => {}
        }
    }

    assert_eq!(disconnects, 4);
    assert_eq!(server.await.unwrap(), 4);
}

#[tokio::test]
async fn missing_heartbeat_ack_tears_down_the_connection() {
    let (listener, url) = bind().await;

    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        send_json(&mut ws, json!({"op": 10, "d": {"heartbeat_interval": 50}})).await;
        let _identify = recv_frame(&mut ws).await;
        // First heartbeat arrives but is never acknowledged.
        let hb = recv_frame(&mut ws).await;
        assert_eq!(hb["op"], 1);

        // The client should give up on this connection and dial again.
        let _second = accept_ws(&listener).await;
    });

    let gateway = Gateway::new(test_config(&url));
    let mut events = gateway.subscribe();
    gateway.connect();

    let mut saw_ack_timeout = false;
    loop {
        match next_event(&mut events).await {
            GatewayEvent::Error(message) if message.contains("ack timeout") => {
                saw_ack_timeout = true;
            }
            GatewayEvent::Connected if saw_ack_timeout => break,
            _ => {}
        }
    }

    server.await.unwrap();
    gateway.disconnect();
}
