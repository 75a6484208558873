//! The WebSocket connector against a real axum server on an ephemeral port.

use std::time::Duration;

use assert_matches::assert_matches;
use axum::Router;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::http::header::USER_AGENT;
use axum::response::Response;
use axum::routing::get;
use secchat_core::constants::CLIENT_TAG;
use secchat_core::{AuthCredentials, ConnectionState, FrameKind, SendOptions, SessionError};
use secchat_transport::{
    HeartbeatConfig, Session, SessionConfig, SessionEvent, WebSocketConnector,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;

const TIMEOUT: Duration = Duration::from_secs(5);
const SERVER_VERSION: &str = "test-build-1";

async fn ws_handler(ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(handle_socket)
}

/// Greets every client with the `User-Agent` it connected with.
async fn whoami_handler(headers: HeaderMap, ws: WebSocketUpgrade) -> Response {
    let agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    ws.on_upgrade(move |mut socket| async move {
        let hello = json!({"type": "whoami", "userAgent": agent}).to_string();
        let _ = socket.send(Message::Text(hello.into())).await;
        while socket.recv().await.is_some() {}
    })
}

/// Minimal chat server: acknowledges auth, answers pings, echoes user
/// content, answers `read` with a binary frame and closes on `recall`.
async fn handle_socket(mut socket: WebSocket) {
    while let Some(Ok(msg)) = socket.recv().await {
        let Message::Text(text) = msg else { continue };
        let Ok(frame) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        let reply = match frame["type"].as_str() {
            Some("auth") => Message::Text(json!({"type": "auth_success"}).to_string().into()),
            Some("ping") => Message::Text(
                json!({"type": "pong", "version": SERVER_VERSION})
                    .to_string()
                    .into(),
            ),
            Some("text" | "image") => Message::Text(text),
            Some("read") => Message::Binary(frame.to_string().into_bytes().into()),
            Some("recall") => {
                let _ = socket
                    .send(Message::Close(Some(CloseFrame {
                        code: 4000,
                        reason: "recalled".into(),
                    })))
                    .await;
                return;
            }
            _ => continue,
        };
        if socket.send(reply).await.is_err() {
            return;
        }
    }
}

async fn boot_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/whoami", get(whoami_handler));
    drop(tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    }));
    format!("ws://{addr}/ws")
}

fn config() -> SessionConfig {
    let mut config = SessionConfig::default();
    config.connect_timeout = Duration::from_secs(2);
    config.heartbeat = HeartbeatConfig {
        interval: Duration::from_millis(100),
        timeout: Duration::from_secs(5),
    };
    config.reconnect.base_delay = Duration::from_millis(50);
    config.reconnect.max_delay = Duration::from_millis(200);
    config.delivery_timeout = Duration::from_secs(2);
    config
}

fn record(session: &Session, names: &[&str]) -> mpsc::UnboundedReceiver<SessionEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    for name in names {
        let tx = tx.clone();
        let _ = session.on(*name, move |event| {
            let _ = tx.send(event.clone());
        });
    }
    rx
}

async fn next(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
    timeout(TIMEOUT, events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event queue closed")
}

async fn wait_authenticated(session: &Session) {
    let _ = timeout(
        TIMEOUT,
        session.wait_for_state(|s| s == ConnectionState::Authenticated),
    )
    .await
    .expect("timed out waiting for auth")
    .unwrap();
}

#[tokio::test]
async fn round_trip_over_real_socket() {
    let url = boot_server().await;
    let session = Session::spawn(config(), WebSocketConnector::new());

    session.connect(&url).await.unwrap();
    assert!(
        session
            .authenticate(AuthCredentials::new("hash", "user_ws", "ws"))
            .await
    );
    wait_authenticated(&session).await;

    let receipt = timeout(
        TIMEOUT,
        session.send_tracked(FrameKind::Text, "over the wire", SendOptions::default()),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(receipt.frame.content(), Some("over the wire"));

    let mut status = session.watch_status();
    let _ = timeout(TIMEOUT, status.wait_for(|s| s.server_version.is_some()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.status().server_version.as_deref(), Some(SERVER_VERSION));

    session.disconnect().await;
    assert_eq!(session.state(), ConnectionState::ManuallyClosed);
}

#[tokio::test]
async fn binary_utf8_frames_are_treated_as_text() {
    let url = boot_server().await;
    let session = Session::spawn(config(), WebSocketConnector::new());
    let mut events = record(&session, &["read"]);

    session.connect(&url).await.unwrap();
    assert!(session.send_read("m42").await);

    let event = next(&mut events).await;
    assert_matches!(event, SessionEvent::Frame(frame) if frame.id() == Some("m42"));
}

#[tokio::test]
async fn server_close_triggers_reconnect_and_reauth() {
    let url = boot_server().await;
    let session = Session::spawn(config(), WebSocketConnector::new());
    let mut events = record(&session, &["disconnected", "reconnecting", "connected"]);

    session.connect(&url).await.unwrap();
    assert_matches!(next(&mut events).await, SessionEvent::Connected);
    assert!(
        session
            .authenticate(AuthCredentials::new("hash", "user_ws", "ws"))
            .await
    );
    wait_authenticated(&session).await;

    assert!(session.send_recall("m1").await);
    assert_matches!(
        next(&mut events).await,
        SessionEvent::Disconnected { reason } if reason.contains("4000")
    );
    assert_matches!(next(&mut events).await, SessionEvent::Reconnecting { attempt: 1, .. });
    assert_matches!(next(&mut events).await, SessionEvent::Connected);
    wait_authenticated(&session).await;
}

#[tokio::test]
async fn nothing_listening_is_a_connect_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let session = Session::spawn(config(), WebSocketConnector::new());
    let result = session.connect(format!("ws://{addr}/ws")).await;
    assert_matches!(result, Err(SessionError::ConnectError { .. }));
    session.disconnect().await;
}

#[tokio::test]
async fn invalid_url_is_a_connect_error() {
    let session = Session::spawn(config(), WebSocketConnector::new());
    let result = session.connect("http://not-a-websocket").await;
    assert_matches!(result, Err(SessionError::ConnectError { .. }));
    session.disconnect().await;
}

#[tokio::test]
async fn upgrade_request_identifies_the_client() {
    let url = boot_server().await;
    let whoami = format!("{}/whoami", url.trim_end_matches("/ws"));
    let session = Session::spawn(config(), WebSocketConnector::new());
    let mut events = record(&session, &["whoami"]);

    session.connect(whoami).await.unwrap();
    let event = next(&mut events).await;
    assert_matches!(
        event,
        SessionEvent::Frame(frame) if frame.str_field("userAgent") == Some(CLIENT_TAG)
    );
    session.disconnect().await;
}

#[tokio::test]
async fn secure_urls_are_rejected_without_tls() {
    let url = boot_server().await.replacen("ws://", "wss://", 1);
    let session = Session::spawn(config(), WebSocketConnector::new());
    let result = session.connect(url).await;
    assert_matches!(result, Err(SessionError::ConnectError { .. }));
    session.disconnect().await;
}
