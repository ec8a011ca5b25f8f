//! End-to-end tests of the WebSocket driver against a loopback server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_tungstenite::{accept_async, tungstenite::Message};

use tile_common::{Request, ResponseEnvelope, TileCoord};
use transport::{run_websocket, Transport, TransportConfig, TransportError, WebSocketConnection};

const TIMEOUT: Duration = Duration::from_secs(5);

fn config(addr: std::net::SocketAddr) -> TransportConfig {
    TransportConfig {
        ws_url: format!("ws://{}", addr),
        base_url: "http://agg".to_string(),
        retry_interval: Duration::from_millis(50),
        ..TransportConfig::default()
    }
}

fn answer(text: &str) -> String {
    let request: Request = serde_json::from_str(text).unwrap();
    ResponseEnvelope::success_for(&request, Some(serde_json::json!([4.0, 2.0])))
        .to_json()
        .unwrap()
}

#[tokio::test]
async fn test_coalesced_requests_cross_the_wire_once() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let frames = Arc::new(AtomicUsize::new(0));

    let server_frames = frames.clone();
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(socket).await.unwrap();
        while let Some(Ok(Message::Text(text))) = ws.next().await {
            server_frames.fetch_add(1, Ordering::SeqCst);
            ws.send(Message::Text(answer(&text))).await.unwrap();
        }
    });

    let connection = WebSocketConnection::new();
    let transport = Transport::new(connection.clone(), "http://agg");
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let driver = tokio::spawn(run_websocket(
        config(addr),
        connection,
        transport.clone(),
        shutdown_rx,
    ));

    let request = Request::tile("trips", "es", TileCoord::new(3, 1, 2), None);
    let pending: Vec<_> = (0..3).map(|_| transport.get(request.clone())).collect();

    for future in pending {
        let resolved = tokio::time::timeout(TIMEOUT, future).await.unwrap().unwrap();
        assert_eq!(resolved.url, "http://agg/tile/trips/es/3/1/2");
    }
    assert_eq!(frames.load(Ordering::SeqCst), 1);

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(TIMEOUT, driver).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_dropped_socket_rejects_then_reconnects() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        // First connection: swallow one request, then hang up.
        let (socket, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(socket).await.unwrap();
        let _ = ws.next().await;
        drop(ws);

        // Second connection: answer everything.
        let (socket, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(socket).await.unwrap();
        while let Some(Ok(Message::Text(text))) = ws.next().await {
            ws.send(Message::Text(answer(&text))).await.unwrap();
        }
    });

    let connection = WebSocketConnection::new();
    let transport = Transport::new(connection.clone(), "http://agg");
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(run_websocket(
        config(addr),
        connection,
        transport.clone(),
        shutdown_rx,
    ));

    let lost = transport.get(Request::tile("trips", "es", TileCoord::new(1, 0, 0), None));
    let outcome = tokio::time::timeout(TIMEOUT, lost).await.unwrap();
    assert_eq!(outcome.unwrap_err(), TransportError::ConnectionLost);

    let retried = transport.get(Request::tile("trips", "es", TileCoord::new(1, 0, 0), None));
    let outcome = tokio::time::timeout(TIMEOUT, retried).await.unwrap();
    assert!(outcome.is_ok());
    assert_eq!(transport.in_flight_len(), 0);

    let _ = shutdown_tx.send(());
}
