//! The physical duplex channel to the aggregation service.
//!
//! [`Connection`] is the send half the [`Transport`] talks to. Inbound
//! traffic and open/close transitions flow the other way, from whoever drives
//! the socket into `Transport::handle_*`. [`run_websocket`] is that driver
//! for a WebSocket, reconnecting after a fixed delay whenever the socket
//! drops.

use std::sync::{Arc, Mutex};

use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::config::TransportConfig;
use crate::error::TransportError;
use crate::transport::Transport;

/// Send half of a message channel.
pub trait Connection: Send + Sync {
    /// Whether a send would currently reach the socket.
    fn is_open(&self) -> bool;

    /// Send one text frame. Fails with [`TransportError::NotConnected`]
    /// while closed; never retries.
    fn send(&self, text: String) -> Result<(), TransportError>;
}

/// WebSocket send half, attached by [`run_websocket`] while a socket is up.
#[derive(Default)]
pub struct WebSocketConnection {
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
}

impl WebSocketConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn attach(&self, tx: mpsc::UnboundedSender<Message>) {
        *self.lock() = Some(tx);
    }

    fn detach(&self) {
        self.lock().take();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<mpsc::UnboundedSender<Message>>> {
        self.outbound
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Connection for WebSocketConnection {
    fn is_open(&self) -> bool {
        self.lock().as_ref().is_some_and(|tx| !tx.is_closed())
    }

    fn send(&self, text: String) -> Result<(), TransportError> {
        match self.lock().as_ref() {
            Some(tx) => tx
                .send(Message::Text(text))
                .map_err(|_| TransportError::NotConnected),
            None => Err(TransportError::NotConnected),
        }
    }
}

/// Keep a WebSocket to `config.ws_url` alive and wire it to `transport`.
///
/// Runs until `shutdown` fires. Every time the socket drops, in-flight
/// requests are rejected and a new attempt is made after
/// `config.retry_interval`; the interval is constant.
pub async fn run_websocket(
    config: TransportConfig,
    connection: Arc<WebSocketConnection>,
    transport: Transport,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        match connect_async(config.ws_url.as_str()).await {
            Ok((stream, _response)) => {
                info!(url = %config.ws_url, "Connected to aggregation service");
                let (mut sink, mut source) = stream.split();
                let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

                connection.attach(tx);
                transport.handle_open();

                let stop = loop {
                    tokio::select! {
                        _ = shutdown.recv() => break true,
                        Some(outbound) = rx.recv() => {
                            if let Err(e) = sink.send(outbound).await {
                                warn!(error = %e, "WebSocket send failed");
                                break false;
                            }
                        }
                        frame = source.next() => match frame {
                            Some(Ok(Message::Text(text))) => transport.handle_message(&text),
                            Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                                Ok(text) => transport.handle_message(text),
                                Err(_) => {
                                    warn!(len = bytes.len(), "Ignoring non UTF-8 binary frame")
                                }
                            },
                            Some(Ok(Message::Close(frame))) => {
                                debug!(?frame, "Server closed the connection");
                                break false;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                warn!(error = %e, "WebSocket receive failed");
                                break false;
                            }
                            None => break false,
                        },
                    }
                };

                connection.detach();
                transport.handle_close();

                if stop {
                    let _ = sink.close().await;
                    info!("WebSocket driver stopped");
                    return;
                }
            }
            Err(e) => {
                warn!(url = %config.ws_url, error = %e, "Failed to connect to aggregation service");
            }
        }

        info!(
            retry_ms = config.retry_interval.as_millis() as u64,
            "Reconnecting after fixed delay"
        );
        tokio::select! {
            _ = tokio::time::sleep(config.retry_interval) => {}
            _ = shutdown.recv() => {
                info!("WebSocket driver stopped");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_connection_rejects_sends() {
        let conn = WebSocketConnection::new();
        assert!(!conn.is_open());
        assert_eq!(
            conn.send("{}".to_string()),
            Err(TransportError::NotConnected)
        );
    }

    #[test]
    fn test_attached_connection_forwards_text_frames() {
        let conn = WebSocketConnection::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        conn.attach(tx);
        assert!(conn.is_open());

        conn.send("hello".to_string()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), Message::Text("hello".to_string()));

        conn.detach();
        assert!(!conn.is_open());
    }

    #[test]
    fn test_dropped_receiver_reads_as_closed() {
        let conn = WebSocketConnection::new();
        let (tx, rx) = mpsc::unbounded_channel();
        conn.attach(tx);
        drop(rx);
        assert!(!conn.is_open());
        assert_eq!(conn.send("x".to_string()), Err(TransportError::NotConnected));
    }
}
