//! The Session's abstract emit/recv/disconnect surface, and one concrete
//! binding over a plain WebSocket carrying newline-delimited JSON frames.
//!
//! The Session engine only ever talks to `dyn SecondaryTransport`; tests
//! substitute `FakeTransport` so the coordination logic can be exercised
//! without a network.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::wire::{decode_inbound, InboundEvent, OutboundFrame};

/// Transport-level errors the Session reacts to explicitly (§7).
#[derive(Debug)]
pub enum TransportError {
    ConnectFailed(anyhow::Error),
    SendFailed(anyhow::Error),
    AlreadyConnected,
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectFailed(e) => write!(f, "connect failed: {e}"),
            Self::SendFailed(e) => write!(f, "send failed: {e}"),
            Self::AlreadyConnected => write!(f, "already connected"),
        }
    }
}

impl std::error::Error for TransportError {}

/// What a Session needs from its socket client.
#[async_trait]
pub trait SecondaryTransport: Send {
    /// Attempts to establish the connection. Idempotent: calling while
    /// already connected returns `TransportError::AlreadyConnected`.
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Sends one event frame. Does not imply liveness tracking — that is
    /// the Session's responsibility, per the tracked/untracked emit split.
    async fn emit(&mut self, event: &'static str, data: Value) -> Result<(), TransportError>;

    /// Receives the next inbound event, or `None` if the connection closed.
    async fn recv(&mut self) -> Option<InboundEvent>;

    /// True if the transport currently believes itself connected.
    fn is_connected(&self) -> bool;

    /// Initiates a disconnect, bounded by the caller's own timeout.
    async fn disconnect(&mut self);
}

/// A WebSocket transport carrying newline-delimited JSON frames.
pub struct WebSocketTransport {
    url: String,
    connected: bool,
    inner: Option<WsHandles>,
}

struct WsHandles {
    write_tx: mpsc::UnboundedSender<WsMessage>,
    read_rx: mpsc::UnboundedReceiver<InboundEvent>,
}

impl WebSocketTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connected: false,
            inner: None,
        }
    }
}

#[async_trait]
impl SecondaryTransport for WebSocketTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.connected {
            return Err(TransportError::AlreadyConnected);
        }
        let (ws_stream, _resp) = tokio_tungstenite::connect_async(&self.url)
            .await
            .context("websocket connect")
            .map_err(TransportError::ConnectFailed)?;
        let (mut write, mut read) = ws_stream.split();

        let (write_tx, mut write_rx) = mpsc::unbounded_channel::<WsMessage>();
        let (read_tx, read_rx) = mpsc::unbounded_channel::<InboundEvent>();

        tokio::spawn(async move {
            while let Some(msg) = write_rx.recv().await {
                if write.send(msg).await.is_err() {
                    break;
                }
            }
        });

        tokio::spawn(async move {
            while let Some(Ok(msg)) = read.next().await {
                if let WsMessage::Text(text) = msg {
                    if let Ok(event) = decode_inbound(&text) {
                        if read_tx.send(event).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        self.inner = Some(WsHandles { write_tx, read_rx });
        self.connected = true;
        Ok(())
    }

    async fn emit(&mut self, event: &'static str, data: Value) -> Result<(), TransportError> {
        let Some(handles) = self.inner.as_ref() else {
            return Err(TransportError::SendFailed(anyhow::anyhow!("not connected")));
        };
        let frame = OutboundFrame { event, data };
        let text = serde_json::to_string(&frame)
            .context("serialize outbound frame")
            .map_err(TransportError::SendFailed)?;
        handles
            .write_tx
            .send(WsMessage::Text(text))
            .map_err(|e| TransportError::SendFailed(anyhow::anyhow!("{e}")))
    }

    async fn recv(&mut self) -> Option<InboundEvent> {
        self.inner.as_mut()?.read_rx.recv().await
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn disconnect(&mut self) {
        self.inner = None;
        self.connected = false;
    }
}
