//! WebSocket transport for the round-broadcast channel.
//!
//! A reader task decodes text frames into [`Frame`] envelopes and forwards
//! them over an mpsc queue, preserving arrival order; the write half stays
//! with the channel for command sends. The bearer credential is attached
//! to the handshake request. When the socket closes or errors, the
//! connected flag flips and `next_frame` drains to `None` — reconnecting
//! is the caller's policy, not the transport's.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, warn};

use super::{Channel, Frame};
use crate::types::LiftoffError;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

const FRAME_QUEUE_CAPACITY: usize = 1024;

/// tokio-tungstenite implementation of [`Channel`].
pub struct WsChannel {
    url: String,
    token: SecretString,
    writer: Option<WsSink>,
    frames: Option<mpsc::Receiver<Frame>>,
    connected: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl WsChannel {
    pub fn new(url: impl Into<String>, token: SecretString) -> Self {
        Self {
            url: url.into(),
            token,
            writer: None,
            frames: None,
            connected: Arc::new(AtomicBool::new(false)),
            reader: None,
        }
    }

    /// Tear down any previous connection state without touching the socket
    /// (the reader task owns the read half and is simply aborted).
    fn reset_connection(&mut self) {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.writer = None;
        self.frames = None;
    }

    fn spawn_reader(
        mut read: WsSource,
        tx: mpsc::Sender<Frame>,
        connected: Arc<AtomicBool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(message) = read.next().await {
                match message {
                    Ok(Message::Text(text)) => match serde_json::from_str::<Frame>(&text) {
                        Ok(frame) => {
                            if tx.send(frame).await.is_err() {
                                break; // Receiver dropped
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, len = text.len(), "Failed to decode frame envelope");
                        }
                    },
                    Ok(Message::Close(_)) => {
                        debug!("WebSocket closed by peer");
                        break;
                    }
                    Ok(_) => {} // Ignore pings, pongs, binary
                    Err(e) => {
                        error!(error = %e, "WebSocket read error");
                        break;
                    }
                }
            }
            connected.store(false, Ordering::SeqCst);
        })
    }
}

#[async_trait]
impl Channel for WsChannel {
    async fn connect(&mut self) -> Result<(), LiftoffError> {
        self.reset_connection();

        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| LiftoffError::Connection(e.to_string()))?;
        let bearer = format!("Bearer {}", self.token.expose_secret());
        let header = HeaderValue::from_str(&bearer)
            .map_err(|e| LiftoffError::Connection(e.to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, header);

        let (socket, _) = connect_async(request)
            .await
            .map_err(|e| LiftoffError::Connection(e.to_string()))?;
        let (writer, reader) = socket.split();
        let (tx, rx) = mpsc::channel(FRAME_QUEUE_CAPACITY);

        self.connected.store(true, Ordering::SeqCst);
        self.reader = Some(Self::spawn_reader(reader, tx, self.connected.clone()));
        self.writer = Some(writer);
        self.frames = Some(rx);
        debug!(url = %self.url, "Round stream connected");
        Ok(())
    }

    async fn next_frame(&mut self) -> Option<Frame> {
        let frames = self.frames.as_mut()?;
        match frames.recv().await {
            Some(frame) => Some(frame),
            None => {
                self.connected.store(false, Ordering::SeqCst);
                None
            }
        }
    }

    async fn send(&mut self, destination: &str, body: String) -> Result<(), LiftoffError> {
        if !self.is_connected() {
            return Err(LiftoffError::NotConnected);
        }
        let envelope = serde_json::to_string(&Frame {
            destination: destination.to_string(),
            body,
        })
        .map_err(|e| LiftoffError::Connection(format!("encode envelope: {e}")))?;

        let writer = self.writer.as_mut().ok_or(LiftoffError::NotConnected)?;
        let result = writer.send(Message::Text(envelope)).await;
        match result {
            Ok(()) => Ok(()),
            Err(e) => {
                self.connected.store(false, Ordering::SeqCst);
                Err(LiftoffError::Connection(e.to_string()))
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.writer.is_some()
    }

    async fn close(&mut self) {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.send(Message::Close(None)).await;
            let _ = writer.close().await;
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.frames = None;
    }
}

impl Drop for WsChannel {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
