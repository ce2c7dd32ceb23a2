//! Mock game authority for integration testing.
//!
//! An in-process axum server speaking the same wire protocol as the real
//! backend: frame envelopes over a WebSocket at `/ws`, plus the two REST
//! collaborator endpoints under `/api`. Tests push broadcast frames,
//! inspect the commands the client sent, and can drop every connection to
//! exercise reconnect handling. All state is in-memory and deterministic.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use liftoff::stream::Frame;
use liftoff::types::{RoundPhase, RoundUpdate};

const BROADCAST_CAPACITY: usize = 256;

struct AuthorityState {
    outbound: broadcast::Sender<Frame>,
    control: broadcast::Sender<()>,
    received: Mutex<Vec<Frame>>,
    history: Vec<Decimal>,
}

/// Handle to the running mock authority.
pub struct MockAuthority {
    addr: SocketAddr,
    state: Arc<AuthorityState>,
    server: JoinHandle<()>,
}

impl MockAuthority {
    /// Bind on a random local port and start serving.
    pub async fn start() -> Self {
        let (outbound, _) = broadcast::channel(BROADCAST_CAPACITY);
        let (control, _) = broadcast::channel(8);
        let state = Arc::new(AuthorityState {
            outbound,
            control,
            received: Mutex::new(Vec::new()),
            history: vec![dec!(2.31), dec!(1.05), dec!(4.87)],
        });

        let router = Router::new()
            .route("/ws", get(ws_handler))
            .route("/api/user/me", get(profile_handler))
            .route("/api/game/history", get(history_handler))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self { addr, state, server }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn api_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    /// Crash points served by `/api/game/history`.
    pub fn history(&self) -> Vec<Decimal> {
        self.state.history.clone()
    }

    /// Broadcast a frame to every connected client.
    pub fn push(&self, destination: &str, body: impl Into<String>) {
        let _ = self.state.outbound.send(Frame {
            destination: destination.to_string(),
            body: body.into(),
        });
    }

    /// Broadcast a round update.
    pub fn push_round(&self, phase: RoundPhase, multiplier: Decimal, countdown: u32) {
        let update = RoundUpdate { multiplier, status: phase, countdown };
        self.push(
            liftoff::stream::TOPIC_GAME_UPDATES,
            serde_json::to_string(&update).unwrap(),
        );
    }

    /// Commands received from clients so far.
    pub async fn received(&self) -> Vec<Frame> {
        self.state.received.lock().await.clone()
    }

    /// Wait until at least `count` commands arrived on `destination` and
    /// return them. Panics after a couple of seconds.
    pub async fn await_commands(&self, destination: &str, count: usize) -> Vec<Frame> {
        for _ in 0..100 {
            let matching: Vec<Frame> = self
                .received()
                .await
                .into_iter()
                .filter(|f| f.destination == destination)
                .collect();
            if matching.len() >= count {
                return matching;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("timed out waiting for {count} command(s) on {destination}");
    }

    /// Close every connected WebSocket (simulated outage).
    pub fn drop_connections(&self) {
        let _ = self.state.control.send(());
    }
}

impl Drop for MockAuthority {
    fn drop(&mut self) {
        self.server.abort();
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn ws_handler(
    State(state): State<Arc<AuthorityState>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    // The real authority rejects unauthenticated channel handshakes.
    if !headers.contains_key(header::AUTHORIZATION) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state))
        .into_response()
}

async fn handle_socket(socket: WebSocket, state: Arc<AuthorityState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut outbound = state.outbound.subscribe();
    let mut control = state.control.subscribe();

    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Ok(frame) => {
                    let text = serde_json::to_string(&frame).unwrap();
                    if sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = control.recv() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    if let Ok(frame) = serde_json::from_str::<Frame>(&text) {
                        state.received.lock().await.push(frame);
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            },
        }
    }
}

async fn profile_handler(headers: HeaderMap) -> Response {
    if !headers.contains_key(header::AUTHORIZATION) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(serde_json::json!({
        "id": 1,
        "firstName": "Tester",
        "balance": 100.00,
    }))
    .into_response()
}

async fn history_handler(State(state): State<Arc<AuthorityState>>) -> Json<Vec<Decimal>> {
    Json(state.history.clone())
}
