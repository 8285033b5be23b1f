//! Push-channel connection management.
//!
//! ## Design
//! - `Hub`: one process-wide registry of open connections plus a
//!   `tokio::sync::broadcast` sender that fans each metrics tick out to them
//! - Every WebSocket client subscribes to the sender when it opens and is
//!   removed from the registry when it closes
//! - Frames are pre-serialized JSON text so a tick is encoded once, not once
//!   per client
//!
//! ## Connection lifecycle
//! 1. TCP accept + WebSocket handshake → `Connecting`
//! 2. `Hub::register` subscribes and records the connection → `Open`
//! 3. One metrics sample is sent straight away, ahead of any queued tick
//! 4. Chat queries are answered on the same socket; ticks are forwarded
//! 5. Client close or transport failure → `Hub::deregister` → `Closed`

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

use crate::error::{Result, SmartOpsError};
use crate::metrics::{self, MetricsSample};
use crate::protocol::{ClientEvent, ServerEvent};
use crate::responder::ChatResponder;

/// Default number of ticks a slow connection may fall behind before it starts
/// skipping samples.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Current Unix epoch in milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Connection state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

/// One push-channel client.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: String,
    pub peer: String,
    pub state: ConnectionState,
    pub opened_at_ms: Option<u64>,
}

impl Connection {
    pub fn new(peer: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            peer: peer.into(),
            state: ConnectionState::Connecting,
            opened_at_ms: None,
        }
    }

    /// `Connecting → Open`. Returns false from any other state.
    pub fn open(&mut self) -> bool {
        if self.state != ConnectionState::Connecting {
            return false;
        }
        self.state = ConnectionState::Open;
        self.opened_at_ms = Some(now_ms());
        true
    }

    /// Move to `Closed`. Returns false if the connection was already closed.
    pub fn close(&mut self) -> bool {
        if self.state == ConnectionState::Closed {
            return false;
        }
        self.state = ConnectionState::Closed;
        true
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Milliseconds since the connection opened; 0 if it never did.
    pub fn open_for_ms(&self) -> u64 {
        self.opened_at_ms
            .map(|t| now_ms().saturating_sub(t))
            .unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Hub
// ---------------------------------------------------------------------------

struct HubInner {
    tx: broadcast::Sender<String>,
    connections: Mutex<HashMap<String, Connection>>,
}

/// Shared connection registry and broadcast fan-out. Cheap to clone.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl Hub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(HubInner {
                tx,
                connections: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Open `connection`, record it and subscribe it to broadcasts.
    ///
    /// The returned receiver only sees frames broadcast after this call.
    pub fn register(&self, connection: &mut Connection) -> broadcast::Receiver<String> {
        connection.open();
        let rx = self.inner.tx.subscribe();
        if let Ok(mut guard) = self.inner.connections.lock() {
            guard.insert(connection.id.clone(), connection.clone());
        }
        rx
    }

    /// Drop a connection from the registry. Returns false if it was unknown.
    pub fn deregister(&self, id: &str) -> bool {
        self.inner
            .connections
            .lock()
            .map(|mut guard| guard.remove(id).is_some())
            .unwrap_or(false)
    }

    pub fn connection_count(&self) -> usize {
        self.inner
            .connections
            .lock()
            .map(|guard| guard.len())
            .unwrap_or(0)
    }

    /// Snapshot of the open connections, oldest first.
    pub fn connections(&self) -> Vec<Connection> {
        let mut list: Vec<Connection> = self
            .inner
            .connections
            .lock()
            .map(|guard| guard.values().cloned().collect())
            .unwrap_or_default();
        list.sort_by_key(|c| c.opened_at_ms);
        list
    }

    /// Send a raw frame to every subscriber. Returns how many received it.
    pub fn broadcast(&self, frame: String) -> usize {
        self.inner.tx.send(frame).unwrap_or(0)
    }

    /// Encode `sample` once and broadcast it.
    pub fn publish(&self, sample: MetricsSample) -> Result<usize> {
        let frame = ServerEvent::Metrics(sample).to_frame()?;
        Ok(self.broadcast(frame))
    }

    /// A fresh receiver, independent of the registry. Used by observers and tests.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.inner.tx.subscribe()
    }
}

// ---------------------------------------------------------------------------
// Frame handling
// ---------------------------------------------------------------------------

/// Turn an inbound text frame into the reply frame, if any.
///
/// Malformed frames are logged and produce no reply.
pub fn reply_to_frame(text: &str, responder: &dyn ChatResponder) -> Option<String> {
    match ClientEvent::from_frame(text) {
        Ok(ClientEvent::ChatMessage(query)) => {
            debug!(query = %query.query, "chat message");
            let reply = responder.reply(&query);
            match ServerEvent::AiResponse(reply).to_frame() {
                Ok(frame) => Some(frame),
                Err(e) => {
                    warn!(error = %e, "failed to encode chat reply");
                    None
                }
            }
        }
        Err(e) => {
            warn!(error = %e, "ignoring malformed client frame");
            None
        }
    }
}

fn initial_frame() -> Result<String> {
    let sample = {
        let mut rng = rand::thread_rng();
        metrics::generate(&mut rng)
    };
    ServerEvent::Metrics(sample).to_frame()
}

// ---------------------------------------------------------------------------
// WebSocket handler
// ---------------------------------------------------------------------------

/// Serve one established WebSocket until it closes.
pub async fn handle_ws<S>(
    ws_stream: WebSocketStream<S>,
    hub: Hub,
    responder: Arc<dyn ChatResponder>,
    peer: String,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut connection = Connection::new(peer);
    let mut rx = hub.register(&mut connection);
    info!(
        id = %connection.id,
        peer = %connection.peer,
        open = hub.connection_count(),
        "client connected"
    );

    let (mut sink, mut stream) = ws_stream.split();
    let outcome = run_session(&mut sink, &mut stream, &mut rx, responder.as_ref()).await;

    hub.deregister(&connection.id);
    connection.close();
    match outcome {
        Ok(()) => info!(
            id = %connection.id,
            session_ms = connection.open_for_ms(),
            "client disconnected"
        ),
        Err(e) => warn!(
            id = %connection.id,
            session_ms = connection.open_for_ms(),
            error = %e,
            "client dropped"
        ),
    }
}

async fn run_session<Tx, Rx>(
    sink: &mut Tx,
    stream: &mut Rx,
    ticks: &mut broadcast::Receiver<String>,
    responder: &dyn ChatResponder,
) -> Result<()>
where
    Tx: Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
    Rx: Stream<Item = std::result::Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
        + Unpin,
{
    sink.send(WsMessage::Text(initial_frame()?)).await?;

    loop {
        tokio::select! {
            msg = stream.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        if let Some(frame) = reply_to_frame(&text, responder) {
                            sink.send(WsMessage::Text(frame)).await?;
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => return Ok(()),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(SmartOpsError::WebSocket(e)),
                }
            }
            tick = ticks.recv() => {
                match tick {
                    Ok(frame) => sink.send(WsMessage::Text(frame)).await?,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "connection lagging behind broadcast; ticks dropped");
                    }
                    Err(RecvError::Closed) => return Ok(()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responder::{KeywordResponder, COST_REPLY};

    #[test]
    fn test_connection_starts_connecting() {
        let c = Connection::new("127.0.0.1:1");
        assert_eq!(c.state, ConnectionState::Connecting);
        assert!(c.opened_at_ms.is_none());
        assert!(!c.is_open());
    }

    #[test]
    fn test_connection_open_then_close() {
        let mut c = Connection::new("peer");
        assert!(c.open());
        assert!(c.is_open());
        assert!(c.opened_at_ms.is_some());
        assert!(c.close());
        assert_eq!(c.state, ConnectionState::Closed);
    }

    #[test]
    fn test_open_for_ms() {
        let mut c = Connection::new("peer");
        assert_eq!(c.open_for_ms(), 0);
        c.open();
        c.opened_at_ms = c.opened_at_ms.map(|t| t - 1_500);
        assert!(c.open_for_ms() >= 1_500);
    }

    #[test]
    fn test_connection_cannot_reopen() {
        let mut c = Connection::new("peer");
        c.open();
        c.close();
        assert!(!c.open());
        assert!(!c.close());
        assert_eq!(c.state, ConnectionState::Closed);
    }

    #[test]
    fn test_connection_ids_unique() {
        assert_ne!(Connection::new("a").id, Connection::new("a").id);
    }

    #[test]
    fn test_register_opens_and_records() {
        let hub = Hub::default();
        let mut c = Connection::new("peer");
        let _rx = hub.register(&mut c);
        assert!(c.is_open());
        assert!(hub.connections().iter().any(|x| x.id == c.id));
        assert_eq!(hub.connection_count(), 1);
    }

    #[test]
    fn test_deregister_removes_only_that_connection() {
        let hub = Hub::default();
        let mut a = Connection::new("a");
        let mut b = Connection::new("b");
        let _ra = hub.register(&mut a);
        let _rb = hub.register(&mut b);
        assert!(hub.deregister(&a.id));
        assert!(!hub.deregister(&a.id));
        assert_eq!(hub.connection_count(), 1);
        assert!(hub.connections().iter().any(|x| x.id == b.id));
    }

    #[test]
    fn test_broadcast_without_subscribers_returns_zero() {
        let hub = Hub::default();
        assert_eq!(hub.broadcast("x".to_string()), 0);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_subscriber() {
        let hub = Hub::default();
        let mut a = Connection::new("a");
        let mut b = Connection::new("b");
        let mut ra = hub.register(&mut a);
        let mut rb = hub.register(&mut b);
        assert_eq!(hub.broadcast("frame".to_string()), 2);
        assert_eq!(ra.recv().await.unwrap(), "frame");
        assert_eq!(rb.recv().await.unwrap(), "frame");
    }

    #[tokio::test]
    async fn test_publish_encodes_metrics_event() {
        let hub = Hub::default();
        let mut rx = hub.subscribe();
        let sample = metrics::generate(&mut rand::thread_rng());
        assert_eq!(hub.publish(sample).unwrap(), 1);
        let frame = rx.recv().await.unwrap();
        let v: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(v["event"], "metrics");
    }

    #[test]
    fn test_connections_snapshot_lists_registered() {
        let hub = Hub::default();
        let mut a = Connection::new("a");
        let _ra = hub.register(&mut a);
        let list = hub.connections();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].peer, "a");
        assert!(list[0].is_open());
    }

    #[test]
    fn test_reply_to_chat_frame() {
        let frame = reply_to_frame(
            r#"{"event":"chat_message","data":{"query":"cut my cost"}}"#,
            &KeywordResponder,
        )
        .unwrap();
        let v: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(v["event"], "ai_response");
        assert_eq!(v["data"]["text"], COST_REPLY);
    }

    #[test]
    fn test_reply_to_malformed_frame_is_none() {
        assert!(reply_to_frame("garbage", &KeywordResponder).is_none());
        assert!(reply_to_frame(r#"{"event":"chat_message"}"#, &KeywordResponder).is_none());
        assert!(reply_to_frame(r#"{"event":"chat_message","data":{"query":5}}"#, &KeywordResponder).is_none());
    }
}
