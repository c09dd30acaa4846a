//! Bidirectional streaming connection to the prediction service.
//!
//! A connection runs on its own task. The adapter handed back to callers
//! only queues frames; reads are routed to a [`StreamHandler`] after the
//! client id filter.

use std::sync::{
    atomic::{AtomicU8, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};

use futures::{SinkExt, StreamExt};
use guessme_types::{
    geometry::Point,
    prediction::Prediction,
    protocol::{ClientId, ClientMessage, ServerMessage},
    Result,
};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::identity::{resolve_client_id, ClientIdStore};

/// Callbacks invoked from the connection task.
pub trait StreamHandler: Send + Sync {
    fn on_connect(&self) {}
    fn on_disconnect(&self) {}
    fn on_predictions(&self, predictions: Vec<Prediction>);
    fn on_final(&self, prediction: Prediction);
}

/// Sending half of an established (or establishing) connection.
///
/// Sends while the connection is not open are dropped.
pub trait StreamLink: Send + Sync {
    fn send_stroke(&self, points: &[Point]);
    fn send_submit(&self);
    fn send_clear(&self);
    fn is_connected(&self) -> bool;
    fn disconnect(&self);
}

/// Factory for links; the session layer holds one of these.
pub trait StreamConnector: Send + Sync {
    fn connect(&self, handler: Arc<dyn StreamHandler>) -> Result<Box<dyn StreamLink>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ConnectionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ConnectionState::Connecting,
            1 => ConnectionState::Open,
            2 => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }
}

#[derive(Clone)]
struct SharedState(Arc<AtomicU8>);

impl SharedState {
    fn new(state: ConnectionState) -> Self {
        Self(Arc::new(AtomicU8::new(state as u8)))
    }

    fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::SeqCst))
    }

    fn set(&self, state: ConnectionState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Predictions,
    Final,
    ForeignClient,
    Malformed,
}

/// Parses inbound frames and dispatches the ones addressed to this client.
#[derive(Clone)]
pub struct FrameRouter {
    client_id: ClientId,
    handler: Arc<dyn StreamHandler>,
}

impl FrameRouter {
    pub fn new(client_id: ClientId, handler: Arc<dyn StreamHandler>) -> Self {
        Self { client_id, handler }
    }

    pub fn route(&self, text: &str) -> RouteOutcome {
        let message = match ServerMessage::decode(text) {
            Ok(message) => message,
            Err(err) => {
                warn!(error = %err, "discarding malformed frame");
                return RouteOutcome::Malformed;
            }
        };
        if message.client_id() != &self.client_id {
            debug!(
                frame_client = %message.client_id(),
                client_id = %self.client_id,
                "ignoring frame for another client"
            );
            return RouteOutcome::ForeignClient;
        }
        match message {
            ServerMessage::Predictions { data, .. } => {
                self.handler.on_predictions(data);
                RouteOutcome::Predictions
            }
            ServerMessage::Final { data, .. } => {
                self.handler.on_final(data);
                RouteOutcome::Final
            }
        }
    }
}

enum Outbound {
    Frame(String),
    Close,
}

/// WebSocket link owned by one game session.
pub struct StreamingAdapter {
    client_id: ClientId,
    state: SharedState,
    outbound: Mutex<Option<mpsc::UnboundedSender<Outbound>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl StreamingAdapter {
    /// Start connecting in the background. Must be called inside a tokio
    /// runtime.
    pub fn open(url: &str, client_id: ClientId, handler: Arc<dyn StreamHandler>) -> Self {
        let state = SharedState::new(ConnectionState::Connecting);
        let (tx, rx) = mpsc::unbounded_channel();
        let router = FrameRouter::new(client_id.clone(), handler);
        let task = tokio::spawn(run_connection(
            url.to_string(),
            router,
            state.clone(),
            rx,
        ));
        Self {
            client_id,
            state,
            outbound: Mutex::new(Some(tx)),
            task: Mutex::new(Some(task)),
        }
    }

    /// Resolve the persisted identity, then [`StreamingAdapter::open`].
    pub fn connect_with_store(
        url: &str,
        store: &dyn ClientIdStore,
        handler: Arc<dyn StreamHandler>,
    ) -> Result<Self> {
        let client_id = resolve_client_id(store)?;
        Ok(Self::open(url, client_id, handler))
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    fn send(&self, message: ClientMessage) {
        if self.state.get() != ConnectionState::Open {
            debug!(state = ?self.state.get(), "connection not open; dropping frame");
            return;
        }
        let text = match serde_json::to_string(&message) {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "failed to encode frame");
                return;
            }
        };
        if let Some(tx) = lock(&self.outbound).as_ref() {
            let _ = tx.send(Outbound::Frame(text));
        }
    }
}

impl StreamLink for StreamingAdapter {
    fn send_stroke(&self, points: &[Point]) {
        self.send(ClientMessage::stroke(self.client_id.clone(), points.to_vec()));
    }

    fn send_submit(&self) {
        self.send(ClientMessage::Submit {
            client_id: self.client_id.clone(),
        });
    }

    fn send_clear(&self) {
        self.send(ClientMessage::Clear {
            client_id: self.client_id.clone(),
        });
    }

    fn is_connected(&self) -> bool {
        self.state.get() == ConnectionState::Open
    }

    /// Idempotent. A connection still being established is abandoned.
    fn disconnect(&self) {
        let Some(sender) = lock(&self.outbound).take() else {
            return;
        };
        match self.state.get() {
            ConnectionState::Connecting => {
                if let Some(task) = lock(&self.task).take() {
                    task.abort();
                }
                self.state.set(ConnectionState::Closed);
            }
            ConnectionState::Open => {
                self.state.set(ConnectionState::Closing);
                let _ = sender.send(Outbound::Close);
            }
            ConnectionState::Closing | ConnectionState::Closed => {}
        }
    }
}

impl Drop for StreamingAdapter {
    fn drop(&mut self) {
        self.disconnect();
    }
}

async fn run_connection(
    url: String,
    router: FrameRouter,
    state: SharedState,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) {
    let socket = match connect_async(url.as_str()).await {
        Ok((socket, _)) => socket,
        Err(err) => {
            warn!(%url, error = %err, "streaming connection failed");
            state.set(ConnectionState::Closed);
            router.handler.on_disconnect();
            return;
        }
    };
    state.set(ConnectionState::Open);
    info!(%url, client_id = %router.client_id, "streaming connection open");
    router.handler.on_connect();

    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(Outbound::Frame(text)) => {
                    if let Err(err) = sink.send(Message::Text(text)).await {
                        warn!(error = %err, "failed to send frame");
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    router.route(&text);
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!(error = %err, "streaming connection error");
                    break;
                }
            },
        }
    }

    state.set(ConnectionState::Closed);
    info!(%url, "streaming connection closed");
    router.handler.on_disconnect();
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Connector producing [`StreamingAdapter`]s against one endpoint.
pub struct WsConnector {
    url: String,
    store: Arc<dyn ClientIdStore>,
}

impl WsConnector {
    pub fn new(url: impl Into<String>, store: Arc<dyn ClientIdStore>) -> Self {
        Self {
            url: url.into(),
            store,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl StreamConnector for WsConnector {
    fn connect(&self, handler: Arc<dyn StreamHandler>) -> Result<Box<dyn StreamLink>> {
        let adapter = StreamingAdapter::connect_with_store(&self.url, self.store.as_ref(), handler)?;
        Ok(Box::new(adapter))
    }
}
