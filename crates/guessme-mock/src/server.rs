use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::{get, post},
    Json, Router,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use guessme_types::{
    config::MockConfig,
    prediction::{DigitPrediction, Prediction},
    protocol::{ClientId, ClientMessage, PredictRequest, ServerMessage},
    Result,
};
use serde_json::{json, Value};
use tokio::{
    net::TcpListener,
    task::JoinHandle,
    time::{interval_at, Instant, Interval, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    mock_error,
    model::{DigitModel, LabelModel, RandomDigitModel, RandomLabelModel},
};

/// Shared across every connection of one server.
#[derive(Clone)]
pub struct MockState {
    inner: Arc<Inner>,
}

struct Inner {
    labels: Box<dyn LabelModel>,
    digits: Box<dyn DigitModel>,
    strokes: Mutex<HashMap<ClientId, usize>>,
    emit_interval: Duration,
    max_predictions: usize,
}

impl MockState {
    pub fn new(config: &MockConfig) -> Self {
        Self::with_models(config, Box::new(RandomLabelModel), Box::new(RandomDigitModel))
    }

    pub fn with_models(
        config: &MockConfig,
        labels: Box<dyn LabelModel>,
        digits: Box<dyn DigitModel>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                labels,
                digits,
                strokes: Mutex::new(HashMap::new()),
                emit_interval: Duration::from_millis(config.emit_interval_ms.max(1)),
                max_predictions: config.max_predictions,
            }),
        }
    }

    pub fn stroke_count(&self, client_id: &ClientId) -> usize {
        self.counters().get(client_id).copied().unwrap_or(0)
    }

    fn record_stroke(&self, client_id: &ClientId) -> usize {
        let mut counters = self.counters();
        let count = counters.entry(client_id.clone()).or_insert(0);
        *count += 1;
        *count
    }

    fn reset(&self, client_id: &ClientId) {
        self.counters().insert(client_id.clone(), 0);
    }

    fn forget(&self, client_id: &ClientId) {
        self.counters().remove(client_id);
    }

    fn ranked(&self, strokes: usize) -> Vec<Prediction> {
        self.inner.labels.rank(strokes, self.inner.max_predictions)
    }

    /// Top-ranked label, or the placeholder when nothing was drawn.
    fn final_prediction(&self, client_id: &ClientId) -> Prediction {
        let strokes = self.stroke_count(client_id);
        if strokes == 0 {
            return Prediction::placeholder();
        }
        self.ranked(strokes)
            .into_iter()
            .next()
            .unwrap_or_else(Prediction::placeholder)
    }

    fn counters(&self) -> MutexGuard<'_, HashMap<ClientId, usize>> {
        self.inner
            .strokes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

pub fn router(state: MockState) -> Router {
    Router::new()
        .route("/", get(upgrade))
        .route("/ws", get(upgrade))
        .route("/predict", post(predict))
        .route("/health", get(health))
        .with_state(state)
}

pub async fn serve(listener: TcpListener, state: MockState) -> Result<()> {
    let addr = listener
        .local_addr()
        .map_err(|err| mock_error(err.to_string()))?;
    info!(%addr, "mock predictor listening");
    axum::serve(listener, router(state))
        .await
        .map_err(|err| mock_error(err.to_string()))
}

/// Bind an ephemeral loopback port and serve in the background.
pub async fn spawn_local(state: MockState) -> Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|err| mock_error(err.to_string()))?;
    let addr = listener
        .local_addr()
        .map_err(|err| mock_error(err.to_string()))?;
    let handle = tokio::spawn(async move {
        if let Err(err) = serve(listener, state).await {
            warn!(error = %err, "mock predictor stopped");
        }
    });
    Ok((addr, handle))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn predict(
    State(state): State<MockState>,
    Json(request): Json<PredictRequest>,
) -> Json<DigitPrediction> {
    let guess = state.inner.digits.classify(&request.points);
    debug!(points = request.points.len(), digit = guess.digit, "digit prediction");
    Json(guess)
}

async fn upgrade(ws: WebSocketUpgrade, State(state): State<MockState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

enum Wake {
    Incoming(Option<std::result::Result<Message, axum::Error>>),
    Tick,
}

async fn handle_socket(socket: WebSocket, state: MockState) {
    let (mut sender, mut receiver) = socket.split();
    let mut ticker: Option<Interval> = None;
    let mut current: Option<ClientId> = None;
    debug!("client connected");

    loop {
        let wake = tokio::select! {
            incoming = receiver.next() => Wake::Incoming(incoming),
            _ = next_tick(&mut ticker) => Wake::Tick,
        };

        match wake {
            Wake::Tick => {
                let Some(client_id) = current.clone() else {
                    continue;
                };
                let strokes = state.stroke_count(&client_id);
                if strokes == 0 {
                    continue;
                }
                let frame = ServerMessage::Predictions {
                    data: state.ranked(strokes),
                    client_id,
                };
                if !send_frame(&mut sender, &frame).await {
                    break;
                }
            }
            Wake::Incoming(Some(Ok(Message::Text(text)))) => {
                let message = match ClientMessage::decode(&text) {
                    Ok(message) => message,
                    Err(err) => {
                        warn!(error = %err, "failed to parse client frame");
                        continue;
                    }
                };
                current = Some(message.client_id().clone());
                let reply = match message {
                    ClientMessage::Stroke { client_id, .. } => {
                        let strokes = state.record_stroke(&client_id);
                        debug!(%client_id, strokes, "stroke");
                        if ticker.is_none() {
                            ticker = Some(emission_ticker(state.inner.emit_interval));
                        }
                        None
                    }
                    ClientMessage::Submit { client_id } => {
                        ticker = None;
                        let data = state.final_prediction(&client_id);
                        debug!(%client_id, label = %data.label, "submit");
                        Some(ServerMessage::Final { client_id, data })
                    }
                    ClientMessage::Clear { client_id } => {
                        ticker = None;
                        state.reset(&client_id);
                        debug!(%client_id, "clear");
                        Some(ServerMessage::Predictions {
                            client_id,
                            data: Vec::new(),
                        })
                    }
                };
                if let Some(frame) = reply {
                    if !send_frame(&mut sender, &frame).await {
                        break;
                    }
                }
            }
            Wake::Incoming(Some(Ok(Message::Close(_)))) | Wake::Incoming(None) => break,
            Wake::Incoming(Some(Ok(_))) => {}
            Wake::Incoming(Some(Err(err))) => {
                debug!(error = %err, "socket error");
                break;
            }
        }
    }

    if let Some(client_id) = current {
        state.forget(&client_id);
    }
    debug!("client disconnected");
}

fn emission_ticker(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn send_frame(sender: &mut SplitSink<WebSocket, Message>, frame: &ServerMessage) -> bool {
    let text = match serde_json::to_string(frame) {
        Ok(text) => text,
        Err(err) => {
            warn!(error = %err, "failed to encode server frame");
            return true;
        }
    };
    sender.send(Message::Text(text.into())).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Silent;

    impl LabelModel for Silent {
        fn rank(&self, _strokes: usize, _limit: usize) -> Vec<Prediction> {
            Vec::new()
        }
    }

    fn id(raw: &str) -> ClientId {
        ClientId::from_stored(raw).unwrap()
    }

    #[test]
    fn counters_are_per_client() {
        let state = MockState::new(&MockConfig::default());
        let (a, b) = (id("a"), id("b"));
        state.record_stroke(&a);
        state.record_stroke(&a);
        state.record_stroke(&b);
        assert_eq!(state.stroke_count(&a), 2);
        assert_eq!(state.stroke_count(&b), 1);

        state.reset(&a);
        assert_eq!(state.stroke_count(&a), 0);
        state.forget(&b);
        assert_eq!(state.stroke_count(&b), 0);
    }

    #[test]
    fn final_falls_back_to_placeholder() {
        let state = MockState::new(&MockConfig::default());
        assert_eq!(state.final_prediction(&id("fresh")), Prediction::placeholder());

        let silent = MockState::with_models(
            &MockConfig::default(),
            Box::new(Silent),
            Box::new(RandomDigitModel),
        );
        silent.record_stroke(&id("x"));
        assert_eq!(silent.final_prediction(&id("x")), Prediction::placeholder());
    }

    #[test]
    fn final_is_the_leader_once_drawn() {
        let state = MockState::new(&MockConfig::default());
        let client = id("drawn");
        for _ in 0..4 {
            state.record_stroke(&client);
        }
        let top = state.final_prediction(&client);
        assert_ne!(top.label, "-");
    }
}
