//! Streaming game: live predictions while drawing, final answer on submit.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::stream::BoxStream;
use guessme_network::{EventHub, StreamConnector, StreamHandler, StreamLink};
use guessme_types::{
    events::{SessionEvent, SessionEventKind},
    game::{Action, GameMode, StreamPhase},
    geometry::Stroke,
    prediction::Prediction,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{permitted, SessionController, SessionSnapshot};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamSnapshot {
    pub phase: StreamPhase,
    pub predictions: Vec<Prediction>,
    pub final_result: Option<Prediction>,
    pub connected: bool,
}

#[derive(Default)]
struct StreamState {
    phase: StreamPhase,
    predictions: Vec<Prediction>,
    final_result: Option<Prediction>,
    connected: bool,
    /// Identifies the live connection; callbacks carrying an older value
    /// belong to a socket that has been replaced.
    generation: u64,
}

struct Shared {
    state: Mutex<StreamState>,
    hub: EventHub,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, StreamState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, kind: SessionEventKind) {
        self.hub
            .publish(SessionEvent::new(GameMode::Streaming, kind));
    }

    fn enter(&self, state: &mut StreamState, to: StreamPhase) {
        let from = state.phase;
        if from == to {
            return;
        }
        state.phase = to;
        debug!(?from, ?to, "streaming phase change");
        self.emit(SessionEventKind::PhaseChanged {
            from: from.into(),
            to: to.into(),
        });
    }
}

/// Receives adapter callbacks for one connection generation.
struct GameHandler {
    shared: Arc<Shared>,
    generation: u64,
}

impl GameHandler {
    fn current(&self) -> Option<MutexGuard<'_, StreamState>> {
        let state = self.shared.lock();
        if state.generation == self.generation {
            Some(state)
        } else {
            debug!(generation = self.generation, "callback from a replaced connection");
            None
        }
    }
}

impl StreamHandler for GameHandler {
    fn on_connect(&self) {
        let Some(mut state) = self.current() else {
            return;
        };
        state.connected = true;
        self.shared.emit(SessionEventKind::Connection { connected: true });
    }

    fn on_disconnect(&self) {
        let Some(mut state) = self.current() else {
            return;
        };
        state.connected = false;
        if state.phase == StreamPhase::Playing {
            warn!("streaming connection lost during a round; further input is dropped");
        }
        self.shared.emit(SessionEventKind::Connection { connected: false });
    }

    fn on_predictions(&self, predictions: Vec<Prediction>) {
        let Some(mut state) = self.current() else {
            return;
        };
        let count = predictions.len();
        state.predictions = predictions;
        self.shared.emit(SessionEventKind::PredictionsUpdated { count });
    }

    fn on_final(&self, prediction: Prediction) {
        let Some(mut state) = self.current() else {
            return;
        };
        info!(label = %prediction.label, confidence = prediction.confidence, "final result");
        state.final_result = Some(prediction.clone());
        self.shared.emit(SessionEventKind::FinalResult(prediction));
        self.shared.enter(&mut state, StreamPhase::GameOver);
    }
}

/// Owns at most one live link; dropping the game closes it.
pub struct StreamingGame {
    connector: Arc<dyn StreamConnector>,
    shared: Arc<Shared>,
    link: Mutex<Option<Box<dyn StreamLink>>>,
}

impl StreamingGame {
    pub fn new(connector: Arc<dyn StreamConnector>) -> Self {
        Self::with_hub(connector, EventHub::default())
    }

    pub fn with_hub(connector: Arc<dyn StreamConnector>, hub: EventHub) -> Self {
        Self {
            connector,
            shared: Arc::new(Shared {
                state: Mutex::new(StreamState::default()),
                hub,
            }),
            link: Mutex::new(None),
        }
    }

    pub fn phase(&self) -> StreamPhase {
        self.shared.lock().phase
    }

    pub fn predictions(&self) -> Vec<Prediction> {
        self.shared.lock().predictions.clone()
    }

    pub fn final_result(&self) -> Option<Prediction> {
        self.shared.lock().final_result.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.link_guard()
            .as_ref()
            .map(|link| link.is_connected())
            .unwrap_or(false)
    }

    pub fn snapshot(&self) -> StreamSnapshot {
        let state = self.shared.lock();
        StreamSnapshot {
            phase: state.phase,
            predictions: state.predictions.clone(),
            final_result: state.final_result.clone(),
            connected: state.connected,
        }
    }

    /// Fresh round on a fresh connection. Any previous link is closed first.
    pub fn start_game(&self) {
        self.release_link();
        let generation = {
            let mut state = self.shared.lock();
            if !permitted(GameMode::Streaming, state.phase, Action::Start) {
                return;
            }
            state.generation += 1;
            state.predictions.clear();
            state.final_result = None;
            state.connected = false;
            self.shared.enter(&mut state, StreamPhase::Playing);
            state.generation
        };

        let handler = Arc::new(GameHandler {
            shared: Arc::clone(&self.shared),
            generation,
        });
        match self.connector.connect(handler) {
            Ok(link) => {
                *self.link_guard() = Some(link);
            }
            Err(err) => {
                warn!(error = %err, "could not open streaming connection");
                self.shared
                    .emit(SessionEventKind::Connection { connected: false });
            }
        }
    }

    pub fn handle_stroke(&self, stroke: &Stroke) {
        if !self.allowed(Action::Stroke) {
            return;
        }
        if let Some(link) = self.link_guard().as_ref() {
            link.send_stroke(stroke.points());
        }
        self.shared.emit(SessionEventKind::StrokeAccepted {
            points: stroke.len(),
        });
    }

    pub fn handle_submit(&self) {
        if !self.allowed(Action::Submit) {
            return;
        }
        if let Some(link) = self.link_guard().as_ref() {
            link.send_submit();
        }
    }

    /// Running out of time submits whatever is on the board.
    pub fn handle_timeout(&self) {
        debug!("round timer expired");
        self.handle_submit();
    }

    /// Local predictions are emptied without waiting for the server echo.
    pub fn handle_clear(&self) {
        if !self.allowed(Action::Clear) {
            return;
        }
        if let Some(link) = self.link_guard().as_ref() {
            link.send_clear();
        }
        self.shared.lock().predictions.clear();
        self.shared.emit(SessionEventKind::StrokesCleared);
        self.shared
            .emit(SessionEventKind::PredictionsUpdated { count: 0 });
    }

    pub fn new_game(&self) {
        self.release_link();
        {
            let mut state = self.shared.lock();
            state.predictions.clear();
            state.final_result = None;
        }
        self.start_game();
    }

    /// Close the link, if any. Idempotent.
    pub fn shutdown(&self) {
        self.release_link();
    }

    pub fn subscribe(&self) -> BoxStream<'static, SessionEvent> {
        self.shared.hub.subscribe()
    }

    fn allowed(&self, action: Action) -> bool {
        let phase = self.shared.lock().phase;
        permitted(GameMode::Streaming, phase, action)
    }

    fn release_link(&self) {
        let link = self.link_guard().take();
        if let Some(link) = link {
            link.disconnect();
        }
    }

    fn link_guard(&self) -> MutexGuard<'_, Option<Box<dyn StreamLink>>> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for StreamingGame {
    fn drop(&mut self) {
        self.release_link();
    }
}

#[async_trait]
impl SessionController for StreamingGame {
    fn mode(&self) -> GameMode {
        GameMode::Streaming
    }

    async fn start(&self) {
        self.start_game();
    }

    async fn stroke(&self, stroke: Stroke) {
        self.handle_stroke(&stroke);
    }

    async fn submit(&self) {
        self.handle_submit();
    }

    async fn clear(&self) {
        self.handle_clear();
    }

    async fn new_game(&self) {
        StreamingGame::new_game(self);
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::Streaming(StreamingGame::snapshot(self))
    }

    fn subscribe(&self) -> BoxStream<'static, SessionEvent> {
        StreamingGame::subscribe(self)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use guessme_types::{geometry::Point, Result};

    use super::*;
    use crate::simple::tests::stroke;

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Sent {
        Stroke(Vec<Point>),
        Submit,
        Clear,
    }

    /// Link that records frames and stays open until disconnected.
    pub(crate) struct FakeLink {
        sent: Arc<Mutex<Vec<Sent>>>,
        open: AtomicBool,
        disconnects: Arc<Mutex<usize>>,
    }

    impl StreamLink for FakeLink {
        fn send_stroke(&self, points: &[Point]) {
            if self.is_connected() {
                self.sent.lock().unwrap().push(Sent::Stroke(points.to_vec()));
            }
        }

        fn send_submit(&self) {
            if self.is_connected() {
                self.sent.lock().unwrap().push(Sent::Submit);
            }
        }

        fn send_clear(&self) {
            if self.is_connected() {
                self.sent.lock().unwrap().push(Sent::Clear);
            }
        }

        fn is_connected(&self) -> bool {
            self.open.load(Ordering::SeqCst)
        }

        fn disconnect(&self) {
            if self.open.swap(false, Ordering::SeqCst) {
                *self.disconnects.lock().unwrap() += 1;
            }
        }
    }

    /// Hands out [`FakeLink`]s and keeps every handler so tests can play
    /// the server side.
    #[derive(Default)]
    pub(crate) struct FakeConnector {
        pub handlers: Mutex<Vec<Arc<dyn StreamHandler>>>,
        pub sent: Arc<Mutex<Vec<Sent>>>,
        pub disconnects: Arc<Mutex<usize>>,
        pub refuse: bool,
    }

    impl FakeConnector {
        pub fn handler(&self, index: usize) -> Arc<dyn StreamHandler> {
            Arc::clone(&self.handlers.lock().unwrap()[index])
        }

        pub fn latest(&self) -> Arc<dyn StreamHandler> {
            let handlers = self.handlers.lock().unwrap();
            Arc::clone(handlers.last().unwrap())
        }

        pub fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl StreamConnector for FakeConnector {
        fn connect(&self, handler: Arc<dyn StreamHandler>) -> Result<Box<dyn StreamLink>> {
            if self.refuse {
                return Err(guessme_network::network_error("refused"));
            }
            handler.on_connect();
            self.handlers.lock().unwrap().push(handler);
            Ok(Box::new(FakeLink {
                sent: Arc::clone(&self.sent),
                open: AtomicBool::new(true),
                disconnects: Arc::clone(&self.disconnects),
            }))
        }
    }

    fn game() -> (StreamingGame, Arc<FakeConnector>) {
        let connector = Arc::new(FakeConnector::default());
        (StreamingGame::new(connector.clone()), connector)
    }

    #[test]
    fn input_outside_playing_is_dropped() {
        let (game, connector) = game();
        game.handle_stroke(&stroke(&[(1.0, 1.0)]));
        game.handle_submit();
        game.handle_clear();
        assert_eq!(game.phase(), StreamPhase::Idle);
        assert!(connector.sent().is_empty());
        assert!(connector.handlers.lock().unwrap().is_empty());
    }

    #[test]
    fn playing_forwards_input() {
        let (game, connector) = game();
        game.start_game();
        assert_eq!(game.phase(), StreamPhase::Playing);
        assert!(game.is_connected());

        game.handle_stroke(&stroke(&[(1.0, 2.0), (3.0, 4.0)]));
        game.handle_timeout();
        assert_eq!(
            connector.sent(),
            vec![
                Sent::Stroke(vec![Point::new(1.0, 2.0), Point::new(3.0, 4.0)]),
                Sent::Submit
            ]
        );
    }

    #[test]
    fn last_predictions_win_and_final_ends_round() {
        let (game, connector) = game();
        game.start_game();
        let server = connector.latest();

        server.on_predictions(vec![Prediction::new("Cat", 40.0)]);
        server.on_predictions(vec![Prediction::new("Dog", 60.0), Prediction::new("Cat", 20.0)]);
        assert_eq!(game.predictions()[0].label, "Dog");
        assert_eq!(game.predictions().len(), 2);

        server.on_final(Prediction::new("Dog", 61.0));
        assert_eq!(game.phase(), StreamPhase::GameOver);
        assert_eq!(game.final_result(), Some(Prediction::new("Dog", 61.0)));

        game.handle_stroke(&stroke(&[(1.0, 1.0)]));
        assert!(connector.sent().is_empty());
    }

    #[test]
    fn clear_empties_predictions_immediately() {
        let (game, connector) = game();
        game.start_game();
        connector
            .latest()
            .on_predictions(vec![Prediction::new("Sun", 33.0)]);

        game.handle_clear();
        assert!(game.predictions().is_empty());
        assert_eq!(connector.sent(), vec![Sent::Clear]);
        assert_eq!(game.phase(), StreamPhase::Playing);
    }

    #[test]
    fn new_game_replaces_connection_and_ignores_stale_callbacks() {
        let (game, connector) = game();
        game.start_game();
        connector.latest().on_final(Prediction::new("Cat", 90.0));
        assert_eq!(game.phase(), StreamPhase::GameOver);

        game.new_game();
        assert_eq!(game.phase(), StreamPhase::Playing);
        assert_eq!(game.final_result(), None);
        assert_eq!(*connector.disconnects.lock().unwrap(), 1);

        let stale = connector.handler(0);
        stale.on_predictions(vec![Prediction::new("Old", 99.0)]);
        stale.on_final(Prediction::new("Old", 99.0));
        assert!(game.predictions().is_empty());
        assert_eq!(game.phase(), StreamPhase::Playing);
    }

    #[test]
    fn restarting_closes_previous_link() {
        let (game, connector) = game();
        game.start_game();
        game.start_game();
        assert_eq!(*connector.disconnects.lock().unwrap(), 1);
        assert_eq!(connector.handlers.lock().unwrap().len(), 2);
    }

    #[test]
    fn drop_closes_link() {
        let (game, connector) = game();
        game.start_game();
        drop(game);
        assert_eq!(*connector.disconnects.lock().unwrap(), 1);
    }

    #[test]
    fn lost_connection_keeps_the_round() {
        let (game, connector) = game();
        game.start_game();
        connector.latest().on_disconnect();
        assert!(!game.snapshot().connected);
        assert_eq!(game.phase(), StreamPhase::Playing);
        game.handle_submit();
        assert_eq!(game.phase(), StreamPhase::Playing);
    }

    #[test]
    fn refused_connection_still_plays() {
        let connector = Arc::new(FakeConnector {
            refuse: true,
            ..FakeConnector::default()
        });
        let game = StreamingGame::new(connector.clone());
        game.start_game();
        assert_eq!(game.phase(), StreamPhase::Playing);
        assert!(!game.is_connected());
        game.handle_stroke(&stroke(&[(1.0, 1.0)]));
        assert!(connector.sent().is_empty());
    }

    #[test]
    fn snapshot_reports_connection() {
        let (game, _connector) = game();
        assert!(!game.snapshot().connected);
        game.start_game();
        let snapshot = game.snapshot();
        assert!(snapshot.connected);
        assert_eq!(snapshot.phase, StreamPhase::Playing);
    }
}
