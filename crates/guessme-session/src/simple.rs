//! Request/response game: draw, send once, read the digit.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::stream::BoxStream;
use guessme_network::{DigitPredictor, EventHub};
use guessme_types::{
    events::{SessionEvent, SessionEventKind},
    game::{Action, GameMode, SimplePhase},
    geometry::{flatten_strokes, Stroke},
    prediction::DigitPrediction,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{permitted, SessionController, SessionSnapshot};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimpleSnapshot {
    pub phase: SimplePhase,
    pub strokes: Vec<Stroke>,
    pub result: Option<DigitPrediction>,
    pub error: Option<String>,
}

impl SimpleSnapshot {
    pub fn can_submit(&self) -> bool {
        !self.strokes.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.phase == SimplePhase::Loading
    }
}

#[derive(Default)]
struct SimpleState {
    phase: SimplePhase,
    strokes: Vec<Stroke>,
    result: Option<DigitPrediction>,
    error: Option<String>,
    /// Bumped by `new_game`; outcomes of older submissions are discarded.
    epoch: u64,
}

pub struct SimpleGame<P> {
    predictor: P,
    state: Mutex<SimpleState>,
    hub: EventHub,
}

impl<P: DigitPredictor> SimpleGame<P> {
    pub fn new(predictor: P) -> Self {
        Self::with_hub(predictor, EventHub::default())
    }

    pub fn with_hub(predictor: P, hub: EventHub) -> Self {
        Self {
            predictor,
            state: Mutex::new(SimpleState::default()),
            hub,
        }
    }

    pub fn phase(&self) -> SimplePhase {
        self.lock().phase
    }

    pub fn strokes(&self) -> Vec<Stroke> {
        self.lock().strokes.clone()
    }

    pub fn result(&self) -> Option<DigitPrediction> {
        self.lock().result
    }

    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    pub fn can_submit(&self) -> bool {
        !self.lock().strokes.is_empty()
    }

    pub fn snapshot(&self) -> SimpleSnapshot {
        let state = self.lock();
        SimpleSnapshot {
            phase: state.phase,
            strokes: state.strokes.clone(),
            result: state.result,
            error: state.error.clone(),
        }
    }

    pub fn start_drawing(&self) {
        let mut state = self.lock();
        state.result = None;
        state.error = None;
        self.enter(&mut state, SimplePhase::Drawing);
    }

    /// Drawing on an idle board starts the round.
    pub fn add_stroke(&self, stroke: Stroke) {
        let mut state = self.lock();
        if state.phase == SimplePhase::Idle {
            state.result = None;
            state.error = None;
            self.enter(&mut state, SimplePhase::Drawing);
        }
        let points = stroke.len();
        state.strokes.push(stroke);
        self.emit(SessionEventKind::StrokeAccepted { points });
    }

    /// Empties the stroke history; the phase is left alone.
    pub fn clear_canvas(&self) {
        let mut state = self.lock();
        state.strokes.clear();
        self.emit(SessionEventKind::StrokesCleared);
    }

    /// Single-flight submission. Failures end up in [`SimpleGame::error`],
    /// never in the return value.
    pub async fn submit_drawing(&self) {
        let (points, epoch) = {
            let mut state = self.lock();
            if state.strokes.is_empty() {
                debug!("nothing drawn; submit ignored");
                return;
            }
            if !permitted(GameMode::Simple, state.phase, Action::Submit) {
                return;
            }
            state.error = None;
            self.enter(&mut state, SimplePhase::Loading);
            (flatten_strokes(&state.strokes), state.epoch)
        };

        info!(points = points.len(), "submitting drawing");
        let outcome = self.predictor.predict(&points).await;

        let mut state = self.lock();
        if state.epoch != epoch {
            debug!("game was reset while predicting; dropping outcome");
            return;
        }
        match outcome {
            Ok(prediction) => {
                info!(digit = prediction.digit, confidence = prediction.confidence, "prediction received");
                state.result = Some(prediction);
                self.emit(SessionEventKind::DigitResult(prediction));
            }
            Err(err) => {
                warn!(error = %err, "prediction failed");
                let message = err.to_string();
                state.result = None;
                state.error = Some(message.clone());
                self.emit(SessionEventKind::SubmissionFailed { message });
            }
        }
        self.enter(&mut state, SimplePhase::Result);
    }

    /// Back to drawing with the same strokes.
    pub fn retry(&self) {
        let mut state = self.lock();
        if !permitted(GameMode::Simple, state.phase, Action::Retry) {
            return;
        }
        state.result = None;
        state.error = None;
        self.enter(&mut state, SimplePhase::Drawing);
    }

    pub fn new_game(&self) {
        let mut state = self.lock();
        state.epoch += 1;
        state.strokes.clear();
        state.result = None;
        state.error = None;
        self.enter(&mut state, SimplePhase::Idle);
    }

    pub fn subscribe(&self) -> BoxStream<'static, SessionEvent> {
        self.hub.subscribe()
    }

    fn enter(&self, state: &mut SimpleState, to: SimplePhase) {
        let from = state.phase;
        if from == to {
            return;
        }
        state.phase = to;
        debug!(?from, ?to, "simple phase change");
        self.emit(SessionEventKind::PhaseChanged {
            from: from.into(),
            to: to.into(),
        });
    }

    fn emit(&self, kind: SessionEventKind) {
        self.hub.publish(SessionEvent::new(GameMode::Simple, kind));
    }

    fn lock(&self) -> MutexGuard<'_, SimpleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl<P: DigitPredictor + 'static> SessionController for SimpleGame<P> {
    fn mode(&self) -> GameMode {
        GameMode::Simple
    }

    async fn start(&self) {
        self.start_drawing();
    }

    async fn stroke(&self, stroke: Stroke) {
        self.add_stroke(stroke);
    }

    async fn submit(&self) {
        self.submit_drawing().await;
    }

    async fn clear(&self) {
        self.clear_canvas();
    }

    async fn new_game(&self) {
        SimpleGame::new_game(self);
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::Simple(SimpleGame::snapshot(self))
    }

    fn subscribe(&self) -> BoxStream<'static, SessionEvent> {
        SimpleGame::subscribe(self)
    }
}
