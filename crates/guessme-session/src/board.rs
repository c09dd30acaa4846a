//! Glue between a capture engine and a game controller, one per screen.

use std::sync::Arc;

use guessme_canvas::{DrawingSurface, PointerEvent, StrokeCapture};
use guessme_network::DigitPredictor;
use guessme_types::{
    game::{SimplePhase, StreamPhase},
    geometry::Stroke,
    time_control::TimeControl,
};

use crate::{
    controls::{ranked_predictions, FinalCard, LiveControls, RankedEntry, SimpleControls},
    simple::SimpleGame,
    streaming::StreamingGame,
    timer::CountdownTimer,
};

/// Draw, send, read the digit.
pub struct SimpleBoard<S, P> {
    capture: StrokeCapture<S>,
    game: Arc<SimpleGame<P>>,
}

impl<S, P> SimpleBoard<S, P>
where
    S: DrawingSurface,
    P: DigitPredictor + 'static,
{
    pub fn new(surface: S, game: Arc<SimpleGame<P>>) -> Self {
        let mut capture = StrokeCapture::with_surface(surface);
        let sink = Arc::clone(&game);
        capture.on_stroke(move |stroke| sink.add_stroke(stroke.clone()));
        let mut board = Self { capture, game };
        board.sync();
        board
    }

    pub fn game(&self) -> Arc<SimpleGame<P>> {
        Arc::clone(&self.game)
    }

    pub fn capture(&self) -> &StrokeCapture<S> {
        &self.capture
    }

    pub fn capture_mut(&mut self) -> &mut StrokeCapture<S> {
        &mut self.capture
    }

    pub fn pointer_down(&mut self, event: &PointerEvent) {
        self.sync();
        self.capture.begin(event);
    }

    pub fn pointer_move(&mut self, event: &PointerEvent) {
        self.capture.extend(event);
    }

    pub fn pointer_up(&mut self, event: &PointerEvent) -> Option<Stroke> {
        self.capture.end(event)
    }

    /// Wipe the surface and the stroke history.
    pub fn clear(&mut self) {
        if !SimpleControls::from_snapshot(&self.game.snapshot()).clear_enabled {
            return;
        }
        self.capture.reset();
        self.game.clear_canvas();
    }

    pub async fn send(&self) {
        self.game.submit_drawing().await;
    }

    /// Result-card action: blank board, fresh game.
    pub fn try_again(&mut self) {
        if self.game.phase() != SimplePhase::Result {
            return;
        }
        self.new_game();
    }

    /// Back to drawing with the previous strokes still on the surface.
    pub fn retry(&mut self) {
        self.game.retry();
        self.sync();
    }

    pub fn new_game(&mut self) {
        self.capture.reset();
        self.game.new_game();
        self.sync();
    }

    pub fn controls(&self) -> SimpleControls {
        SimpleControls::from_snapshot(&self.game.snapshot())
    }

    /// Drawing is only accepted before a submission.
    pub fn sync(&mut self) {
        let phase = self.game.phase();
        self.capture
            .set_enabled(matches!(phase, SimplePhase::Idle | SimplePhase::Drawing));
    }
}

/// Timed round with live predictions.
pub struct LiveBoard<S> {
    capture: StrokeCapture<S>,
    game: Arc<StreamingGame>,
    timer: CountdownTimer,
}

impl<S: DrawingSurface> LiveBoard<S> {
    pub fn new(surface: S, game: Arc<StreamingGame>, control: TimeControl) -> Self {
        let mut capture = StrokeCapture::with_surface(surface);
        let sink = Arc::clone(&game);
        capture.on_stroke(move |stroke| sink.handle_stroke(stroke));

        let timer = CountdownTimer::new(control);
        let weak = Arc::downgrade(&game);
        timer.on_timeout(move || {
            if let Some(game) = weak.upgrade() {
                game.handle_timeout();
            }
        });

        let mut board = Self {
            capture,
            game,
            timer,
        };
        board.sync();
        board
    }

    pub fn game(&self) -> Arc<StreamingGame> {
        Arc::clone(&self.game)
    }

    pub fn capture(&self) -> &StrokeCapture<S> {
        &self.capture
    }

    pub fn capture_mut(&mut self) -> &mut StrokeCapture<S> {
        &mut self.capture
    }

    /// Requires a tokio runtime for the countdown.
    pub fn start(&mut self) {
        self.capture.reset();
        self.game.start_game();
        self.restart_timer();
        self.sync();
    }

    pub fn new_game(&mut self) {
        self.capture.reset();
        self.game.new_game();
        self.restart_timer();
        self.sync();
    }

    pub fn pointer_down(&mut self, event: &PointerEvent) {
        self.sync();
        self.capture.begin(event);
    }

    pub fn pointer_move(&mut self, event: &PointerEvent) {
        self.capture.extend(event);
    }

    pub fn pointer_up(&mut self, event: &PointerEvent) -> Option<Stroke> {
        self.capture.end(event)
    }

    pub fn clear(&mut self) {
        if self.game.phase() != StreamPhase::Playing {
            return;
        }
        self.capture.reset();
        self.game.handle_clear();
    }

    pub fn submit(&mut self) {
        self.game.handle_submit();
    }

    pub fn controls(&self) -> LiveControls {
        LiveControls::from_snapshot(&self.game.snapshot())
    }

    pub fn predictions(&self, n: usize) -> Vec<RankedEntry> {
        ranked_predictions(&self.game.predictions(), n)
    }

    pub fn final_card(&self) -> Option<FinalCard> {
        FinalCard::from_snapshot(&self.game.snapshot())
    }

    pub fn time_left(&self) -> u32 {
        self.timer.time_left()
    }

    pub fn is_warning(&self) -> bool {
        self.timer.is_warning()
    }

    /// Pull state changes pushed by the connection: capture follows the
    /// phase and the countdown halts once the round is over.
    pub fn sync(&mut self) {
        let phase = self.game.phase();
        self.capture.set_enabled(phase == StreamPhase::Playing);
        if phase == StreamPhase::GameOver && self.timer.is_running() {
            self.timer.stop();
        }
    }

    pub fn shutdown(&mut self) {
        self.timer.stop();
        self.game.shutdown();
    }

    fn restart_timer(&self) {
        self.timer.reset();
        self.timer.start();
    }
}
