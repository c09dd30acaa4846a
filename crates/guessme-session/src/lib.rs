//! Game session controllers coordinating capture, transports, and the timer.

pub mod board;
pub mod controls;
pub mod simple;
pub mod streaming;
pub mod timer;

use async_trait::async_trait;
use futures::stream::BoxStream;
use guessme_types::{
    events::SessionEvent,
    game::{Action, GameMode, Phase},
    geometry::Stroke,
    GuessmeError,
};
use serde::Serialize;
use tracing::debug;

pub use board::{LiveBoard, SimpleBoard};
pub use controls::{ranked_predictions, FinalCard, LiveControls, RankedEntry, ResultCard, SimpleControls};
pub use simple::{SimpleGame, SimpleSnapshot};
pub use streaming::{StreamSnapshot, StreamingGame};
pub use timer::CountdownTimer;

/// Observable state of either game variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SessionSnapshot {
    Simple(SimpleSnapshot),
    Streaming(StreamSnapshot),
}

/// Uniform surface over both game variants.
#[async_trait]
pub trait SessionController: Send + Sync {
    fn mode(&self) -> GameMode;
    async fn start(&self);
    async fn stroke(&self, stroke: Stroke);
    async fn submit(&self);
    async fn clear(&self);
    async fn new_game(&self);
    fn snapshot(&self) -> SessionSnapshot;
    fn subscribe(&self) -> BoxStream<'static, SessionEvent>;
}

/// Consult the phase table, logging rejected actions.
pub(crate) fn permitted<P: Phase>(mode: GameMode, phase: P, action: Action) -> bool {
    let allowed = phase.allows(action);
    if !allowed {
        debug!(?mode, ?phase, ?action, "action rejected in current phase");
    }
    allowed
}

pub fn session_error(message: impl Into<String>) -> GuessmeError {
    GuessmeError::Session(message.into())
}
