use std::fmt;

use serde::{Deserialize, Serialize};

/// Which backend protocol a session talks to. A session never mixes the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameMode {
    Simple,
    Streaming,
}

/// User-facing operations a session controller can be asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Start,
    Stroke,
    Submit,
    Clear,
    Retry,
    NewGame,
}

/// Transition guard shared by both game variants.
pub trait Phase: Copy + fmt::Debug + PartialEq + Send + Sync + 'static {
    fn allows(self, action: Action) -> bool;
}

/// Request/response game: `idle -> drawing -> loading -> result`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SimplePhase {
    #[default]
    Idle,
    Drawing,
    Loading,
    Result,
}

impl Phase for SimplePhase {
    fn allows(self, action: Action) -> bool {
        match action {
            Action::Start | Action::Stroke | Action::Clear | Action::NewGame => true,
            Action::Submit => self != SimplePhase::Loading,
            Action::Retry => self == SimplePhase::Result,
        }
    }
}

/// Streaming game: `idle -> playing -> game over`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StreamPhase {
    #[default]
    Idle,
    Playing,
    GameOver,
}

impl Phase for StreamPhase {
    fn allows(self, action: Action) -> bool {
        match action {
            Action::Start | Action::NewGame => true,
            Action::Stroke | Action::Submit | Action::Clear => self == StreamPhase::Playing,
            Action::Retry => false,
        }
    }
}

/// Phase label independent of the variant, for events and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseLabel {
    Simple(SimplePhase),
    Streaming(StreamPhase),
}

impl From<SimplePhase> for PhaseLabel {
    fn from(phase: SimplePhase) -> Self {
        PhaseLabel::Simple(phase)
    }
}

impl From<StreamPhase> for PhaseLabel {
    fn from(phase: StreamPhase) -> Self {
        PhaseLabel::Streaming(phase)
    }
}
