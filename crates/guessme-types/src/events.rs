use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    game::{GameMode, PhaseLabel},
    prediction::{DigitPrediction, Prediction},
};

/// Immutable envelope published by session controllers for the view layer
/// and the event journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    pub id: Uuid,
    pub mode: GameMode,
    pub timestamp: DateTime<Utc>,
    pub kind: SessionEventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEventKind {
    PhaseChanged { from: PhaseLabel, to: PhaseLabel },
    StrokeAccepted { points: usize },
    StrokesCleared,
    PredictionsUpdated { count: usize },
    FinalResult(Prediction),
    DigitResult(DigitPrediction),
    SubmissionFailed { message: String },
    Connection { connected: bool },
}

impl SessionEvent {
    pub fn new(mode: GameMode, kind: SessionEventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode,
            timestamp: Utc::now(),
            kind,
        }
    }
}
