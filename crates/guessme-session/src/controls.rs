//! What the controls and result panels show, derived from snapshots.

use guessme_types::{
    game::{SimplePhase, StreamPhase},
    prediction::{top_n, ConfidenceTone, Prediction},
};

use crate::{simple::SimpleSnapshot, streaming::StreamSnapshot};

pub const SEND_LABEL: &str = "Send";
pub const SENDING_LABEL: &str = "Sending...";
pub const EMPTY_PREDICTIONS_HINT: &str = "Start drawing to see predictions";

/// Shown once a submission settles; it always carries a Try Again action.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultCard {
    /// Hidden when the submission failed.
    pub digit: Option<u8>,
    pub confidence: f64,
    pub tone: ConfidenceTone,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimpleControls {
    pub send_enabled: bool,
    pub clear_enabled: bool,
    pub send_label: &'static str,
    pub result_card: Option<ResultCard>,
}

impl SimpleControls {
    pub fn from_snapshot(snapshot: &SimpleSnapshot) -> Self {
        let loading = snapshot.is_loading();
        let result_card = (snapshot.phase == SimplePhase::Result).then(|| {
            let confidence = snapshot.result.map(|r| r.confidence).unwrap_or(0.0);
            ResultCard {
                digit: match &snapshot.error {
                    Some(_) => None,
                    None => snapshot.result.map(|r| r.digit),
                },
                confidence,
                tone: ConfidenceTone::from_confidence(confidence),
                error: snapshot.error.clone(),
            }
        });
        Self {
            send_enabled: snapshot.can_submit() && !loading,
            clear_enabled: !loading,
            send_label: if loading { SENDING_LABEL } else { SEND_LABEL },
            result_card,
        }
    }
}

/// Buttons offered by the streaming game. Game over offers only New Game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveControls {
    Start,
    /// `clear` and `submit` are enabled while the link is up.
    Playing { clear: bool, submit: bool },
    GameOver,
}

impl LiveControls {
    pub fn from_snapshot(snapshot: &StreamSnapshot) -> Self {
        match snapshot.phase {
            StreamPhase::Idle => LiveControls::Start,
            StreamPhase::Playing => LiveControls::Playing {
                clear: snapshot.connected,
                submit: snapshot.connected,
            },
            StreamPhase::GameOver => LiveControls::GameOver,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedEntry {
    pub label: String,
    pub confidence: f64,
    /// Only the first entry is highlighted.
    pub leader: bool,
}

/// Top `n` predictions, leader first.
pub fn ranked_predictions(predictions: &[Prediction], n: usize) -> Vec<RankedEntry> {
    top_n(predictions, n)
        .iter()
        .enumerate()
        .map(|(index, prediction)| RankedEntry {
            label: prediction.label.clone(),
            confidence: prediction.confidence,
            leader: index == 0,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinalCard {
    pub label: String,
    pub confidence: f64,
    pub tone: ConfidenceTone,
}

impl FinalCard {
    pub fn from_snapshot(snapshot: &StreamSnapshot) -> Option<Self> {
        if snapshot.phase != StreamPhase::GameOver {
            return None;
        }
        snapshot.final_result.as_ref().map(|result| FinalCard {
            label: result.label.clone(),
            confidence: result.confidence,
            tone: result.tone(),
        })
    }
}
