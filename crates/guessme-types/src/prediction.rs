use serde::{Deserialize, Serialize};

/// Number of ranked entries a prediction list shows by default.
pub const DEFAULT_TOP_N: usize = 5;

/// Ranked label with a confidence percentage in `[0, 100]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: f64,
}

impl Prediction {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }

    /// Stand-in result when nothing has been ranked yet.
    pub fn placeholder() -> Self {
        Self::new("-", 0.0)
    }

    pub fn tone(&self) -> ConfidenceTone {
        ConfidenceTone::from_confidence(self.confidence)
    }
}

/// REST predictor answer: a digit in place of a free-form label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DigitPrediction {
    pub digit: u8,
    pub confidence: f64,
}

impl DigitPrediction {
    pub fn tone(&self) -> ConfidenceTone {
        ConfidenceTone::from_confidence(self.confidence)
    }
}

/// Coarse confidence band used to colour results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceTone {
    High,
    Medium,
    Low,
}

impl ConfidenceTone {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 70.0 {
            ConfidenceTone::High
        } else if confidence >= 40.0 {
            ConfidenceTone::Medium
        } else {
            ConfidenceTone::Low
        }
    }
}

/// First `n` entries of an already ranked list.
pub fn top_n(predictions: &[Prediction], n: usize) -> &[Prediction] {
    &predictions[..predictions.len().min(n)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tone_bands() {
        assert_eq!(ConfidenceTone::from_confidence(95.0), ConfidenceTone::High);
        assert_eq!(ConfidenceTone::from_confidence(70.0), ConfidenceTone::High);
        assert_eq!(ConfidenceTone::from_confidence(69.0), ConfidenceTone::Medium);
        assert_eq!(ConfidenceTone::from_confidence(40.0), ConfidenceTone::Medium);
        assert_eq!(ConfidenceTone::from_confidence(39.0), ConfidenceTone::Low);
        assert_eq!(ConfidenceTone::from_confidence(0.0), ConfidenceTone::Low);
    }

    #[test]
    fn top_n_truncates_without_reordering() {
        let ranked: Vec<Prediction> = (0..7)
            .map(|i| Prediction::new(format!("label-{i}"), 90.0 - i as f64))
            .collect();
        let shown = top_n(&ranked, DEFAULT_TOP_N);
        assert_eq!(shown.len(), 5);
        assert_eq!(shown[0].label, "label-0");
        assert_eq!(top_n(&ranked[..2], DEFAULT_TOP_N).len(), 2);
    }

    #[test]
    fn digit_prediction_wire_shape() {
        let parsed: DigitPrediction =
            serde_json::from_str(r#"{"digit":7,"confidence":87}"#).expect("parse");
        assert_eq!(parsed.digit, 7);
        assert_eq!(parsed.confidence, 87.0);
        assert_eq!(parsed.tone(), ConfidenceTone::High);
    }
}
