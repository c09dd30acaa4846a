use guessme_types::{
    geometry::Point,
    prediction::{DigitPrediction, Prediction},
};
use rand::Rng;

pub const LABELS: [&str; 13] = [
    "Cat", "Dog", "House", "Tree", "Car", "Sun", "Flower", "Fish", "Bird", "Apple", "Star",
    "Boat", "Cup",
];

/// Ranks labels for a drawing of `strokes` strokes.
pub trait LabelModel: Send + Sync {
    /// At most `limit` entries, highest confidence first.
    fn rank(&self, strokes: usize, limit: usize) -> Vec<Prediction>;
}

/// Confidence grows with the stroke count until ten strokes, with a noise
/// floor of up to 20 points.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomLabelModel;

impl LabelModel for RandomLabelModel {
    fn rank(&self, strokes: usize, limit: usize) -> Vec<Prediction> {
        let mut rng = rand::thread_rng();
        let progress = (strokes as f64 / 10.0).min(1.0);
        let mut ranked: Vec<Prediction> = LABELS
            .iter()
            .map(|label| {
                let confidence =
                    (rng.gen::<f64>() * 60.0 * progress + rng.gen::<f64>() * 20.0).round();
                Prediction::new(*label, confidence)
            })
            .collect();
        ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        ranked.truncate(limit);
        ranked
    }
}

pub trait DigitModel: Send + Sync {
    fn classify(&self, points: &[Point]) -> DigitPrediction;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomDigitModel;

impl DigitModel for RandomDigitModel {
    fn classify(&self, points: &[Point]) -> DigitPrediction {
        let mut rng = rand::thread_rng();
        let confidence = if points.is_empty() {
            rng.gen_range(0u8..=20)
        } else {
            rng.gen_range(30u8..=99)
        };
        DigitPrediction {
            digit: rng.gen_range(0..=9),
            confidence: f64::from(confidence),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranking_is_sorted_and_bounded() {
        let model = RandomLabelModel;
        for strokes in [0, 1, 5, 10, 40] {
            let ranked = model.rank(strokes, 5);
            assert_eq!(ranked.len(), 5);
            assert!(ranked
                .windows(2)
                .all(|pair| pair[0].confidence >= pair[1].confidence));
            for prediction in &ranked {
                assert!(LABELS.contains(&prediction.label.as_str()));
                assert!((0.0..=80.0).contains(&prediction.confidence));
                assert_eq!(prediction.confidence.fract(), 0.0);
            }
        }
    }

    #[test]
    fn no_strokes_means_noise_only() {
        let ranked = RandomLabelModel.rank(0, LABELS.len());
        assert_eq!(ranked.len(), LABELS.len());
        assert!(ranked.iter().all(|p| p.confidence <= 20.0));
    }

    #[test]
    fn limit_truncates() {
        assert_eq!(RandomLabelModel.rank(3, 2).len(), 2);
        assert!(RandomLabelModel.rank(3, 0).is_empty());
    }

    #[test]
    fn digits_stay_in_range() {
        let points = [Point::new(1.0, 2.0)];
        for _ in 0..50 {
            let guess = RandomDigitModel.classify(&points);
            assert!(guess.digit <= 9);
            assert!((30.0..=99.0).contains(&guess.confidence));
        }
        assert!(RandomDigitModel.classify(&[]).confidence <= 20.0);
    }
}
