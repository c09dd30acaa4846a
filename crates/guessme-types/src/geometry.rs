use serde::{Deserialize, Serialize};

use crate::GuessmeError;

/// Canvas-space coordinate, already scaled to the surface's logical resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One continuous pointer-down to pointer-up gesture.
///
/// A committed stroke always holds at least one point; `Stroke::new` refuses
/// an empty buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point>", into = "Vec<Point>")]
pub struct Stroke(Vec<Point>);

impl TryFrom<Vec<Point>> for Stroke {
    type Error = GuessmeError;

    fn try_from(points: Vec<Point>) -> Result<Self, Self::Error> {
        Stroke::new(points)
            .ok_or_else(|| GuessmeError::Capture("a stroke needs at least one point".into()))
    }
}

impl From<Stroke> for Vec<Point> {
    fn from(stroke: Stroke) -> Self {
        stroke.0
    }
}

impl Stroke {
    pub fn new(points: Vec<Point>) -> Option<Self> {
        if points.is_empty() {
            None
        } else {
            Some(Self(points))
        }
    }

    pub fn points(&self) -> &[Point] {
        &self.0
    }

    pub fn into_points(self) -> Vec<Point> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Concatenate strokes into a single point sequence, keeping stroke order and
/// the point order inside every stroke.
pub fn flatten_strokes(strokes: &[Stroke]) -> Vec<Point> {
    strokes
        .iter()
        .flat_map(|stroke| stroke.points().iter().copied())
        .collect()
}

/// Parse a strokes document (`[[{"x":..,"y":..}, ..], ..]`).
///
/// Empty inner arrays are skipped since they can never be committed strokes.
pub fn strokes_from_json(doc: &str) -> serde_json::Result<Vec<Stroke>> {
    let raw: Vec<Vec<Point>> = serde_json::from_str(doc)?;
    Ok(raw.into_iter().filter_map(Stroke::new).collect())
}
