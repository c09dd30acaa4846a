//! Pointer and touch capture: turns raw input into committed strokes.
//!
//! The engine never renders anything itself. It asks its [`DrawingSurface`]
//! for geometry on every event and forwards trace hints so a view layer can
//! paint, but stroke bookkeeping is independent of how (or whether) anything
//! is drawn.

use guessme_types::geometry::{Point, Stroke};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub mod surface;

pub use surface::RasterSurface;

/// Single contact of a touch event, in on-screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouchPoint {
    pub client_x: f64,
    pub client_y: f64,
}

/// Low-level input as delivered by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PointerEvent {
    Mouse { client_x: f64, client_y: f64 },
    /// Active touches; only the first one is used.
    Touch { touches: Vec<TouchPoint> },
}

impl PointerEvent {
    pub fn mouse(client_x: f64, client_y: f64) -> Self {
        PointerEvent::Mouse { client_x, client_y }
    }

    pub fn touch(client_x: f64, client_y: f64) -> Self {
        PointerEvent::Touch {
            touches: vec![TouchPoint { client_x, client_y }],
        }
    }

    /// On-screen position of the primary contact, if there is one.
    pub fn client_position(&self) -> Option<(f64, f64)> {
        match self {
            PointerEvent::Mouse { client_x, client_y } => Some((*client_x, *client_y)),
            PointerEvent::Touch { touches } => touches.first().map(|t| (t.client_x, t.client_y)),
        }
    }
}

/// Where the surface currently sits on screen and how large it is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Rendering target the capture engine reads geometry from.
pub trait DrawingSurface {
    /// Displayed rectangle in on-screen pixels. Read on every event.
    fn bounding_rect(&self) -> SurfaceRect;
    /// Intrinsic resolution `(width, height)`.
    fn logical_size(&self) -> (f64, f64);
    /// Restore the blank background.
    fn clear(&mut self);
    fn begin_trace(&mut self, _at: Point) {}
    fn extend_trace(&mut self, _to: Point) {}
}

/// Map an on-screen position into logical surface coordinates.
///
/// Returns `None` while the surface has no displayed area.
pub fn normalize(rect: SurfaceRect, logical: (f64, f64), client: (f64, f64)) -> Option<Point> {
    if rect.width <= 0.0 || rect.height <= 0.0 {
        return None;
    }
    let scale_x = logical.0 / rect.width;
    let scale_y = logical.1 / rect.height;
    Some(Point::new(
        (client.0 - rect.left) * scale_x,
        (client.1 - rect.top) * scale_y,
    ))
}

pub type StrokeListener = Box<dyn FnMut(&Stroke) + Send>;

/// Stroke capture engine.
pub struct StrokeCapture<S> {
    surface: Option<S>,
    enabled: bool,
    current: Option<Vec<Point>>,
    strokes: Vec<Stroke>,
    listener: Option<StrokeListener>,
}

impl<S: DrawingSurface> Default for StrokeCapture<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: DrawingSurface> StrokeCapture<S> {
    /// Engine without a mounted surface; every gesture is ignored until
    /// [`StrokeCapture::mount`] is called.
    pub fn new() -> Self {
        Self {
            surface: None,
            enabled: true,
            current: None,
            strokes: Vec::new(),
            listener: None,
        }
    }

    pub fn with_surface(surface: S) -> Self {
        let mut capture = Self::new();
        capture.mount(surface);
        capture
    }

    pub fn mount(&mut self, mut surface: S) {
        surface.clear();
        self.surface = Some(surface);
    }

    pub fn unmount(&mut self) -> Option<S> {
        self.current = None;
        self.surface.take()
    }

    /// Register the callback invoked with every committed stroke.
    pub fn on_stroke<F>(&mut self, listener: F)
    where
        F: FnMut(&Stroke) + Send + 'static,
    {
        self.listener = Some(Box::new(listener));
    }

    pub fn begin(&mut self, event: &PointerEvent) {
        if !self.enabled {
            return;
        }
        let Some(point) = self.locate(event) else {
            return;
        };
        if let Some(surface) = self.surface.as_mut() {
            surface.begin_trace(point);
        }
        self.current = Some(vec![point]);
    }

    pub fn extend(&mut self, event: &PointerEvent) {
        if !self.enabled || self.current.is_none() {
            return;
        }
        let Some(point) = self.locate(event) else {
            return;
        };
        if let Some(surface) = self.surface.as_mut() {
            surface.extend_trace(point);
        }
        if let Some(buffer) = self.current.as_mut() {
            buffer.push(point);
        }
    }

    /// Close the gesture in progress. The closing event's position is not
    /// recorded.
    pub fn end(&mut self, _event: &PointerEvent) -> Option<Stroke> {
        if self.surface.is_none() {
            return None;
        }
        let buffer = self.current.take()?;
        let stroke = Stroke::new(buffer)?;
        self.strokes.push(stroke.clone());
        if let Some(listener) = self.listener.as_mut() {
            listener(&stroke);
        }
        Some(stroke)
    }

    /// Back to the freshly mounted state.
    pub fn reset(&mut self) {
        self.strokes.clear();
        self.current = None;
        if let Some(surface) = self.surface.as_mut() {
            surface.clear();
        }
    }

    /// Disabling mid-gesture drops the gesture; committed strokes stay.
    pub fn set_enabled(&mut self, enabled: bool) {
        if !enabled && self.current.take().is_some() {
            debug!("capture disabled mid-gesture; dropping in-progress stroke");
        }
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_drawing(&self) -> bool {
        self.current.is_some()
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    pub fn surface_mut(&mut self) -> Option<&mut S> {
        self.surface.as_mut()
    }

    fn locate(&self, event: &PointerEvent) -> Option<Point> {
        let surface = self.surface.as_ref()?;
        let client = event.client_position()?;
        normalize(surface.bounding_rect(), surface.logical_size(), client)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Default)]
    struct FakeSurface {
        rect: Option<SurfaceRect>,
        logical: (f64, f64),
        clears: usize,
        traced: Vec<Point>,
    }

    impl FakeSurface {
        fn square(displayed: f64, logical: f64) -> Self {
            Self {
                rect: Some(SurfaceRect {
                    left: 0.0,
                    top: 0.0,
                    width: displayed,
                    height: displayed,
                }),
                logical: (logical, logical),
                ..Default::default()
            }
        }
    }

    impl DrawingSurface for FakeSurface {
        fn bounding_rect(&self) -> SurfaceRect {
            self.rect.unwrap_or(SurfaceRect {
                left: 0.0,
                top: 0.0,
                width: 0.0,
                height: 0.0,
            })
        }

        fn logical_size(&self) -> (f64, f64) {
            self.logical
        }

        fn clear(&mut self) {
            self.clears += 1;
            self.traced.clear();
        }

        fn begin_trace(&mut self, at: Point) {
            self.traced.push(at);
        }

        fn extend_trace(&mut self, to: Point) {
            self.traced.push(to);
        }
    }

    fn capture() -> StrokeCapture<FakeSurface> {
        StrokeCapture::with_surface(FakeSurface::square(100.0, 100.0))
    }

    #[test]
    fn commits_one_stroke_per_gesture() {
        let mut engine = capture();
        let emitted = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&emitted);
        engine.on_stroke(move |stroke| sink.lock().unwrap().push(stroke.clone()));

        engine.begin(&PointerEvent::mouse(10.0, 10.0));
        engine.extend(&PointerEvent::mouse(20.0, 20.0));
        let stroke = engine.end(&PointerEvent::mouse(20.0, 20.0)).expect("committed");

        assert_eq!(
            stroke.points(),
            &[Point::new(10.0, 10.0), Point::new(20.0, 20.0)]
        );
        assert_eq!(engine.strokes().len(), 1);
        assert_eq!(emitted.lock().unwrap().len(), 1);
        assert!(!engine.is_drawing());
    }

    #[test]
    fn tap_without_movement_still_commits() {
        let mut engine = capture();
        engine.begin(&PointerEvent::mouse(5.0, 5.0));
        let stroke = engine.end(&PointerEvent::mouse(5.0, 5.0)).expect("committed");
        assert_eq!(stroke.len(), 1);
    }

    #[test]
    fn toggles_before_begin_do_not_matter() {
        let mut engine = capture();
        engine.set_enabled(false);
        engine.begin(&PointerEvent::mouse(1.0, 1.0));
        assert!(!engine.is_drawing());
        engine.set_enabled(true);
        engine.set_enabled(false);
        engine.set_enabled(true);

        engine.begin(&PointerEvent::mouse(1.0, 1.0));
        engine.extend(&PointerEvent::mouse(2.0, 2.0));
        assert!(engine.end(&PointerEvent::mouse(2.0, 2.0)).is_some());
        assert_eq!(engine.strokes().len(), 1);
    }

    #[test]
    fn disabling_mid_gesture_drops_the_stroke() {
        let mut engine = capture();
        let emitted = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&emitted);
        engine.on_stroke(move |_| *sink.lock().unwrap() += 1);

        engine.begin(&PointerEvent::mouse(1.0, 1.0));
        engine.extend(&PointerEvent::mouse(2.0, 2.0));
        engine.set_enabled(false);
        engine.extend(&PointerEvent::mouse(3.0, 3.0));
        assert!(engine.end(&PointerEvent::mouse(3.0, 3.0)).is_none());

        engine.set_enabled(true);
        assert!(engine.end(&PointerEvent::mouse(3.0, 3.0)).is_none());
        assert!(engine.strokes().is_empty());
        assert_eq!(*emitted.lock().unwrap(), 0);
    }

    #[test]
    fn disabling_keeps_committed_strokes() {
        let mut engine = capture();
        engine.begin(&PointerEvent::mouse(1.0, 1.0));
        engine.end(&PointerEvent::mouse(1.0, 1.0));
        engine.set_enabled(false);
        assert_eq!(engine.strokes().len(), 1);
    }

    #[test]
    fn extend_without_begin_is_ignored() {
        let mut engine = capture();
        engine.extend(&PointerEvent::mouse(4.0, 4.0));
        assert!(engine.end(&PointerEvent::mouse(4.0, 4.0)).is_none());
        assert!(engine.strokes().is_empty());
    }

    #[test]
    fn scales_to_logical_resolution() {
        let mut engine = StrokeCapture::with_surface(FakeSurface::square(200.0, 400.0));
        engine.begin(&PointerEvent::mouse(100.0, 100.0));
        let stroke = engine.end(&PointerEvent::mouse(100.0, 100.0)).unwrap();
        assert_eq!(stroke.points()[0], Point::new(200.0, 200.0));
    }

    #[test]
    fn scale_is_read_on_every_event() {
        let mut engine = StrokeCapture::with_surface(FakeSurface::square(200.0, 400.0));
        engine.begin(&PointerEvent::mouse(100.0, 100.0));
        if let Some(surface) = engine.surface_mut() {
            surface.rect = Some(SurfaceRect {
                left: 50.0,
                top: 50.0,
                width: 400.0,
                height: 400.0,
            });
        }
        engine.extend(&PointerEvent::mouse(150.0, 250.0));
        let stroke = engine.end(&PointerEvent::mouse(150.0, 250.0)).unwrap();
        assert_eq!(
            stroke.points(),
            &[Point::new(200.0, 200.0), Point::new(100.0, 200.0)]
        );
    }

    #[test]
    fn touch_uses_first_contact_only() {
        let mut engine = capture();
        engine.begin(&PointerEvent::Touch {
            touches: vec![
                TouchPoint {
                    client_x: 30.0,
                    client_y: 40.0,
                },
                TouchPoint {
                    client_x: 90.0,
                    client_y: 90.0,
                },
            ],
        });
        engine.extend(&PointerEvent::touch(35.0, 45.0));
        let stroke = engine.end(&PointerEvent::Touch { touches: vec![] }).unwrap();
        assert_eq!(
            stroke.points(),
            &[Point::new(30.0, 40.0), Point::new(35.0, 45.0)]
        );
    }

    #[test]
    fn unmounted_engine_ignores_everything() {
        let mut engine: StrokeCapture<FakeSurface> = StrokeCapture::new();
        engine.begin(&PointerEvent::mouse(1.0, 1.0));
        engine.extend(&PointerEvent::mouse(2.0, 2.0));
        assert!(engine.end(&PointerEvent::mouse(2.0, 2.0)).is_none());
        engine.reset();
        assert!(engine.strokes().is_empty());
        assert!(engine.surface().is_none());
    }

    #[test]
    fn reset_matches_fresh_state() {
        let mut engine = capture();
        engine.begin(&PointerEvent::mouse(1.0, 1.0));
        engine.end(&PointerEvent::mouse(1.0, 1.0));
        engine.begin(&PointerEvent::mouse(2.0, 2.0));
        engine.reset();

        assert!(engine.strokes().is_empty());
        assert!(!engine.is_drawing());
        assert!(engine.is_enabled());
        let surface = engine.surface().unwrap();
        assert_eq!(surface.clears, 2);
        assert!(surface.traced.is_empty());
    }
}
