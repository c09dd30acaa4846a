use guessme_types::geometry::Point;

use crate::{DrawingSurface, SurfaceRect};

/// In-memory monochrome raster with a movable on-screen viewport.
///
/// The terminal front end displays it inside a resizable widget, so its
/// displayed rectangle changes independently of its logical resolution.
#[derive(Debug, Clone)]
pub struct RasterSurface {
    width: usize,
    height: usize,
    pixels: Vec<bool>,
    viewport: SurfaceRect,
    pen: Option<Point>,
}

impl RasterSurface {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![false; width * height],
            viewport: SurfaceRect {
                left: 0.0,
                top: 0.0,
                width: width as f64,
                height: height as f64,
            },
            pen: None,
        }
    }

    pub fn set_viewport(&mut self, viewport: SurfaceRect) {
        self.viewport = viewport;
    }

    pub fn is_painted(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && self.pixels[y * self.width + x]
    }

    pub fn painted_count(&self) -> usize {
        self.pixels.iter().filter(|p| **p).count()
    }

    /// Downsample to a `cols x rows` grid; a cell is set when any pixel
    /// inside it is painted.
    pub fn downsample(&self, cols: usize, rows: usize) -> Vec<Vec<bool>> {
        let mut grid = vec![vec![false; cols]; rows];
        if cols == 0 || rows == 0 {
            return grid;
        }
        for y in 0..self.height {
            for x in 0..self.width {
                if self.pixels[y * self.width + x] {
                    let col = x * cols / self.width;
                    let row = y * rows / self.height;
                    grid[row][col] = true;
                }
            }
        }
        grid
    }

    fn plot(&mut self, point: Point) {
        if point.x < 0.0 || point.y < 0.0 {
            return;
        }
        let (x, y) = (point.x as usize, point.y as usize);
        if x < self.width && y < self.height {
            self.pixels[y * self.width + x] = true;
        }
    }

    fn segment(&mut self, from: Point, to: Point) {
        let dx = to.x - from.x;
        let dy = to.y - from.y;
        let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as usize;
        for step in 0..=steps {
            let t = step as f64 / steps as f64;
            self.plot(Point::new(from.x + dx * t, from.y + dy * t));
        }
    }
}

impl DrawingSurface for RasterSurface {
    fn bounding_rect(&self) -> SurfaceRect {
        self.viewport
    }

    fn logical_size(&self) -> (f64, f64) {
        (self.width as f64, self.height as f64)
    }

    fn clear(&mut self) {
        self.pixels.iter_mut().for_each(|p| *p = false);
        self.pen = None;
    }

    fn begin_trace(&mut self, at: Point) {
        self.plot(at);
        self.pen = Some(at);
    }

    fn extend_trace(&mut self, to: Point) {
        match self.pen {
            Some(from) => self.segment(from, to),
            None => self.plot(to),
        }
        self.pen = Some(to);
    }
}
