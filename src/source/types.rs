//! Input types handed to the pipeline by the landmark and audio sources.
//!
//! Landmark positions are normalized to the camera frame (0.0..=1.0 on both
//! axes). The frame dimensions travel with them so the pipeline can work in
//! pixel space.

use serde::{Deserialize, Serialize};

/// Outer corner of the left eye. Also the left anchor of the head-tilt vector.
pub const LEFT_EYE_OUTER: usize = 33;
/// Inner corner of the left eye.
pub const LEFT_EYE_INNER: usize = 133;
/// Inner corner of the right eye. Also the right anchor of the head-tilt vector.
pub const RIGHT_EYE_INNER: usize = 362;
/// Outer corner of the right eye.
pub const RIGHT_EYE_OUTER: usize = 263;
/// Refined iris center of the left eye.
pub const LEFT_IRIS: usize = 468;
/// Refined iris center of the right eye.
pub const RIGHT_IRIS: usize = 473;
/// Nose tip.
pub const NOSE_TIP: usize = 1;

/// Minimum number of points a frame must carry to cover every index above.
pub const REQUIRED_LANDMARKS: usize = RIGHT_IRIS + 1;

/// A normalized landmark position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn midpoint(self, other: Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    pub fn distance(self, other: Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// Landmarks for the single face detected in one camera frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    /// Camera frame width in pixels
    pub width: u32,
    /// Camera frame height in pixels
    pub height: u32,
    /// Normalized positions, indexed by face-mesh landmark id
    pub points: Vec<Point>,
}

impl LandmarkFrame {
    pub fn new(width: u32, height: u32, points: Vec<Point>) -> Self {
        Self {
            width,
            height,
            points,
        }
    }

    /// Normalized position of a landmark, if the frame carries it.
    pub fn point(&self, index: usize) -> Option<Point> {
        self.points.get(index).copied()
    }

    /// Position of a landmark projected into pixel space.
    pub fn pixel(&self, index: usize) -> Option<Point> {
        self.point(index)
            .map(|p| Point::new(p.x * self.width as f64, p.y * self.height as f64))
    }

    /// Geometric center of the camera frame in pixels.
    pub fn center_px(&self) -> Point {
        Point::new(self.width as f64 / 2.0, self.height as f64 / 2.0)
    }
}

/// One fixed-size chunk of signed 16-bit mono PCM.
pub type AudioChunk = Vec<i16>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance(b) - 5.0).abs() < 1e-12);
        assert_eq!(a.midpoint(b), Point::new(1.5, 2.0));
    }

    #[test]
    fn test_pixel_projection() {
        let mut points = vec![Point::default(); REQUIRED_LANDMARKS];
        points[NOSE_TIP] = Point::new(0.25, 0.5);
        let frame = LandmarkFrame::new(640, 480, points);

        assert_eq!(frame.pixel(NOSE_TIP), Some(Point::new(160.0, 240.0)));
        assert_eq!(frame.center_px(), Point::new(320.0, 240.0));
        assert_eq!(frame.pixel(REQUIRED_LANDMARKS), None);
    }
}
