//! Normalized iris offsets from eye-corner and iris landmarks.
//!
//! Each eye's offset is the iris displacement from the midpoint of its two
//! corners, divided by the eye width horizontally and by half the eye width
//! vertically; eye height is never measured. The two eyes are averaged.

use crate::core::error::TickError;
use crate::source::types::{
    LandmarkFrame, Point, LEFT_EYE_INNER, LEFT_EYE_OUTER, LEFT_IRIS, RIGHT_EYE_INNER,
    RIGHT_EYE_OUTER, RIGHT_IRIS,
};
use serde::{Deserialize, Serialize};

/// Iris offset relative to eye center, averaged across both eyes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GazeSample {
    pub dx: f64,
    pub dy: f64,
}

impl GazeSample {
    pub const fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }
}

/// Compute the gaze sample for one frame.
///
/// Fails with [`TickError::DegenerateLandmarks`] when either eye has zero
/// width or a required landmark is missing.
pub fn compute_gaze(frame: &LandmarkFrame) -> Result<GazeSample, TickError> {
    let left = eye_offset(frame, LEFT_EYE_OUTER, LEFT_EYE_INNER, LEFT_IRIS)?;
    let right = eye_offset(frame, RIGHT_EYE_INNER, RIGHT_EYE_OUTER, RIGHT_IRIS)?;

    Ok(GazeSample {
        dx: (left.dx + right.dx) / 2.0,
        dy: (left.dy + right.dy) / 2.0,
    })
}

fn eye_offset(
    frame: &LandmarkFrame,
    corner_a: usize,
    corner_b: usize,
    iris_index: usize,
) -> Result<GazeSample, TickError> {
    let a = landmark(frame, corner_a)?;
    let b = landmark(frame, corner_b)?;
    let iris = landmark(frame, iris_index)?;

    let center = a.midpoint(b);
    let eye_width = a.distance(b);
    if !eye_width.is_finite() || eye_width <= 0.0 {
        return Err(TickError::DegenerateLandmarks(format!(
            "eye width {eye_width} between landmarks {corner_a} and {corner_b}"
        )));
    }
    let eye_height = eye_width / 2.0;

    let dx = (iris.x - center.x) / eye_width;
    let dy = (iris.y - center.y) / eye_height;
    if !dx.is_finite() || !dy.is_finite() {
        return Err(TickError::DegenerateLandmarks(format!(
            "iris landmark {iris_index} out of range"
        )));
    }

    Ok(GazeSample { dx, dy })
}

/// Pixel position of a landmark, or a degenerate-frame error if it is absent.
pub(crate) fn landmark(frame: &LandmarkFrame, index: usize) -> Result<Point, TickError> {
    frame.pixel(index).ok_or_else(|| {
        TickError::DegenerateLandmarks(format!(
            "landmark {index} missing from a frame of {} points",
            frame.points.len()
        ))
    })
}
