//! Head displacement and tilt from landmark positions.

use crate::core::error::TickError;
use crate::core::gaze::landmark;
use crate::source::types::{LandmarkFrame, LEFT_EYE_OUTER, NOSE_TIP, RIGHT_EYE_INNER};
use serde::{Deserialize, Serialize};

/// Nose displacement from frame center and eye-line tilt.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HeadSample {
    /// Horizontal nose offset from the frame center, in pixels
    pub dx_px: f64,
    /// Vertical nose offset from the frame center, in pixels
    pub dy_px: f64,
    /// Signed tilt of the eye-to-eye vector, in degrees (0 is level)
    pub angle_deg: f64,
}

impl HeadSample {
    /// Straight-line distance of the nose from the frame center.
    pub fn displacement_px(&self) -> f64 {
        self.dx_px.hypot(self.dy_px)
    }
}

/// Estimate head pose for one frame.
pub fn estimate_head_pose(frame: &LandmarkFrame) -> Result<HeadSample, TickError> {
    let nose = landmark(frame, NOSE_TIP)?;
    let center = frame.center_px();

    let left_eye = landmark(frame, LEFT_EYE_OUTER)?;
    let right_eye = landmark(frame, RIGHT_EYE_INNER)?;
    let angle_deg = (right_eye.y - left_eye.y)
        .atan2(right_eye.x - left_eye.x)
        .to_degrees();

    let head = HeadSample {
        dx_px: nose.x - center.x,
        dy_px: nose.y - center.y,
        angle_deg,
    };
    // atan2 stays finite for infinite inputs, so the eye points are checked too.
    let finite = [left_eye.x, left_eye.y, right_eye.x, right_eye.y]
        .iter()
        .chain(&[head.dx_px, head.dy_px, head.angle_deg])
        .all(|v| v.is_finite());
    if !finite {
        return Err(TickError::DegenerateLandmarks(
            "head landmarks out of range".to_string(),
        ));
    }

    Ok(head)
}
