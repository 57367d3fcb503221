//! Per-tick failure taxonomy.
//!
//! Every variant is local to the tick it occurred in: the tick is skipped (or
//! its audio treated as silence) and no accumulated state is touched. Device
//! loss never becomes a `TickError`; it ends the loop through
//! [`crate::source::SourceError::DeviceFailure`].

/// Reasons a tick could not be fully evaluated.
#[derive(Debug, Clone, PartialEq)]
pub enum TickError {
    /// The landmark source found no face this frame.
    NoFaceDetected,
    /// Landmarks were present but unusable (zero eye width, missing index).
    DegenerateLandmarks(String),
    /// The audio read failed for this chunk only.
    AudioReadTransient(String),
}

impl std::fmt::Display for TickError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TickError::NoFaceDetected => write!(f, "No face detected"),
            TickError::DegenerateLandmarks(e) => write!(f, "Degenerate landmarks: {e}"),
            TickError::AudioReadTransient(e) => write!(f, "Transient audio read failure: {e}"),
        }
    }
}

impl std::error::Error for TickError {}
