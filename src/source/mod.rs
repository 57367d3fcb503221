//! Input sources for the processing loop.
//!
//! Face-landmark inference and audio capture are external collaborators. The
//! loop only sees them through the [`LandmarkSource`] and [`AudioSource`]
//! traits. Both calls may block and are only ever made on the processing
//! thread. A source is released by dropping it.

pub mod recorded;
pub mod types;

pub use recorded::{JsonLinesLandmarkSource, SilentAudioSource, WavAudioSource};
pub use types::{AudioChunk, LandmarkFrame, Point};

/// Yields the landmarks of the single tracked face for each camera frame.
pub trait LandmarkSource: Send {
    /// Read the next frame. `Ok(None)` means no face was detected.
    fn next_frame(&mut self) -> Result<Option<LandmarkFrame>, SourceError>;
}

/// Yields fixed-size PCM chunks at the configured sample rate.
pub trait AudioSource: Send {
    fn read_chunk(&mut self) -> Result<AudioChunk, SourceError>;
}

impl<T: LandmarkSource + ?Sized> LandmarkSource for Box<T> {
    fn next_frame(&mut self) -> Result<Option<LandmarkFrame>, SourceError> {
        (**self).next_frame()
    }
}

impl<T: AudioSource + ?Sized> AudioSource for Box<T> {
    fn read_chunk(&mut self) -> Result<AudioChunk, SourceError> {
        (**self).read_chunk()
    }
}

/// Errors raised by a source read.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceError {
    /// A single read failed (buffer overflow, dropped frame); skip the tick.
    Transient(String),
    /// The device is gone; the loop must stop.
    DeviceFailure(String),
    /// A recorded source ran out of data.
    EndOfStream,
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Transient(e) => write!(f, "Transient read failure: {e}"),
            SourceError::DeviceFailure(e) => write!(f, "Device failure: {e}"),
            SourceError::EndOfStream => write!(f, "End of stream"),
        }
    }
}

impl std::error::Error for SourceError {}
