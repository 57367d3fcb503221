//! Sources backed by recordings instead of live devices.
//!
//! Landmark recordings are JSON Lines: one value per camera frame, either
//! `null` when no face was found or a [`LandmarkFrame`] object. Audio
//! recordings are 16-bit mono WAV files.

use crate::source::types::{AudioChunk, LandmarkFrame};
use crate::source::{AudioSource, LandmarkSource, SourceError};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Replays landmark frames from a JSON Lines reader.
pub struct JsonLinesLandmarkSource<R> {
    reader: R,
    line: String,
    line_number: usize,
    frame_interval: Option<Duration>,
    last_frame: Option<Instant>,
}

impl JsonLinesLandmarkSource<BufReader<File>> {
    /// Open a recording on disk.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path)
            .map_err(|e| SourceError::DeviceFailure(format!("{}: {e}", path.display())))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> JsonLinesLandmarkSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            line_number: 0,
            frame_interval: None,
            last_frame: None,
        }
    }

    /// Pace playback at the given camera rate instead of as fast as possible.
    pub fn with_frame_rate(mut self, fps: f64) -> Self {
        if fps > 0.0 {
            self.frame_interval = Some(Duration::from_secs_f64(1.0 / fps));
        }
        self
    }

    fn pace(&mut self) {
        if let Some(interval) = self.frame_interval {
            if let Some(last) = self.last_frame {
                let elapsed = last.elapsed();
                if elapsed < interval {
                    thread::sleep(interval - elapsed);
                }
            }
            self.last_frame = Some(Instant::now());
        }
    }
}

impl<R: BufRead + Send> LandmarkSource for JsonLinesLandmarkSource<R> {
    fn next_frame(&mut self) -> Result<Option<LandmarkFrame>, SourceError> {
        self.pace();

        loop {
            self.line.clear();
            let read = self
                .reader
                .read_line(&mut self.line)
                .map_err(|e| SourceError::DeviceFailure(e.to_string()))?;
            if read == 0 {
                return Err(SourceError::EndOfStream);
            }
            self.line_number += 1;

            let trimmed = self.line.trim();
            if trimmed.is_empty() {
                continue;
            }

            return serde_json::from_str::<Option<LandmarkFrame>>(trimmed).map_err(|e| {
                debug!(line = self.line_number, "unreadable landmark record: {e}");
                SourceError::Transient(format!("line {}: {e}", self.line_number))
            });
        }
    }
}

/// Reads fixed-size chunks from a 16-bit mono WAV recording.
pub struct WavAudioSource {
    samples: hound::WavIntoSamples<BufReader<File>, i16>,
    chunk_size: usize,
    sample_rate: u32,
}

impl WavAudioSource {
    pub fn open(path: &Path, chunk_size: usize) -> Result<Self, SourceError> {
        let reader = hound::WavReader::open(path)
            .map_err(|e| SourceError::DeviceFailure(format!("{}: {e}", path.display())))?;

        let spec = reader.spec();
        if spec.channels != 1
            || spec.bits_per_sample != 16
            || spec.sample_format != hound::SampleFormat::Int
        {
            return Err(SourceError::DeviceFailure(format!(
                "{}: expected 16-bit mono PCM, found {} channel(s) of {}-bit {:?}",
                path.display(),
                spec.channels,
                spec.bits_per_sample,
                spec.sample_format
            )));
        }

        Ok(Self {
            samples: reader.into_samples::<i16>(),
            chunk_size: chunk_size.max(1),
            sample_rate: spec.sample_rate,
        })
    }

    /// Sample rate declared by the recording.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl AudioSource for WavAudioSource {
    /// Read the next chunk. A short final chunk is padded with silence so
    /// every chunk the loop sees has the configured size.
    fn read_chunk(&mut self) -> Result<AudioChunk, SourceError> {
        let mut chunk = Vec::with_capacity(self.chunk_size);
        for sample in self.samples.by_ref().take(self.chunk_size) {
            match sample {
                Ok(s) => chunk.push(s),
                Err(e) => return Err(SourceError::Transient(e.to_string())),
            }
        }

        if chunk.is_empty() {
            return Err(SourceError::EndOfStream);
        }
        chunk.resize(self.chunk_size, 0);
        Ok(chunk)
    }
}

/// An audio source that never hears anything.
#[derive(Debug, Clone)]
pub struct SilentAudioSource {
    chunk_size: usize,
}

impl SilentAudioSource {
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size }
    }
}

impl AudioSource for SilentAudioSource {
    fn read_chunk(&mut self) -> Result<AudioChunk, SourceError> {
        Ok(vec![0; self.chunk_size])
    }
}
