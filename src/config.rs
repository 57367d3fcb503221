//! Configuration for Proctor Sentinel.

use crate::core::audio::{DEFAULT_CHUNK_SIZE, DEFAULT_METER_CEILING, DEFAULT_SAMPLE_RATE};
use crate::core::calibration::DEFAULT_WARMUP;
use crate::core::smoothing::DEFAULT_SMOOTHING_WINDOW;
use crate::core::violation::{ChannelSet, Tolerances, DEFAULT_DWELL_FRAMES};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Detection tuning for each session
    pub detector: DetectorConfig,

    /// Audio capture parameters
    pub audio: AudioConfig,

    /// Camera frame rate used when pacing recorded landmarks
    pub camera_fps: f64,

    /// Path for exporting integrity reports
    pub export_path: PathBuf,

    /// Path for storing the tick audit log
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("proctor-sentinel");

        Self {
            detector: DetectorConfig::default(),
            audio: AudioConfig::default(),
            camera_fps: 30.0,
            export_path: data_dir.join("reports"),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            Self::from_json(&content)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from JSON.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("proctor-sentinel")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.export_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }
}

/// Per-session detection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Out-of-tolerance bounds per channel
    pub tolerances: Tolerances,

    /// Consecutive out-of-tolerance ticks before a violation is confirmed
    pub dwell_frames: u32,

    /// Length of the gaze calibration window
    #[serde(with = "duration_secs_f64")]
    pub warmup: Duration,

    /// Which signals are smoothed before evaluation
    pub smoothing: SmoothingConfig,

    /// Which channels are monitored
    pub channels: ChannelSet,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            tolerances: Tolerances::default(),
            dwell_frames: DEFAULT_DWELL_FRAMES,
            warmup: DEFAULT_WARMUP,
            smoothing: SmoothingConfig::default(),
            channels: ChannelSet::default(),
        }
    }
}

/// Moving-average policy.
///
/// Gaze offsets are always smoothed; head and audio signals are evaluated raw
/// unless enabled here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmoothingConfig {
    /// Samples per moving-average window
    pub window: usize,
    /// Smooth nose displacement and head tilt
    pub head: bool,
    /// Smooth audio RMS
    pub audio: bool,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_SMOOTHING_WINDOW,
            head: false,
            audio: false,
        }
    }
}

/// Audio capture parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Samples per chunk
    pub chunk_size: usize,
    /// RMS shown as full scale on the loudness meter
    pub meter_ceiling: f64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            meter_ceiling: DEFAULT_METER_CEILING,
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as fractional seconds.
mod duration_secs_f64 {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
