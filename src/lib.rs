//! Proctor Sentinel - real-time integrity monitor for proctored exams.
//!
//! This library turns face-landmark frames and microphone chunks into
//! debounced violation counts: gaze leaving the screen, the head drifting
//! or tilting away, and sustained noise in the room.
//!
//! # Monitoring Guarantees
//!
//! - **No imagery**: Only landmark coordinates reach the pipeline, never frames
//! - **No recordings**: Audio is reduced to one loudness value per chunk
//! - **Debounced**: A violation needs sustained deviation, not a single glance
//! - **Auditable**: Every tick is counted in the audit log
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         Proctor Sentinel                         │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐   ┌────────────┐   ┌─────────────┐               │
//! │  │  Landmark  │──▶│ Gaze/Head  │──▶│  Smoothing  │──┐            │
//! │  │   Source   │   │  measure   │   └─────────────┘  ▼            │
//! │  └────────────┘   └────────────┘          ┌──────────────────┐   │
//! │  ┌────────────┐   ┌────────────┐          │ Calibration then │   │
//! │  │   Audio    │──▶│    RMS     │─────────▶│ Violation detect │   │
//! │  │   Source   │   └────────────┘          └──────────────────┘   │
//! │  └────────────┘                                   │              │
//! │        monitor thread                             ▼              │
//! │  ┌─────────────┐                          ┌──────────────┐       │
//! │  │ Transparency│                          │ Latest-wins  │──▶ UI │
//! │  │    Log      │                          │    relay     │       │
//! │  └─────────────┘                          └──────────────┘       │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use proctor_sentinel::{monitor::Monitor, source, transparency, Config};
//! use std::path::Path;
//! use std::time::Duration;
//!
//! let config = Config::default();
//! let landmarks = source::JsonLinesLandmarkSource::open(Path::new("session.jsonl"))
//!     .expect("Failed to open landmarks")
//!     .with_frame_rate(config.camera_fps);
//!
//! let mut monitor = Monitor::new(config, transparency::create_shared_log())
//!     .with_landmarks(Box::new(landmarks));
//! let mut reader = monitor.start().expect("Failed to start monitor");
//!
//! while !reader.is_terminated() {
//!     if let Some(snapshot) = reader.poll() {
//!         println!("eye violations: {}", snapshot.eye_violations);
//!     }
//!     reader.wait(Duration::from_millis(100));
//! }
//! let summary = monitor.wait();
//! ```

pub mod config;
pub mod core;
pub mod monitor;
pub mod relay;
pub mod source;
pub mod transparency;

// Re-export key types at crate root for convenience
pub use config::{AudioConfig, Config, ConfigError, DetectorConfig, SmoothingConfig};
pub use core::{
    Channel, ChannelSet, IntegrityReport, MonitorSnapshot, ProctorSession, ReportBuilder,
    SessionReport, SessionSummary, TickError, Tolerances,
};
pub use monitor::{Monitor, MonitorError};
pub use relay::{relay, RelayReader, RelayUpdate, TerminalStatus};
pub use source::{AudioSource, LandmarkFrame, LandmarkSource, SourceError};
pub use transparency::{SharedTransparencyLog, TransparencyLog, TransparencyStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Monitoring notice shown to candidates before a session starts.
pub const MONITORING_NOTICE: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║             PROCTOR SENTINEL - EXAM MONITORING NOTICE            ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This exam is monitored for integrity while it is in progress.   ║
║                                                                  ║
║  ✓ WHAT IS MEASURED:                                             ║
║    • Where your eyes point relative to your calibrated center    ║
║    • How far your head moves from the center of the camera view  ║
║    • How much your head tilts                                    ║
║    • How loud the room is                                        ║
║                                                                  ║
║  ✗ WHAT IS NEVER KEPT:                                           ║
║    • Camera images or video                                      ║
║    • Audio recordings or speech                                  ║
║    • Facial landmarks after each frame is measured               ║
║                                                                  ║
║  The first seconds of the session calibrate your neutral gaze.   ║
║  Please look at the screen normally during that time.            ║
║                                                                  ║
║  Only violation counts are included in the final report.         ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
