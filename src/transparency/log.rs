//! Tick audit log.
//!
//! Counts what the processing loop did with every tick so that a reviewer
//! can tell a quiet session from one where the camera never saw a face.
//! Only counters are kept; no frames, landmarks or audio.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Audit counters for monitoring sessions.
#[derive(Debug)]
pub struct TransparencyLog {
    /// Ticks run by the processing loop
    ticks_processed: AtomicU64,
    /// Ticks where the landmark source reported no face
    no_face_ticks: AtomicU64,
    /// Frames whose landmarks could not be measured
    degenerate_frames: AtomicU64,
    /// Transient landmark read failures
    frame_read_failures: AtomicU64,
    /// Audio chunks evaluated
    audio_chunks: AtomicU64,
    /// Transient audio read failures (treated as silence)
    audio_read_failures: AtomicU64,
    /// Violations confirmed across all channels
    violations_confirmed: AtomicU64,
    /// Integrity reports written
    reports_exported: AtomicU64,
    /// Log start time
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl TransparencyLog {
    pub fn new() -> Self {
        Self {
            ticks_processed: AtomicU64::new(0),
            no_face_ticks: AtomicU64::new(0),
            degenerate_frames: AtomicU64::new(0),
            frame_read_failures: AtomicU64::new(0),
            audio_chunks: AtomicU64::new(0),
            audio_read_failures: AtomicU64::new(0),
            violations_confirmed: AtomicU64::new(0),
            reports_exported: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a log that loads and saves its counters at `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            debug!("could not load previous audit stats: {e}");
        }

        log
    }

    pub fn record_tick(&self) {
        self.ticks_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_no_face(&self) {
        self.no_face_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_degenerate_frame(&self) {
        self.degenerate_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_read_failure(&self) {
        self.frame_read_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_audio_chunk(&self) {
        self.audio_chunks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_audio_read_failure(&self) {
        self.audio_read_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_violations(&self, count: u64) {
        self.violations_confirmed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_report_exported(&self) {
        self.reports_exported.fetch_add(1, Ordering::Relaxed);
    }

    /// Add another log's counters to this one.
    ///
    /// Used to fold a finished session into the persisted cumulative log.
    pub fn absorb(&self, stats: &TransparencyStats) {
        self.ticks_processed
            .fetch_add(stats.ticks_processed, Ordering::Relaxed);
        self.no_face_ticks
            .fetch_add(stats.no_face_ticks, Ordering::Relaxed);
        self.degenerate_frames
            .fetch_add(stats.degenerate_frames, Ordering::Relaxed);
        self.frame_read_failures
            .fetch_add(stats.frame_read_failures, Ordering::Relaxed);
        self.audio_chunks
            .fetch_add(stats.audio_chunks, Ordering::Relaxed);
        self.audio_read_failures
            .fetch_add(stats.audio_read_failures, Ordering::Relaxed);
        self.violations_confirmed
            .fetch_add(stats.violations_confirmed, Ordering::Relaxed);
        self.reports_exported
            .fetch_add(stats.reports_exported, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> TransparencyStats {
        TransparencyStats {
            ticks_processed: self.ticks_processed.load(Ordering::Relaxed),
            no_face_ticks: self.no_face_ticks.load(Ordering::Relaxed),
            degenerate_frames: self.degenerate_frames.load(Ordering::Relaxed),
            frame_read_failures: self.frame_read_failures.load(Ordering::Relaxed),
            audio_chunks: self.audio_chunks.load(Ordering::Relaxed),
            audio_read_failures: self.audio_read_failures.load(Ordering::Relaxed),
            violations_confirmed: self.violations_confirmed.load(Ordering::Relaxed),
            reports_exported: self.reports_exported.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Monitoring Statistics:\n\
             - Ticks processed: {}\n\
             - Ticks without a face: {}\n\
             - Unusable frames: {}\n\
             - Frame read failures: {}\n\
             - Audio chunks evaluated: {}\n\
             - Audio read failures: {}\n\
             - Violations confirmed: {}\n\
             - Reports exported: {}\n\
             - Log age: {} seconds\n\
             \n\
             Retention:\n\
             - No camera frames or landmarks stored\n\
             - No audio stored",
            stats.ticks_processed,
            stats.no_face_ticks,
            stats.degenerate_frames,
            stats.frame_read_failures,
            stats.audio_chunks,
            stats.audio_read_failures,
            stats.violations_confirmed,
            stats.reports_exported,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                ticks_processed: stats.ticks_processed,
                no_face_ticks: stats.no_face_ticks,
                degenerate_frames: stats.degenerate_frames,
                frame_read_failures: stats.frame_read_failures,
                audio_chunks: stats.audio_chunks,
                audio_read_failures: stats.audio_read_failures,
                violations_confirmed: stats.violations_confirmed,
                reports_exported: stats.reports_exported,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.ticks_processed
                    .store(persisted.ticks_processed, Ordering::Relaxed);
                self.no_face_ticks
                    .store(persisted.no_face_ticks, Ordering::Relaxed);
                self.degenerate_frames
                    .store(persisted.degenerate_frames, Ordering::Relaxed);
                self.frame_read_failures
                    .store(persisted.frame_read_failures, Ordering::Relaxed);
                self.audio_chunks
                    .store(persisted.audio_chunks, Ordering::Relaxed);
                self.audio_read_failures
                    .store(persisted.audio_read_failures, Ordering::Relaxed);
                self.violations_confirmed
                    .store(persisted.violations_confirmed, Ordering::Relaxed);
                self.reports_exported
                    .store(persisted.reports_exported, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        for counter in [
            &self.ticks_processed,
            &self.no_face_ticks,
            &self.degenerate_frames,
            &self.frame_read_failures,
            &self.audio_chunks,
            &self.audio_read_failures,
            &self.violations_confirmed,
            &self.reports_exported,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for TransparencyLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of audit statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransparencyStats {
    pub ticks_processed: u64,
    pub no_face_ticks: u64,
    pub degenerate_frames: u64,
    pub frame_read_failures: u64,
    pub audio_chunks: u64,
    pub audio_read_failures: u64,
    pub violations_confirmed: u64,
    pub reports_exported: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    ticks_processed: u64,
    no_face_ticks: u64,
    degenerate_frames: u64,
    frame_read_failures: u64,
    audio_chunks: u64,
    audio_read_failures: u64,
    violations_confirmed: u64,
    reports_exported: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared audit log.
pub type SharedTransparencyLog = Arc<TransparencyLog>;

pub fn create_shared_log() -> SharedTransparencyLog {
    Arc::new(TransparencyLog::new())
}

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedTransparencyLog {
    Arc::new(TransparencyLog::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_counting() {
        let log = TransparencyLog::new();

        log.record_tick();
        log.record_tick();
        log.record_no_face();
        log.record_audio_chunk();
        log.record_violations(3);

        let stats = log.stats();
        assert_eq!(stats.ticks_processed, 2);
        assert_eq!(stats.no_face_ticks, 1);
        assert_eq!(stats.audio_chunks, 1);
        assert_eq!(stats.violations_confirmed, 3);
        assert_eq!(stats.degenerate_frames, 0);
    }

    #[test]
    fn test_reset() {
        let log = TransparencyLog::new();

        log.record_tick();
        log.record_frame_read_failure();
        log.record_audio_read_failure();
        log.reset();

        let stats = log.stats();
        assert_eq!(stats.ticks_processed, 0);
        assert_eq!(stats.frame_read_failures, 0);
        assert_eq!(stats.audio_read_failures, 0);
    }

    #[test]
    fn test_persistence_round_trip() {
        let path = std::env::temp_dir()
            .join("proctor-sentinel-audit-test")
            .join("audit.json");
        let _ = std::fs::remove_file(&path);

        let log = TransparencyLog::with_persistence(path.clone());
        log.record_tick();
        log.record_degenerate_frame();
        log.record_report_exported();
        log.save().unwrap();

        let reloaded = TransparencyLog::with_persistence(path.clone());
        let stats = reloaded.stats();
        assert_eq!(stats.ticks_processed, 1);
        assert_eq!(stats.degenerate_frames, 1);
        assert_eq!(stats.reports_exported, 1);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_session_counts_stay_separate_from_history() {
        let path = std::env::temp_dir()
            .join("proctor-sentinel-audit-absorb-test")
            .join("audit.json");
        let _ = std::fs::remove_file(&path);

        let history = TransparencyLog::with_persistence(path.clone());
        for _ in 0..500 {
            history.record_tick();
        }
        history.record_violations(7);
        history.save().unwrap();

        let cumulative = TransparencyLog::with_persistence(path.clone());
        let session = TransparencyLog::new();
        for _ in 0..3 {
            session.record_tick();
        }
        session.record_violations(1);

        let session_stats = session.stats();
        assert_eq!(session_stats.ticks_processed, 3);
        assert_eq!(session_stats.violations_confirmed, 1);

        cumulative.absorb(&session_stats);
        let stats = cumulative.stats();
        assert_eq!(stats.ticks_processed, 503);
        assert_eq!(stats.violations_confirmed, 8);
        assert_eq!(session.stats().ticks_processed, 3);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_summary_format() {
        let summary = TransparencyLog::new().summary();

        assert!(summary.contains("Ticks processed"));
        assert!(summary.contains("Ticks without a face"));
        assert!(summary.contains("No audio stored"));
    }
}
