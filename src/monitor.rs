//! The processing thread.
//!
//! A [`Monitor`] owns the landmark and audio sources until it is started,
//! then hands them to a dedicated thread that runs one [`ProctorSession`]
//! tick after tick. Every device read happens on that thread. Consumers see
//! only what comes through the relay, and the session summary once the
//! thread has been joined.

use crate::config::Config;
use crate::core::audio::{compute_rms, AudioSample};
use crate::core::error::TickError;
use crate::core::report::SessionSummary;
use crate::core::session::{FaceOutcome, ProctorSession};
use crate::relay::{relay, RelayPublisher, RelayReader, TerminalStatus};
use crate::source::{AudioSource, LandmarkSource, SourceError};
use crate::transparency::SharedTransparencyLog;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Runs a monitoring session on a background thread.
pub struct Monitor {
    config: Config,
    landmarks: Option<Box<dyn LandmarkSource>>,
    audio: Option<Box<dyn AudioSource>>,
    log: SharedTransparencyLog,
    running: Arc<AtomicBool>,
    started: bool,
    thread_handle: Option<JoinHandle<SessionSummary>>,
}

impl Monitor {
    pub fn new(config: Config, log: SharedTransparencyLog) -> Self {
        Self {
            config,
            landmarks: None,
            audio: None,
            log,
            running: Arc::new(AtomicBool::new(false)),
            started: false,
            thread_handle: None,
        }
    }

    /// Attach the camera landmark source.
    pub fn with_landmarks(mut self, source: Box<dyn LandmarkSource>) -> Self {
        self.landmarks = Some(source);
        self
    }

    /// Attach the microphone source.
    pub fn with_audio(mut self, source: Box<dyn AudioSource>) -> Self {
        self.audio = Some(source);
        self
    }

    /// Move the sources onto the processing thread and start ticking.
    ///
    /// Returns an error if:
    /// - The monitor was already started (sources are single-use)
    /// - No source was attached
    /// - The thread could not be spawned
    pub fn start(&mut self) -> Result<RelayReader, MonitorError> {
        if self.started {
            return Err(MonitorError::AlreadyStarted);
        }
        if self.landmarks.is_none() && self.audio.is_none() {
            return Err(MonitorError::NoSources);
        }

        let channels = self.config.detector.channels;
        if channels.needs_camera() && self.landmarks.is_none() {
            warn!("camera channels enabled but no landmark source attached");
        }
        if channels.audio && self.audio.is_none() {
            warn!("audio channel enabled but no audio source attached");
        }

        let (publisher, reader) = relay();
        let landmarks = self.landmarks.take();
        let audio = self.audio.take();
        let config = self.config.clone();
        let log = self.log.clone();
        let running = self.running.clone();

        self.running.store(true, Ordering::SeqCst);
        let handle = thread::Builder::new()
            .name("proctor-monitor".to_string())
            .spawn(move || {
                let summary = run_loop(landmarks, audio, &config, &log, &running, &publisher);
                running.store(false, Ordering::SeqCst);
                summary
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                MonitorError::SpawnFailed(e.to_string())
            })?;

        self.started = true;
        self.thread_handle = Some(handle);
        Ok(reader)
    }

    /// Request a cooperative stop and wait for the thread to finish.
    ///
    /// Returns the session summary, or `None` if the monitor never ran.
    pub fn stop(&mut self) -> Option<SessionSummary> {
        self.running.store(false, Ordering::SeqCst);
        self.join()
    }

    /// Wait for the thread to finish on its own (end of stream or device
    /// failure) without requesting a stop.
    pub fn wait(&mut self) -> Option<SessionSummary> {
        self.join()
    }

    /// Check if the processing thread is still ticking.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Flag that stops the loop when cleared. Usable from a signal handler.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    fn join(&mut self) -> Option<SessionSummary> {
        let handle = self.thread_handle.take()?;
        match handle.join() {
            Ok(summary) => Some(summary),
            Err(_) => {
                error!("monitor thread panicked");
                None
            }
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(
    mut landmarks: Option<Box<dyn LandmarkSource>>,
    mut audio: Option<Box<dyn AudioSource>>,
    config: &Config,
    log: &SharedTransparencyLog,
    running: &AtomicBool,
    publisher: &RelayPublisher,
) -> SessionSummary {
    let mut session = ProctorSession::new(
        &config.detector,
        config.audio.meter_ceiling,
        Instant::now(),
    );
    info!(
        warmup_secs = config.detector.warmup.as_secs_f64(),
        dwell_frames = config.detector.dwell_frames,
        camera = landmarks.is_some(),
        microphone = audio.is_some(),
        "monitoring started"
    );

    let termination = loop {
        if !running.load(Ordering::SeqCst) {
            break TerminalStatus::Stopped;
        }

        session.begin_tick(Instant::now());
        log.record_tick();

        if let Some(source) = landmarks.as_mut() {
            if let Err(status) = face_tick(source.as_mut(), &mut session, log) {
                break status;
            }
        }
        if let Some(source) = audio.as_mut() {
            if let Err(status) = audio_tick(source.as_mut(), &mut session, log) {
                break status;
            }
        }

        publisher.publish(session.snapshot());
    };

    // Release devices before anyone can observe the terminal status.
    drop(landmarks);
    drop(audio);

    match termination {
        TerminalStatus::DeviceFailure(ref e) => error!("monitoring ended: device failure: {e}"),
        ref status => info!(ticks = session.tick(), "monitoring ended: {status}"),
    }

    let summary = session.summary(termination.clone());
    publisher.terminate(termination);
    summary
}

fn face_tick(
    source: &mut dyn LandmarkSource,
    session: &mut ProctorSession,
    log: &SharedTransparencyLog,
) -> Result<(), TerminalStatus> {
    let frame = match source.next_frame() {
        Ok(frame) => frame,
        Err(SourceError::Transient(e)) => {
            warn!("skipping tick {}: frame read failed: {e}", session.tick());
            log.record_frame_read_failure();
            return Ok(());
        }
        Err(SourceError::DeviceFailure(e)) => return Err(TerminalStatus::DeviceFailure(e)),
        Err(SourceError::EndOfStream) => return Err(TerminalStatus::EndOfStream),
    };

    match session.process_face(frame.as_ref()) {
        Ok(FaceOutcome::Evaluated(confirmed)) => {
            log.record_violations(confirmed.channels().len() as u64);
        }
        Ok(_) => {}
        Err(TickError::NoFaceDetected) => {
            debug!(tick = session.tick(), "no face detected");
            log.record_no_face();
        }
        Err(e) => {
            debug!(tick = session.tick(), "skipping frame: {e}");
            log.record_degenerate_frame();
        }
    }
    Ok(())
}

fn audio_tick(
    source: &mut dyn AudioSource,
    session: &mut ProctorSession,
    log: &SharedTransparencyLog,
) -> Result<(), TerminalStatus> {
    let sample = match source.read_chunk() {
        Ok(chunk) => compute_rms(&chunk),
        Err(SourceError::Transient(e)) => {
            let e = TickError::AudioReadTransient(e);
            warn!("tick {}: {e}, counting as silence", session.tick());
            log.record_audio_read_failure();
            AudioSample::SILENT
        }
        Err(SourceError::DeviceFailure(e)) => return Err(TerminalStatus::DeviceFailure(e)),
        Err(SourceError::EndOfStream) => return Err(TerminalStatus::EndOfStream),
    };

    log.record_audio_chunk();
    let confirmed = session.process_audio(sample);
    log.record_violations(confirmed.channels().len() as u64);
    Ok(())
}

/// Errors raised when starting a monitor.
#[derive(Debug)]
pub enum MonitorError {
    AlreadyStarted,
    NoSources,
    SpawnFailed(String),
}

impl std::fmt::Display for MonitorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorError::AlreadyStarted => write!(f, "Monitor has already been started"),
            MonitorError::NoSources => write!(f, "No landmark or audio source attached"),
            MonitorError::SpawnFailed(e) => write!(f, "Failed to spawn monitor thread: {e}"),
        }
    }
}

impl std::error::Error for MonitorError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SilentAudioSource;
    use crate::transparency::create_shared_log;

    #[test]
    fn test_monitor_creation() {
        let monitor = Monitor::new(Config::default(), create_shared_log());
        assert!(!monitor.is_running());
    }

    #[test]
    fn test_start_requires_a_source() {
        let mut monitor = Monitor::new(Config::default(), create_shared_log());
        assert!(matches!(monitor.start(), Err(MonitorError::NoSources)));
        assert!(monitor.stop().is_none());
    }

    #[test]
    fn test_start_twice_rejected() {
        let mut monitor = Monitor::new(Config::default(), create_shared_log())
            .with_audio(Box::new(SilentAudioSource::new(64)));
        let _reader = monitor.start().unwrap();
        assert!(matches!(monitor.start(), Err(MonitorError::AlreadyStarted)));

        let summary = monitor.stop().unwrap();
        assert_eq!(summary.termination, TerminalStatus::Stopped);
        assert_eq!(summary.report.audio_violations, 0);
    }
}
