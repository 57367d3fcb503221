//! Proctor Sentinel CLI
//!
//! Real-time integrity monitor for proctored exams.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use proctor_sentinel::{
    config::Config,
    core::{ChannelSet, MonitorSnapshot, ReportBuilder},
    monitor::Monitor,
    relay::{RelayUpdate, TerminalStatus},
    source::{JsonLinesLandmarkSource, WavAudioSource},
    transparency::{create_shared_log, create_shared_log_with_persistence},
    MONITORING_NOTICE, VERSION,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "proctor-sentinel")]
#[command(version = VERSION)]
#[command(about = "Real-time gaze, head-pose and audio integrity monitor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a monitoring session from recorded landmarks and audio
    Run {
        /// JSON Lines file with one landmark frame (or null) per line
        #[arg(long)]
        landmarks: PathBuf,

        /// 16-bit mono WAV file with the session's microphone audio
        #[arg(long)]
        audio: Option<PathBuf>,

        /// Channels to monitor (eye, head, angle, audio, or all)
        #[arg(long)]
        channels: Option<String>,

        /// Calibration warm-up in seconds
        #[arg(long)]
        warmup: Option<f64>,

        /// Replay landmarks at this frame rate (0 replays as fast as possible)
        #[arg(long)]
        fps: Option<f64>,
    },

    /// Show configuration and cumulative monitoring statistics
    Status,

    /// Show configuration
    Config,

    /// Display the monitoring notice shown to candidates
    Notice,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            landmarks,
            audio,
            channels,
            warmup,
            fps,
        } => cmd_run(
            &landmarks,
            audio.as_deref(),
            channels.as_deref(),
            warmup,
            fps,
        ),
        Commands::Status => {
            cmd_status();
            Ok(())
        }
        Commands::Config => {
            cmd_config();
            Ok(())
        }
        Commands::Notice => {
            cmd_notice();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("proctor_sentinel=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_run(
    landmarks: &Path,
    audio: Option<&Path>,
    channels: Option<&str>,
    warmup: Option<f64>,
    fps: Option<f64>,
) -> anyhow::Result<()> {
    println!("Proctor Sentinel v{VERSION}");
    println!();

    let mut config = Config::load().context("Could not load configuration")?;
    if let Some(channels) = channels {
        config.detector.channels = ChannelSet::from_csv(channels);
    }
    if !config.detector.channels.any_enabled() {
        bail!("At least one channel must be enabled (eye, head, angle or audio)");
    }
    if let Some(secs) = warmup {
        config.detector.warmup =
            Duration::try_from_secs_f64(secs).context("Invalid --warmup value")?;
    }
    if let Some(fps) = fps {
        config.camera_fps = fps;
    }
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    let enabled = config.detector.channels;
    println!("Starting monitoring...");
    for (label, on) in [
        ("Eye gaze", enabled.eye_gaze),
        ("Head position", enabled.head_position),
        ("Head angle", enabled.head_angle),
        ("Audio", enabled.audio),
    ] {
        println!("  {label}: {}", if on { "enabled" } else { "disabled" });
    }
    println!(
        "  Calibration warm-up: {:.1}s",
        config.detector.warmup.as_secs_f64()
    );
    println!("  Dwell frames: {}", config.detector.dwell_frames);

    // The report carries this session's counts; the persisted log keeps history.
    let audit = create_shared_log();

    let landmark_source = JsonLinesLandmarkSource::open(landmarks)
        .with_context(|| format!("Could not open landmarks {}", landmarks.display()))?
        .with_frame_rate(config.camera_fps);
    let mut monitor =
        Monitor::new(config.clone(), audit.clone()).with_landmarks(Box::new(landmark_source));

    if let Some(path) = audio {
        let wav = WavAudioSource::open(path, config.audio.chunk_size)
            .with_context(|| format!("Could not open audio {}", path.display()))?;
        if wav.sample_rate() != config.audio.sample_rate {
            warn!(
                expected = config.audio.sample_rate,
                actual = wav.sample_rate(),
                "audio sample rate differs from configuration"
            );
        }
        monitor = monitor.with_audio(Box::new(wav));
    } else if enabled.audio {
        eprintln!("Warning: Audio channel enabled but no --audio file given");
    }

    let builder = ReportBuilder::new();
    println!("Session ID: {}", builder.session_id());
    println!();
    println!("Look at the screen normally while calibration runs.");
    println!("Press Ctrl+C to stop");
    println!();

    ctrlc_handler(monitor.stop_flag())?;
    let mut reader = monitor.start()?;

    let mut last_print = Instant::now();
    let status = loop {
        match reader.wait(Duration::from_millis(250)) {
            Some(RelayUpdate::Terminated(status)) => break status,
            Some(RelayUpdate::Snapshot(snapshot)) => {
                if last_print.elapsed() >= Duration::from_secs(1) {
                    print_snapshot(&snapshot);
                    last_print = Instant::now();
                }
            }
            None => {}
        }
    };

    println!();
    println!("Monitoring ended: {status}");

    let summary = monitor
        .wait()
        .context("Monitor thread ended without a session summary")?;

    let path = builder
        .write(&config.export_path, &summary, Some(audit.stats()))
        .context("Could not write integrity report")?;
    audit.record_report_exported();

    let cumulative =
        create_shared_log_with_persistence(config.data_path.join("transparency.json"));
    cumulative.absorb(&audit.stats());
    if let Err(e) = cumulative.save() {
        eprintln!("Warning: Could not save monitoring statistics: {e}");
    }

    let report = summary.report;
    println!();
    println!("Session Report");
    println!("==============");
    println!("  Calibrated: {}", report.calibrated);
    println!("  Eye violations: {}", report.eye_violations);
    println!("  Head violations: {}", report.head_violations);
    println!("  Audio violations: {}", report.audio_violations);
    println!("  Ticks: {}", summary.ticks);
    println!();
    println!("Report written to {path:?}");

    println!();
    println!("{}", audit.summary());

    if let TerminalStatus::DeviceFailure(e) = status {
        eprintln!("Warning: monitoring was interrupted by a device failure: {e}");
    }
    Ok(())
}

fn print_snapshot(snapshot: &MonitorSnapshot) {
    if !snapshot.calibrated {
        println!(
            "[calibrating {:.1}s] face: {}",
            snapshot.calibration_elapsed_secs,
            if snapshot.face_detected { "yes" } else { "no" }
        );
        return;
    }

    let gaze = snapshot
        .gaze_offset
        .map(|g| format!("({:+.3}, {:+.3})", g.dx, g.dy))
        .unwrap_or_else(|| "-".to_string());
    let head = match (snapshot.head_displacement_px, snapshot.head_angle_deg) {
        (Some(px), Some(deg)) => format!("{px:.0}px {deg:+.1}°"),
        _ => "-".to_string(),
    };
    println!(
        "[tick {}] gaze {gaze} | head {head} | audio {:.0} ({:?}) | eye {} head {} audio {}",
        snapshot.tick,
        snapshot.audio_rms,
        snapshot.loudness.band,
        snapshot.eye_violations,
        snapshot.head_violations,
        snapshot.audio_violations
    );
}

fn cmd_status() {
    let config = Config::load().unwrap_or_default();

    println!("Proctor Sentinel Status");
    println!("=======================");
    println!();

    let channels = config.detector.channels;
    let tolerances = config.detector.tolerances;
    println!("Configuration:");
    println!(
        "  Channels: eye {} | head position {} | head angle {} | audio {}",
        on_off(channels.eye_gaze),
        on_off(channels.head_position),
        on_off(channels.head_angle),
        on_off(channels.audio)
    );
    println!(
        "  Gaze tolerance: {} horizontal, {} vertical",
        tolerances.horizontal, tolerances.vertical
    );
    println!("  Head tolerance: {}px, {}°", tolerances.head_px, tolerances.head_angle_deg);
    println!("  Audio threshold: {} RMS", tolerances.audio_rms);
    println!("  Dwell frames: {}", config.detector.dwell_frames);
    println!(
        "  Calibration warm-up: {:.1}s",
        config.detector.warmup.as_secs_f64()
    );
    println!();

    let stats_path = config.data_path.join("transparency.json");
    if stats_path.exists() {
        if let Ok(content) = std::fs::read_to_string(&stats_path) {
            if let Ok(stats) = serde_json::from_str::<serde_json::Value>(&content) {
                println!("Cumulative Statistics:");
                for (key, label) in [
                    ("ticks_processed", "Ticks processed"),
                    ("no_face_ticks", "Ticks without a face"),
                    ("degenerate_frames", "Unusable frames"),
                    ("audio_chunks", "Audio chunks"),
                    ("violations_confirmed", "Violations confirmed"),
                    ("reports_exported", "Reports exported"),
                ] {
                    if let Some(value) = stats.get(key) {
                        println!("  {label}: {value}");
                    }
                }
            }
        }
    } else {
        println!("No previous session data found.");
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

fn cmd_config() {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

fn cmd_notice() {
    println!("{MONITORING_NOTICE}");
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl+C handler")
}
