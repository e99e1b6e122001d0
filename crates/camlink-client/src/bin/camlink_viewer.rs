//! # Camlink Viewer
//!
//! Headless stand-in for the ground station's camera tab. Selects a camera
//! over the control plane, streams frames from the vehicle's frame server,
//! and logs what arrives.
//!
//! ## Usage
//!
//! ```bash
//! # Stream from the default endpoint (127.0.0.1:9999)
//! camlink-viewer
//!
//! # Pick a camera and stop after 100 frames
//! camlink-viewer --host 10.0.0.2 --port 9999 --camera "CSI Camera" --frames 100
//!
//! # Load settings from a file
//! camlink-viewer --config camlink.toml
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use camlink_client::control::{select_camera, LogPublisher};
use camlink_client::{ChannelSink, ClientConfig, JpegCodec, StreamingSession};

/// Stream camera frames from a camlink frame server.
#[derive(Parser, Debug)]
#[command(name = "camlink-viewer", about = "Camlink frame streaming client")]
struct Cli {
    /// Frame server host. Overrides the config file.
    #[arg(long)]
    host: Option<String>,

    /// Frame server port. Overrides the config file.
    #[arg(long)]
    port: Option<String>,

    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Camera to select before streaming.
    #[arg(long)]
    camera: Option<String>,

    /// Exit after this many frames.
    #[arg(long)]
    frames: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    // ── Logging ─────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .compact()
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    let host = cli.host.clone().unwrap_or_else(|| config.host.clone());
    let port = cli.port.clone().unwrap_or_else(|| config.port.to_string());

    tracing::info!(%host, %port, camera = ?cli.camera, "camlink-viewer starting");

    // ── Camera selection ────────────────────────────────────────
    if let Some(name) = &cli.camera {
        match select_camera(&config.cameras, &LogPublisher, &config.select_topic, name)? {
            Some(camera) => tracing::info!(
                camera = %camera.name,
                resolution = %camera.resolution,
                fov = camera.fov,
                model = %camera.model,
                "camera selected"
            ),
            None => tracing::warn!(camera = %name, "unknown camera, keeping current selection"),
        }
    }

    // ── Session ─────────────────────────────────────────────────
    let (sink, rx) = ChannelSink::new(config.session.frame_queue);
    let mut session = StreamingSession::new(config, Arc::new(JpegCodec), Arc::new(sink));
    session.start(&host, &port)?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            tracing::info!("shutting down...");
            running.store(false, Ordering::Relaxed);
        })?;
    }

    // ── Main loop ───────────────────────────────────────────────
    let mut frames = 0u64;
    let mut last_stats_log = Instant::now();
    let stats_interval = Duration::from_secs(5);

    'outer: while running.load(Ordering::Relaxed) {
        for connected in rx.drain_connection_changes() {
            tracing::info!(connected, "streaming changed");
            if !connected {
                break 'outer;
            }
        }

        if let Some(frame) = rx.recv_frame_timeout(Duration::from_millis(100)) {
            frames += 1;
            tracing::debug!(
                width = frame.width,
                height = frame.height,
                layout = ?frame.layout,
                "frame"
            );
            if cli.frames.is_some_and(|limit| frames >= limit) {
                break;
            }
        }

        if last_stats_log.elapsed() >= stats_interval {
            let stats = session.stats();
            tracing::info!(
                frames = stats.frames_delivered,
                dropped = stats.frames_dropped,
                evicted = rx.dropped_frames(),
                fragments = stats.fragments,
                bytes = stats.bytes,
                "session stats"
            );
            last_stats_log = Instant::now();
        }
    }

    // ── Cleanup ─────────────────────────────────────────────────
    session.stop();
    tracing::info!(frames, "camlink-viewer stopped");

    Ok(())
}
