//! VinoScan - wine list scanner
//!
//! Feeds recorded frames through the scan pipeline at camera pace and prints
//! the wines it recognized.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use vinoscan::capture::{CameraAuthorization, CameraEvent, CapturedFrame};
use vinoscan::config::{self, AppConfig};
use vinoscan::matching::{HttpWineSearch, Matcher};
use vinoscan::session::{run_scan_loop, RecognizedWine, SessionPipeline};
use vinoscan::shared::SessionEvent;
use vinoscan::storage;
use vinoscan::vision::{
    CandidateGrouper, OcrBackend, RemoteOcr, ReplayRecognizer, TextRecognizer, VisionPipeline,
};

/// VinoScan - match wine list entries against a wine catalog
#[derive(Parser, Debug)]
#[command(name = "vinoscan")]
#[command(about = "Scan wine lists and look up critic scores")]
struct Args {
    /// Wine catalog (JSON array of wine records)
    #[arg(long)]
    catalog: PathBuf,

    /// Recorded OCR frames to replay (JSON array of fragment arrays)
    #[arg(long)]
    frames: Option<PathBuf>,

    /// Directory of frame images for the remote recognizer
    #[arg(long)]
    images: Option<PathBuf>,

    /// Configuration file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Remote recognizer endpoint
    #[arg(long)]
    ocr_url: Option<String>,

    /// Remote wine search base URL
    #[arg(long)]
    search_url: Option<String>,

    /// Minimum milliseconds between processing passes
    #[arg(long)]
    frame_interval_ms: Option<u64>,

    /// Save the session when the scan ends
    #[arg(long)]
    save: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "vinoscan=debug" } else { "vinoscan=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("VinoScan starting...");

    let mut config = load_or_create_config(args.config.as_deref())?;
    apply_overrides(&mut config, &args);

    let index = storage::load_catalog(&args.catalog)?
        .with_phonetic_shortlist(config.matching.use_phonetic_shortlist);
    if index.is_empty() {
        warn!("Catalog {:?} has no wines; nothing can match", args.catalog);
    }

    let mut matcher = Matcher::new(Arc::new(index), config.matching.clone());
    if let Some(base_url) = &config.remote.base_url {
        info!("Remote wine search enabled at {}", base_url);
        matcher = matcher.with_remote(Arc::new(HttpWineSearch::new(base_url, config.remote.clone())?));
    }

    let (recognizer, frames) = build_recognizer(&config, &args)?;
    let vision = VisionPipeline::new(recognizer, config.ocr.clone());
    let grouper = CandidateGrouper::new(config.grouping.clone(), config.admission.clone());

    let mut pipeline = SessionPipeline::new(vision, grouper, matcher, config.pipeline.clone());
    let events = pipeline.subscribe();
    let reporter = std::thread::spawn(move || {
        for event in events.iter() {
            report_event(&event);
        }
    });

    pipeline.start(CameraAuthorization::Authorized)?;

    let (tx, rx) = mpsc::channel(config.pipeline.camera_queue_depth.max(1));
    let shutdown = CancellationToken::new();
    // Replay a little slower than the throttle so recorded frames are not dropped
    let pace = config.pipeline.frame_interval().mul_f64(1.25);
    tokio::spawn(feed_frames(frames, tx, pace));
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, stopping scan");
                shutdown.cancel();
            }
        });
    }

    let pipeline = run_scan_loop(pipeline, rx, shutdown).await;
    let runtime = pipeline.runtime_state();
    let session = pipeline.into_session();
    let _ = reporter.join();

    info!(
        "Scan finished: {} frames received, {} passes completed, {} cancelled, {} throttled",
        runtime.frames_received,
        runtime.passes_completed,
        runtime.passes_cancelled,
        runtime.frames_throttled
    );
    print_matches(&session.wines);

    if args.save {
        let path = storage::save_session(&session, &storage::get_sessions_dir()?)?;
        println!("Session saved to {}", path.display());
    }

    Ok(())
}

/// Load configuration from file or create default
fn load_or_create_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        let config = config::load_config(path)?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }

    if let Ok(config_dir) = storage::get_config_dir() {
        let config_path = config_dir.join("config.toml");
        if config_path.exists() {
            match config::load_config(&config_path) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", config_path);
                    return Ok(config);
                }
                Err(e) => warn!("Ignoring configuration {:?}: {:#}", config_path, e),
            }
        } else if let Err(e) = config::save_config(&AppConfig::default(), &config_path) {
            warn!("Could not write default configuration: {:#}", e);
        }
    }

    info!("Using default configuration");
    Ok(AppConfig::default())
}

fn apply_overrides(config: &mut AppConfig, args: &Args) {
    if let Some(ms) = args.frame_interval_ms {
        config.pipeline.frame_interval_ms = ms;
    }
    if let Some(url) = &args.search_url {
        config.remote.base_url = Some(url.clone());
    }
    if let Some(url) = &args.ocr_url {
        config.ocr.remote_url = Some(url.clone());
    }
    if args.images.is_some() {
        config.ocr.backend = OcrBackend::Remote;
    }
}

/// Pick the recognizer backend and the frames it will be fed
fn build_recognizer(
    config: &AppConfig,
    args: &Args,
) -> Result<(Arc<dyn TextRecognizer>, Vec<CapturedFrame>)> {
    match config.ocr.backend {
        OcrBackend::Replay => {
            let path = args
                .frames
                .as_ref()
                .context("--frames is required with the replay recognizer")?;
            let recognizer = ReplayRecognizer::from_file(path)?;
            let frames = (0..recognizer.frame_count() as u64)
                .map(CapturedFrame::placeholder)
                .collect();
            Ok((Arc::new(recognizer), frames))
        }
        OcrBackend::Remote => {
            let endpoint = config
                .ocr
                .remote_url
                .clone()
                .context("The remote recognizer needs an endpoint (--ocr-url)")?;
            let dir = args
                .images
                .as_ref()
                .context("--images is required with the remote recognizer")?;
            let recognizer = RemoteOcr::new(
                endpoint,
                config.remote.connect_timeout(),
                config.remote.request_timeout(),
            )?;
            Ok((Arc::new(recognizer), load_image_frames(dir)?))
        }
    }
}

/// Encoded images in file name order, one frame each
fn load_image_frames(dir: &Path) -> Result<Vec<CapturedFrame>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read image directory {:?}", dir))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    paths.sort();

    paths
        .iter()
        .enumerate()
        .map(|(seq, path)| {
            let data = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
            Ok(CapturedFrame::new(seq as u64, data, 0, 0))
        })
        .collect()
}

/// Push frames at camera pace, then close the feed
async fn feed_frames(frames: Vec<CapturedFrame>, tx: mpsc::Sender<CameraEvent>, pace: Duration) {
    let mut ticker = tokio::time::interval(pace.max(Duration::from_millis(1)));
    for frame in frames {
        ticker.tick().await;
        if tx.send(CameraEvent::Frame(frame)).await.is_err() {
            return;
        }
    }
    let _ = tx.send(CameraEvent::Closed).await;
}

fn report_event(event: &SessionEvent) {
    match event {
        SessionEvent::MatchesAdded { wines, total } => {
            for wine in wines {
                if let Some(record) = &wine.matched_wine {
                    println!("+ {} [{}]", record.display_name(), record.score);
                }
            }
            info!("{} wines in session", total);
        }
        SessionEvent::FrameProcessed { unresolved, .. } if !unresolved.is_empty() => {
            for wine in unresolved {
                info!("No match for {:?}", wine.original_text);
            }
        }
        SessionEvent::OcrDegraded => warn!("Recognition degraded to fast mode"),
        SessionEvent::RecognizerFaulted => warn!("Recognition keeps failing"),
        SessionEvent::CameraFailed(reason) => warn!("Camera failed: {}", reason),
        _ => {}
    }
}

fn print_matches(wines: &[RecognizedWine]) {
    if wines.is_empty() {
        println!("No wines recognized");
        return;
    }

    let mut sorted: Vec<&RecognizedWine> = wines.iter().collect();
    sorted.sort_by_key(|w| std::cmp::Reverse(w.matched_wine.as_ref().map(|r| r.score)));

    println!(
        "{:<48} {:>5} {:>6} {:<12} {}",
        "Wine", "Score", "Conf", "Match", "Read as"
    );
    for wine in sorted {
        if let Some(record) = &wine.matched_wine {
            let match_type = wine
                .match_type
                .map(|t| format!("{:?}", t))
                .unwrap_or_default();
            println!(
                "{:<48} {:>5} {:>6.2} {:<12} {}",
                record.display_name(),
                record.score,
                wine.match_confidence,
                match_type,
                wine.original_text
            );
        }
    }
}
