use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use snooper_core::{FaceDetector, FaceEncoder};
use snooper_hw::Camera;
use snooper_store::{CaptureDb, DedupStore, WhitelistStore};

mod config;
mod enroll;
mod pipeline;
mod watcher;

use config::Config;
use pipeline::Pipeline;
use watcher::WatchStats;

#[derive(Parser)]
#[command(
    name = "snooper",
    about = "Watch a camera, ignore whitelisted faces, capture each unknown face once"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the camera until it closes or ctrl-c
    Run {
        /// V4L2 device path (overrides SNOOPER_CAMERA_DEVICE)
        #[arg(short, long)]
        device: Option<String>,
    },
    /// List captured unknown faces
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Run { device } => run(config, device).await,
        Commands::List => list(&config),
    }
}

async fn run(config: Config, device_override: Option<String>) -> Result<()> {
    let device = device_override.unwrap_or_else(|| config.camera_device.clone());

    let mut detector = FaceDetector::load(&config.detector_model_path())
        .context("failed to load face detector")?;
    let mut encoder = FaceEncoder::load(&config.encoder_model_path())
        .context("failed to load face encoder")?;

    // Whitelist load failure is fatal: a partial whitelist would capture
    // known people as unknowns.
    let identities =
        enroll::load_whitelist(&config.whitelist_dir, &mut detector, &mut encoder)
            .context("whitelist load failed")?;
    tracing::info!(identities = identities.len(), "whitelist loaded");
    let whitelist = WhitelistStore::new(identities, config.metric, config.whitelist_threshold);

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("failed to create data dir {}", config.data_dir.display()))?;
    let db = CaptureDb::open(&config.db_path()).context("failed to open capture database")?;
    let dedup = DedupStore::open(db, config.captures_dir(), config.metric, config.dedup_threshold)
        .context("failed to open dedup store")?;

    let mut pipeline = Pipeline::new(whitelist, dedup);
    let camera = Camera::open(&device)?;

    let stop = Arc::new(AtomicBool::new(false));
    let (done_tx, mut done_rx) = tokio::sync::oneshot::channel::<Result<WatchStats>>();

    let stop_flag = stop.clone();
    std::thread::Builder::new()
        .name("snooper-watcher".into())
        .spawn(move || {
            let result = camera.stream().map_err(anyhow::Error::from).map(|mut stream| {
                watcher::run(
                    &mut stream,
                    &mut detector,
                    &mut encoder,
                    &mut pipeline,
                    &stop_flag,
                )
            });
            let _ = done_tx.send(result);
        })
        .context("failed to spawn watcher thread")?;

    tracing::info!(device, "watching");

    let result = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("stop signal received");
            stop.store(true, Ordering::Relaxed);
            (&mut done_rx).await
        }
        result = &mut done_rx => result,
    };

    match result {
        Ok(stats) => report(stats?),
        Err(_) => bail!("watcher thread exited without a result"),
    }

    Ok(())
}

fn report(stats: WatchStats) {
    tracing::info!(
        frames = stats.frames,
        dark_frames = stats.dark_frames,
        capture_failures = stats.capture_failures,
        faces = stats.faces,
        encode_failures = stats.encode_failures,
        whitelisted = stats.whitelisted,
        duplicates = stats.duplicates,
        new_records = stats.new_records,
        "watch finished"
    );
}

fn list(config: &Config) -> Result<()> {
    let db = CaptureDb::open(&config.db_path()).context("failed to open capture database")?;
    let records = db.load_all()?;

    if records.is_empty() {
        println!("no captured faces");
        return Ok(());
    }

    for record in records {
        println!(
            "{:>6}  {}  {}",
            record.id,
            record.created_at.to_rfc3339(),
            record.image_path.display()
        );
    }
    Ok(())
}
