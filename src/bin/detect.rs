//! CLI entry point: classify an audio file as AI-generated or human speech
//! and print the verdict as JSON.

use clap::Parser;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use voiceproof::{config::DecisionPolicy, Detector, PipelineConfig};

#[derive(Parser, Debug)]
#[command(name = "detect", about = "Audio deepfake detection")]
struct Args {
    /// Audio file to analyze (WAV)
    audio: PathBuf,

    /// Analysis window length in seconds
    #[arg(long)]
    window_secs: Option<f32>,

    /// Advance between windows in seconds
    #[arg(long)]
    stride_secs: Option<f32>,

    /// VAD aggressiveness (0-3)
    #[arg(long)]
    vad_aggressiveness: Option<u8>,

    /// Non-speech frames tolerated inside a speech run
    #[arg(long)]
    vad_max_gap_frames: Option<usize>,

    /// Chunks per classifier batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Decision policy: average or majority
    #[arg(long)]
    policy: Option<DecisionPolicy>,

    /// Comma-separated model identifiers
    #[arg(long, value_delimiter = ',')]
    models: Option<Vec<String>>,

    /// Directory holding one subdirectory per model
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Abort if classification has not started within this many seconds
    #[arg(long)]
    deadline_secs: Option<u64>,
}

fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("voiceproof=info".parse().unwrap()))
        .init();

    if let Err(e) = run() {
        eprintln!("error [{}]: {}", e.kind(), e);
        std::process::exit(1);
    }
}

fn run() -> voiceproof::Result<()> {
    let args = Args::parse();

    let mut config = PipelineConfig::from_env()?;
    if let Some(window) = args.window_secs {
        config.window_secs = window;
    }
    if let Some(stride) = args.stride_secs {
        config.stride_secs = stride;
    }
    if let Some(level) = args.vad_aggressiveness {
        config.vad_aggressiveness = level;
    }
    if let Some(gap) = args.vad_max_gap_frames {
        config.vad_max_gap_frames = gap;
    }
    if let Some(batch) = args.batch_size {
        config.batch_size = batch;
    }
    if let Some(policy) = args.policy {
        config.policy = policy;
    }
    if let Some(models) = args.models {
        config.models = models;
    }
    if let Some(dir) = args.model_dir {
        config.model_dir = dir;
    }

    let deadline = args
        .deadline_secs
        .map(|secs| Instant::now() + Duration::from_secs(secs));

    info!("Analyzing {:?} with {} model(s)", args.audio, config.models.len());
    let mut detector = Detector::from_config(config)?;
    let verdict = detector.infer_with_deadline(&args.audio, deadline)?;

    println!(
        "{}",
        serde_json::to_string_pretty(&verdict).expect("verdict serializes")
    );
    Ok(())
}
