use std::path::PathBuf;
use std::process;
use std::time::{Duration, Instant};

use clap::Parser;

use faceveil_core::detection::domain::face_detector::FaceDetector;
use faceveil_core::detection::infrastructure::model_resolver::{FaceModel, ModelStore};
use faceveil_core::detection::infrastructure::onnx_face_detector::{
    ExecutionTarget, OnnxFaceDetector,
};
use faceveil_core::detection::infrastructure::replay_face_detector::ReplayFaceDetector;
use faceveil_core::effects::domain::region_effect::AnonymizationMode;
use faceveil_core::pipeline::frame_scheduler::{FrameScheduler, TickOutcome};
use faceveil_core::pipeline::pipeline_logger::LogPipelineLogger;
use faceveil_core::shared::config::AnonymizerConfig;
use faceveil_core::video::domain::frame_sink::{FrameSink, NullFrameSink};
use faceveil_core::video::infrastructure::image_file_sink::ImageFileSink;
use faceveil_core::video::infrastructure::image_sequence_source::ImageSequenceSource;

/// Host refresh rate the tick loop emulates.
const TICK_INTERVAL: Duration = Duration::from_micros(16_667);

/// Real-time face anonymization over a stream of image frames.
#[derive(Parser)]
#[command(name = "faceveil", version)]
struct Cli {
    /// Input images or directories of images, played in order.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// JSON config file (camelCase keys). Defaults to the user config file
    /// when present. Flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Anonymization effect: blur, pixelate or black-box.
    #[arg(long)]
    mode: Option<AnonymizationMode>,

    /// Effect strength (blur radius x2, or pixel block size).
    #[arg(long)]
    intensity: Option<u32>,

    /// Minimum detection confidence (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// Target frames per second.
    #[arg(long)]
    fps: Option<u32>,

    /// Label drawn on black boxes.
    #[arg(long)]
    label: Option<String>,

    /// TrueType/OpenType font for black-box labels. The built-in bitmap
    /// font is used when omitted.
    #[arg(long)]
    label_font: Option<PathBuf>,

    /// ONNX face model; downloaded to the cache when omitted.
    #[arg(long, conflicts_with = "replay")]
    model: Option<PathBuf>,

    /// Replay recorded detections (JSON: frame index -> faces) instead of
    /// running a model.
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Run the model on the CPU only.
    #[arg(long)]
    cpu: bool,

    /// Directory for anonymized snapshots.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write every Nth frame to --output (0 = only the last frame).
    #[arg(long, default_value = "1")]
    every: usize,

    /// Snapshot image format.
    #[arg(long, default_value = "png", value_parser = ["png", "jpg"])]
    format: String,

    /// Loop the inputs until --duration-secs elapses.
    #[arg(long = "loop")]
    looping: bool,

    /// Stop after this many seconds.
    #[arg(long)]
    duration_secs: Option<f64>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;
    let config = build_config(&cli)?;

    let source = ImageSequenceSource::from_inputs(&cli.inputs, cli.looping)?;
    log::info!("Loaded {} input frames", source.len());
    let detector = build_detector(&cli, &config)?;
    let sink: Box<dyn FrameSink> = match &cli.output {
        Some(dir) => Box::new(ImageFileSink::new(dir, cli.every)?.with_extension(&cli.format)),
        None => Box::new(NullFrameSink),
    };

    let mut scheduler = FrameScheduler::new(config, detector, sink)?
        .with_logger(Box::new(LogPipelineLogger::default()));
    scheduler.on_stats(|stats| {
        log::info!(
            "{:.1} fps, {} frames, {} dropped, {:.1}ms avg",
            stats.current_fps,
            stats.frame_count,
            stats.dropped_frames,
            stats.average_processing_time_ms
        );
    });

    let deadline = cli.duration_secs.map(Duration::from_secs_f64);

    scheduler.start(Box::new(source));
    let origin = Instant::now();
    loop {
        let elapsed = origin.elapsed();
        if deadline.is_some_and(|d| elapsed >= d) {
            log::info!("Duration reached");
            break;
        }
        let outcome = scheduler.on_tick(elapsed.as_secs_f64() * 1000.0);
        if outcome == TickOutcome::Exhausted {
            break;
        }
        std::thread::sleep(TICK_INTERVAL.saturating_sub(origin.elapsed() - elapsed));
    }

    let stats = scheduler.stats();
    scheduler.stop();
    eprintln!(
        "Anonymized {} frames ({} dropped) in {:.1}s",
        stats.frame_count,
        stats.dropped_frames,
        origin.elapsed().as_secs_f64()
    );
    if let Some(dir) = &cli.output {
        log::info!("Snapshots written to {}", dir.display());
    }
    Ok(())
}

/// File config first, then command-line overrides.
fn build_config(cli: &Cli) -> Result<AnonymizerConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => AnonymizerConfig::from_json_file(path)?,
        None => match AnonymizerConfig::default_path().filter(|p| p.exists()) {
            Some(path) => {
                log::info!("Using config {}", path.display());
                AnonymizerConfig::from_json_file(&path)?
            }
            None => AnonymizerConfig::default(),
        },
    };
    if let Some(mode) = cli.mode {
        config.anonymization_mode = mode;
    }
    if let Some(intensity) = cli.intensity {
        config.intensity = intensity;
    }
    if let Some(confidence) = cli.confidence {
        config.detection_confidence_threshold = confidence;
    }
    if let Some(fps) = cli.fps {
        config.target_fps = fps;
    }
    if let Some(label) = &cli.label {
        config.label = label.clone();
    }
    if let Some(font) = &cli.label_font {
        config.label_font = Some(font.clone());
    }
    config.validate()?;
    Ok(config)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    for input in &cli.inputs {
        if !input.exists() {
            return Err(format!("Input not found: {}", input.display()).into());
        }
    }
    let files = [&cli.model, &cli.replay, &cli.label_font];
    for path in files.into_iter().flatten() {
        if !path.exists() {
            return Err(format!("File not found: {}", path.display()).into());
        }
    }
    if let Some(secs) = cli.duration_secs {
        if !(secs.is_finite() && secs > 0.0) {
            return Err(format!("Duration must be a positive number, got {secs}").into());
        }
    }
    if cli.looping && cli.duration_secs.is_none() {
        log::warn!("--loop without --duration-secs runs until the process is killed");
    }
    Ok(())
}

fn build_detector(
    cli: &Cli,
    config: &AnonymizerConfig,
) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    if let Some(path) = &cli.replay {
        log::info!("Replaying detections from {}", path.display());
        return Ok(Box::new(ReplayFaceDetector::from_json_file(path)));
    }
    let model_path = match &cli.model {
        Some(path) => path.clone(),
        None => resolve_model()?,
    };
    let target = if cli.cpu {
        ExecutionTarget::Cpu
    } else {
        ExecutionTarget::Accelerated
    };
    Ok(Box::new(
        OnnxFaceDetector::new(&model_path)
            .with_min_score(config.detection_confidence_threshold)
            .with_execution_target(target),
    ))
}

fn resolve_model() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let model = FaceModel::default();
    log::info!("Resolving model: {}", model.file_name);
    let mut store = ModelStore::user()?;
    let bundled = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("models")))
        .filter(|dir| dir.is_dir());
    if let Some(dir) = bundled {
        store = store.with_bundled_dir(dir);
    }
    Ok(store.fetch(&model, Some(Box::new(download_progress)))?)
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = downloaded as f64 / total as f64 * 100.0;
        eprint!("\rDownloading model: {pct:.0}%");
        if downloaded >= total {
            eprintln!();
        }
    } else {
        eprint!("\rDownloading model: {} KB", downloaded / 1024);
    }
}
