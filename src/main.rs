use anyhow::{Context, Result};
use clap::Parser;
use lampsync::analysis::AudioAnalysis;
use lampsync::config::EngineConfig;
use lampsync::effects::LightingMode;
use lampsync::host::EffectHost;
use lampsync::sacn_output::StripLampArray;
use lampsync::service::ReplayService;
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "lampsync")]
#[command(about = "Drive sACN pixel strips in time with a track's audio analysis")]
struct Args {
    /// Audio analysis JSON (sections, bars, segments)
    #[arg(long)]
    analysis: PathBuf,

    #[arg(long, value_enum, default_value = "pinwheel")]
    mode: LightingMode,

    /// Engine config; defaults to the user config location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Cover art shown by the album-artwork mode
    #[arg(long)]
    artwork: Option<PathBuf>,

    /// Stop after this many seconds; runs for the length of the track if unset
    #[arg(long)]
    seconds: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = EngineConfig::load_or_default(args.config.as_deref())?;
    let analysis = AudioAnalysis::load(&args.analysis)?;
    info!(
        "[HOST] Loaded {:?}: {} sections, {} bars, {} segments, {:.1}s",
        args.analysis,
        analysis.sections.len(),
        analysis.bars.len(),
        analysis.segments.len(),
        analysis.duration()
    );

    let run_for = Duration::from_secs(
        args.seconds.unwrap_or_else(|| analysis.duration().ceil().max(1.0) as u64),
    );

    let track_id = args
        .analysis
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "track".to_string());
    let mut service = ReplayService::new(track_id, analysis);
    if let Some(path) = &args.artwork {
        let (url, image) = load_artwork(path)?;
        service = service.with_artwork(url, image);
    }

    let device = StripLampArray::new("sacn", &config)?;
    let mut host = EffectHost::new(Arc::new(service), config);
    host.add_device(Box::new(device));
    host.set_mode(args.mode);

    info!("[HOST] Running {} for {:?}", args.mode, run_for);
    thread::sleep(run_for);

    host.shutdown();
    info!("[HOST] Done");
    Ok(())
}

/// Decode cover art from disk and name it by its file URL.
fn load_artwork(path: &Path) -> Result<(String, image::RgbImage)> {
    let absolute = path
        .canonicalize()
        .with_context(|| format!("Failed to find artwork at {:?}", path))?;
    let url = url::Url::from_file_path(&absolute)
        .map_err(|_| anyhow::anyhow!("Artwork path {:?} is not absolute", absolute))?;
    let image = image::open(&absolute)
        .with_context(|| format!("Failed to decode artwork at {:?}", absolute))?
        .to_rgb8();
    info!("[HOST] Artwork {} ({}x{})", url, image.width(), image.height());
    Ok((url.to_string(), image))
}
