// Main entry point for the tiled OCR and translation workflow

use webtoon_ocr::{
    core::{Config, ConfigOverrides},
    orchestration::Pipeline,
    services::{default_output_path, HttpOcrEngine, HttpTranslator},
    utils::Metrics,
};

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Extract, deduplicate and translate text from a long webtoon page
#[derive(Parser, Debug)]
#[command(name = "webtoon-ocr", version, about, long_about = None)]
struct Args {
    /// Input image (.jpg, .jpeg, .png, .bmp, .tiff)
    #[arg(short, long)]
    input: PathBuf,

    /// Output JSON path [default: <input dir>/<input stem>_results.json]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Tile edge length in pixels
    #[arg(long)]
    tile_size: Option<u32>,

    /// Overlap between neighbouring tiles in pixels
    #[arg(long)]
    overlap: Option<u32>,

    #[arg(long)]
    source_lang: Option<String>,

    #[arg(long)]
    target_lang: Option<String>,

    /// Add clamped tiles so trailing strips are also recognized
    #[arg(long)]
    cover_trailing_edges: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration, then apply CLI overrides
    let mut config = Config::load_env().context("Failed to load configuration")?;
    config
        .apply_overrides(&args.overrides())
        .context("Invalid parameters")?;
    let config = Arc::new(config);

    // Initialize logging
    let filter = EnvFilter::new(format!(
        "webtoon_ocr={}",
        config.log_level().as_str().to_lowercase()
    ));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("=== WEBTOON OCR ===");
    info!(
        "Config: tile={} overlap={} iou={} {}→{} batch={} retries={}",
        config.tile_size(),
        config.overlap(),
        config.iou_threshold(),
        config.source_lang(),
        config.target_lang(),
        config.translation.batch_size,
        config.translation.max_retries
    );

    let metrics = Metrics::new();
    let ocr_engine = Arc::new(HttpOcrEngine::new(&config.ocr).context("Failed to build OCR client")?);
    let translator =
        Arc::new(HttpTranslator::new(&config.translation).context("Failed to build translation client")?);
    let pipeline = Pipeline::new(config.clone(), ocr_engine, translator, metrics.clone())?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.input));

    let summary = match pipeline.run(&args.input, &output).await {
        Ok(summary) => summary,
        Err(e) => {
            error!("Run failed: {}", e);
            return Err(e.into());
        }
    };

    info!("{}", "=".repeat(70));
    info!("Results: {}", summary.output.display());
    info!(
        "Tiles: {} | Regions: {} raw, {} unique | Words: {} | Untranslated: {}",
        summary.tiles, summary.raw_regions, summary.unique_regions, summary.words, summary.fallbacks
    );
    match serde_json::to_string(&metrics.snapshot()) {
        Ok(json) => info!("Metrics: {}", json),
        Err(e) => error!("Failed to serialize metrics: {}", e),
    }
    info!("{}", "=".repeat(70));

    Ok(())
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            tile_size: self.tile_size,
            overlap: self.overlap,
            cover_trailing_edges: self.cover_trailing_edges,
            source_lang: self.source_lang.clone(),
            target_lang: self.target_lang.clone(),
            verbose: self.verbose,
        }
    }
}
