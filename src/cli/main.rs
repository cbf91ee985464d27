//! Background Removal CLI Tool
//!
//! `serve` runs the HTTP job API, `batch` processes a directory of images in
//! parallel, `sweep` runs one retention pass and `version` prints build info.

use super::config::{BatchSettings, CliConfigBuilder};
use crate::{
    backends::ColorKeySegmenter,
    batch::{BatchItemOutcome, BatchScheduler, BatchSummary},
    processor::{BackgroundRemovalProcessor, ProcessorConfig},
    retention,
    segmentation::Segmenter,
    services::{BatchProgressReporter, ImageIOService},
};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Background removal service and batch tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "bgremove")]
pub struct Cli {
    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP job API
    #[cfg(feature = "server")]
    Serve(ServeArgs),
    /// Remove backgrounds from every image in a directory
    Batch(BatchArgs),
    /// Delete staged files older than the retention age, once
    Sweep(SweepArgs),
    /// Print version information
    Version,
}

/// Arguments for `bgremove serve`; unset flags fall back to `BGREMOVE_*` variables
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Bind address
    #[arg(long)]
    pub host: Option<String>,

    /// Bind port
    #[arg(long)]
    pub port: Option<u16>,

    /// Number of concurrent segmentation workers
    #[arg(long)]
    pub workers: Option<usize>,

    /// Directory for staged inputs and results
    #[arg(long, value_name = "DIR")]
    pub temp_dir: Option<PathBuf>,

    /// Delete staged files older than this many hours
    #[arg(long)]
    pub max_age_hours: Option<u64>,

    /// Seconds between retention sweeps
    #[arg(long)]
    pub sweep_interval_secs: Option<u64>,

    /// Background colour for JPEG results (name, #RGB or #RRGGBB)
    #[arg(long)]
    pub background_color: Option<String>,

    /// Enable alpha matting for submitted jobs
    #[arg(short = 'a', long)]
    pub alpha_matting: bool,
}

/// Arguments for `bgremove batch`
#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Input directory containing images
    #[arg(short, long, default_value = "input", value_name = "DIR")]
    pub input_dir: PathBuf,

    /// Output directory for processed images
    #[arg(short, long, default_value = "output", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Number of worker threads
    #[arg(short, long, default_value_t = 4)]
    pub workers: usize,

    /// Enable alpha matting for better edges
    #[arg(short, long)]
    pub alpha_matting: bool,

    /// Comma-separated list of input formats
    #[arg(short, long, default_value = "png,jpg,jpeg,webp")]
    pub formats: String,

    /// Process directories recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Only process files whose name matches this glob (e.g. "*.jpg")
    #[arg(long)]
    pub pattern: Option<String>,

    /// JPEG quality for JPEG-named outputs (0-100)
    #[arg(long, default_value_t = 95)]
    pub jpeg_quality: u8,

    /// Background colour for JPEG results (name, #RGB or #RRGGBB)
    #[arg(long)]
    pub background_color: Option<String>,
}

/// Arguments for `bgremove sweep`
#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Directory to sweep (defaults to the service temp directory)
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Delete files older than this many hours
    #[arg(long)]
    pub max_age_hours: Option<u64>,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose).context("Failed to initialize tracing")?;

    match &cli.command {
        #[cfg(feature = "server")]
        Command::Serve(args) => run_serve(args).await,
        Command::Batch(args) => run_batch(args, cli.verbose > 0).await,
        Command::Sweep(args) => run_sweep(args).await,
        Command::Version => {
            print_version();
            Ok(())
        },
    }
}

/// Initialize tracing based on verbosity level and `BGREMOVE_LOG_FORMAT`
fn init_tracing(verbose_count: u8) -> Result<()> {
    use crate::tracing_config::{LogFormat, TracingConfig};

    TracingConfig::new(verbose_count)
        .with_format(LogFormat::from_env())
        .init()
        .context("Failed to initialize tracing subscriber")
}

fn default_segmenter() -> Arc<dyn Segmenter> {
    Arc::new(ColorKeySegmenter::new())
}

#[cfg(feature = "server")]
async fn run_serve(args: &ServeArgs) -> Result<()> {
    let config = CliConfigBuilder::from_serve(args)?;
    crate::server::serve(config, default_segmenter())
        .await
        .context("Server failed")
}

async fn run_batch(args: &BatchArgs, verbose: bool) -> Result<()> {
    let settings = CliConfigBuilder::from_batch(args)?;
    let BatchSettings {
        config,
        input_dir,
        output_dir,
        matting,
        rejected_formats,
    } = settings;

    println!("\nBackground Removal Tool");
    println!("Started at: {}\n", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));

    if !rejected_formats.is_empty() {
        warn!("Unsupported formats ignored: {}", rejected_formats.join(", "));
    }

    ImageIOService::ensure_directories(&[&input_dir, &output_dir])
        .context("Failed to set up input/output directories")?;

    let files = find_image_files(
        &input_dir,
        args.recursive,
        args.pattern.as_deref(),
        &config.supported_formats,
    )
    .with_context(|| format!("Failed to scan input directory: {}", input_dir.display()))?;

    if files.is_empty() {
        println!("No supported images found in {}", input_dir.display());
        return Ok(());
    }

    println!("Found {} images to process", files.len());
    println!("Using {} worker threads\n", config.workers);

    let processor =
        BackgroundRemovalProcessor::new(default_segmenter(), ProcessorConfig::from(&config));
    let scheduler = BatchScheduler::new(processor, config.workers);
    let reporter = ConsoleProgressReporter::new(verbose);

    let summary = scheduler
        .run_batch(&files, &output_dir, matting, &reporter)
        .await
        .context("Batch processing failed")?;

    print_summary(&summary);
    Ok(())
}

async fn run_sweep(args: &SweepArgs) -> Result<()> {
    let (dir, max_age) = CliConfigBuilder::from_sweep(args);

    let sweep_dir = dir.clone();
    let report = tokio::task::spawn_blocking(move || retention::sweep(&sweep_dir, max_age))
        .await
        .context("Sweep task failed")?;

    println!(
        "Swept {}: {} scanned, {} removed, {} failed, {:.2} MB freed",
        dir.display(),
        report.scanned,
        report.removed,
        report.failed,
        report.bytes_freed as f64 / 1_048_576.0
    );
    Ok(())
}

fn print_version() {
    println!("bgremove {}", env!("CARGO_PKG_VERSION"));
    println!("  └─ Segmenter: {}", ColorKeySegmenter::new().name());
    println!(
        "  └─ Features: server={}, webp={}",
        cfg!(feature = "server"),
        cfg!(feature = "webp-support")
    );
}

/// Progress bar plus one ✓/✗ line per finished item
struct ConsoleProgressReporter {
    bar: ProgressBar,
    verbose: bool,
}

impl ConsoleProgressReporter {
    fn new(verbose: bool) -> Self {
        let bar = ProgressBar::hidden();
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} Removing backgrounds... [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        ) {
            bar.set_style(style.progress_chars("#>-"));
        }
        Self { bar, verbose }
    }
}

impl BatchProgressReporter for ConsoleProgressReporter {
    fn batch_started(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
    }

    fn item_finished(&self, outcome: &BatchItemOutcome, _completed: usize, _total: usize) {
        let name = outcome
            .item
            .input
            .file_name()
            .map_or_else(
                || outcome.item.input.display().to_string(),
                |n| n.to_string_lossy().into_owned(),
            );

        if outcome.succeeded {
            self.bar.println(format!("✓ Processed: {name}"));
            if self.verbose {
                debug!(
                    output = %outcome.item.output.display(),
                    elapsed_ms = outcome.elapsed.as_millis() as u64,
                    "Item finished"
                );
            }
        } else {
            let reason = outcome.error.as_deref().unwrap_or("unknown error");
            self.bar.println(format!("✗ Failed: {name} ({reason})"));
        }
        self.bar.inc(1);
    }

    fn batch_finished(&self, summary: &BatchSummary) {
        self.bar.finish_with_message(format!(
            "Completed! Processed: {}, Failed: {}",
            summary.successful, summary.failed
        ));
    }
}

fn print_summary(summary: &BatchSummary) {
    println!("\nProcessing Summary");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("  Processing Time         {:>10.2} seconds", summary.duration.as_secs_f64());
    println!("  Successfully Processed  {:>10}", summary.successful);
    println!("  Failed                  {:>10}", summary.failed);
    println!("  Total Images            {:>10}", summary.total);
    println!("  Success Rate            {:>9.1}%", summary.success_rate());

    if summary.failed > 0 {
        warn!(
            "Some files failed to process. Processed: {}, Failed: {}",
            summary.successful, summary.failed
        );
    }
    info!(
        "Processed {} image(s) in {:.2}s",
        summary.successful,
        summary.duration.as_secs_f64()
    );
}

/// Find image files in a directory, sorted for a deterministic processing order
fn find_image_files(
    dir: &Path,
    recursive: bool,
    pattern: Option<&str>,
    extensions: &BTreeSet<String>,
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    if recursive {
        for entry in walkdir::WalkDir::new(dir) {
            let entry = entry?;
            if entry.file_type().is_file() {
                let path = entry.path();
                if is_image_file(path, extensions) && matches_pattern(path, pattern) {
                    files.push(path.to_path_buf());
                }
            }
        }
    } else {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                let path = entry.path();
                if is_image_file(&path, extensions) && matches_pattern(&path, pattern) {
                    files.push(path);
                }
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Check if file is an image based on extension
fn is_image_file(path: &Path, extensions: &BTreeSet<String>) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.contains(&ext.to_lowercase()))
}

/// Check if file matches the given pattern
fn matches_pattern(path: &Path, pattern: Option<&str>) -> bool {
    match pattern {
        Some(pat) => {
            if let Some(filename) = path.file_name().and_then(|n| n.to_str()) {
                glob::Pattern::new(pat)
                    .map(|p| p.matches(filename))
                    .unwrap_or(false)
            } else {
                false
            }
        },
        None => true,
    }
}
