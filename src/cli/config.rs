//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::{BatchArgs, ServeArgs, SweepArgs};
use crate::config::{
    parse_format_list, retention_from_hours, BackgroundColor, MattingOptions, ServiceConfig,
};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Settings for one `batch` invocation
#[derive(Debug, Clone)]
pub(crate) struct BatchSettings {
    pub(crate) config: ServiceConfig,
    pub(crate) input_dir: PathBuf,
    pub(crate) output_dir: PathBuf,
    pub(crate) matting: MattingOptions,
    /// Entries of `--formats` that were dropped
    pub(crate) rejected_formats: Vec<String>,
}

/// Convert CLI arguments to `ServiceConfig`
///
/// Precedence: built-in defaults, then `BGREMOVE_*` environment variables,
/// then explicit command-line flags.
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the server configuration from `serve` arguments
    pub(crate) fn from_serve(args: &ServeArgs) -> Result<ServiceConfig> {
        let mut config = ServiceConfig::default().apply_env();

        if let Some(host) = &args.host {
            config.host.clone_from(host);
        }
        if let Some(port) = args.port {
            config.port = port;
        }
        if let Some(workers) = args.workers {
            config.workers = workers;
        }
        if let Some(dir) = &args.temp_dir {
            config.temp_dir.clone_from(dir);
        }
        if let Some(hours) = args.max_age_hours {
            config.retention_max_age = retention_from_hours(hours);
        }
        if let Some(secs) = args.sweep_interval_secs {
            config.sweep_interval = Duration::from_secs(secs);
        }
        if let Some(color) = &args.background_color {
            config.background_color =
                BackgroundColor::parse(color).context("Invalid --background-color")?;
        }
        config.matting = config.matting.with_alpha_matting(args.alpha_matting);

        config.validate().context("Invalid server configuration")?;
        Ok(config)
    }

    /// Build batch settings from `batch` arguments
    pub(crate) fn from_batch(args: &BatchArgs) -> Result<BatchSettings> {
        let (supported_formats, rejected_formats) = parse_format_list(&args.formats);

        let mut config = ServiceConfig::default().apply_env();
        config.workers = args.workers;
        config.jpeg_quality = args.jpeg_quality;
        if let Some(color) = &args.background_color {
            config.background_color =
                BackgroundColor::parse(color).context("Invalid --background-color")?;
        }
        // An empty allow-list is not a configuration error: it just matches nothing.
        if !supported_formats.is_empty() {
            config.supported_formats = supported_formats.clone();
        }
        config.validate().context("Invalid batch configuration")?;
        config.supported_formats = supported_formats;

        Ok(BatchSettings {
            matting: config.matting.with_alpha_matting(args.alpha_matting),
            config,
            input_dir: args.input_dir.clone(),
            output_dir: args.output_dir.clone(),
            rejected_formats,
        })
    }

    /// Resolve the directory and age for a one-shot sweep
    pub(crate) fn from_sweep(args: &SweepArgs) -> (PathBuf, Duration) {
        let config = ServiceConfig::default().apply_env();
        let dir = args.dir.clone().unwrap_or(config.temp_dir);
        let max_age = args
            .max_age_hours
            .map_or(config.retention_max_age, retention_from_hours);
        (dir, max_age)
    }
}
