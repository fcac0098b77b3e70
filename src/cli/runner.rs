use std::path::Path;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tiletrend::{
    Analysis, PipelineConfig, RunOptions, TileReport, analyze_tiles,
    merge_tiles_to_path, run_pipeline, smooth_tiles, split_raster_to_tiles, write_report_json,
};

use super::args::{CliArgs, Command};
use super::errors::AppError;

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// File config (or defaults) with global flag overrides applied
fn load_config(args: &CliArgs) -> Result<PipelineConfig, AppError> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            PipelineConfig::from_json_file(path)?
        }
        None => PipelineConfig::default(),
    };
    if let Some(workers) = args.workers {
        if workers == 0 {
            return Err(AppError::ZeroWorkers { workers });
        }
        config.workers = Some(workers);
    }
    if args.fail_fast {
        config.continue_on_error = false;
    }
    Ok(config)
}

fn log_tally(report: &TileReport) {
    info!("'{}' complete!", report.job);
    info!("Succeeded: {}", report.succeeded.len());
    info!("Failed: {}", report.failed.len());
    info!("Cancelled: {}", report.cancelled.len());
    info!("Skipped: {}", report.skipped.len());
    for failure in &report.failed {
        warn!(
            "Tile {} ({:?}) failed: {}",
            failure.tile, failure.path, failure.message
        );
    }
}

fn check_report_path(path: Option<&Path>) -> Result<(), AppError> {
    match path {
        Some(p) if p.is_dir() => Err(AppError::ReportIsDirectory {
            path: p.to_path_buf(),
        }),
        _ => Ok(()),
    }
}

fn finish_stage(report: &TileReport, report_path: Option<&Path>) -> Result<(), AppError> {
    log_tally(report);
    if let Some(path) = report_path {
        write_report_json(report, path)?;
        info!("Report written to {:?}", path);
    }
    Ok(())
}

pub fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(args.log);
    let mut config = load_config(&args)?;
    let report_path = args.report.clone();
    check_report_path(report_path.as_deref())?;

    match args.command {
        Command::Split {
            input,
            output_dir,
            tile_size,
        } => {
            if let Some(size) = tile_size {
                config.tile_size = size;
            }
            let outcome = split_raster_to_tiles(&input, &output_dir, &config)?;
            info!(
                "Split complete: {}x{} grid, {} tiles in {:?}",
                outcome.tiles_y,
                outcome.tiles_x,
                outcome.tiles.len(),
                output_dir
            );
        }
        Command::Trend {
            dirs,
            statistics,
            min_samples,
        } => {
            if let Some(n) = min_samples {
                config.trend_min_samples = n;
            }
            info!("Trend analysis: {:?} -> {:?}", dirs.input_dir, dirs.output_dir);
            let report = analyze_tiles(
                &dirs.input_dir,
                &dirs.output_dir,
                Analysis::Trend,
                statistics,
                &config,
            )?;
            finish_stage(&report, report_path.as_deref())?;
        }
        Command::ChangePoint {
            dirs,
            statistics,
            significance,
            min_samples,
        } => {
            if let Some(p) = significance {
                config.significance = p;
            }
            if let Some(n) = min_samples {
                config.change_point_min_samples = n;
            }
            info!(
                "Change-point analysis: {:?} -> {:?}",
                dirs.input_dir, dirs.output_dir
            );
            let report = analyze_tiles(
                &dirs.input_dir,
                &dirs.output_dir,
                Analysis::ChangePoint,
                statistics,
                &config,
            )?;
            finish_stage(&report, report_path.as_deref())?;
        }
        Command::Smooth {
            dirs,
            zscore_threshold,
            window_length,
            polyorder,
        } => {
            if let Some(t) = zscore_threshold {
                config.smoothing.zscore_threshold = t;
            }
            if let Some(w) = window_length {
                config.smoothing.window_length = w;
            }
            if let Some(p) = polyorder {
                config.smoothing.polyorder = p;
            }
            info!("Smoothing: {:?} -> {:?}", dirs.input_dir, dirs.output_dir);
            let report = smooth_tiles(&dirs.input_dir, &dirs.output_dir, &config)?;
            finish_stage(&report, report_path.as_deref())?;
        }
        Command::Merge { input_dir, output } => {
            let summary = merge_tiles_to_path(&input_dir, &output)?;
            info!(
                "Merged {} tiles into {:?} ({}x{})",
                summary.tiles, summary.output, summary.width, summary.height
            );
        }
        Command::Run {
            input,
            work_dir,
            analysis,
            statistics,
            smooth,
            tile_size,
        } => {
            if let Some(size) = tile_size {
                config.tile_size = size;
            }
            let options = RunOptions {
                analysis,
                statistics,
                smooth,
            };
            let summary = run_pipeline(&input, &work_dir, &options, &config)?;
            for report in summary.reports() {
                log_tally(report);
            }
            for (stat, mosaic) in &summary.mosaics {
                info!("{} -> {:?}", stat, mosaic.output);
            }
            if let Some(path) = report_path.as_deref() {
                let reports: Vec<&TileReport> = summary.reports().collect();
                std::fs::write(path, serde_json::to_string_pretty(&reports)?)?;
                info!("Report written to {:?}", path);
            }
        }
    }
    Ok(())
}
