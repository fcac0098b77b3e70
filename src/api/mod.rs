//! High-level entry points for embedding tiletrend in other tools.
//!
//! Each function wires one stage (or the whole pipeline) from a
//! [`PipelineConfig`]; nothing here keeps process-wide state, so independent
//! runs can share a process.
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::core::params::PipelineConfig;
use crate::core::processing::{
    MosaicMerger, MosaicSummary, SmoothingWorker, SplitOutcome, StatsWorker, TileOrchestrator,
    TileReport, TileSplitter,
};
use crate::error::{Error, Result};
use crate::types::{Analysis, Statistic};

/// Split `input` into `tile_<row>_<col>.tif` files of `config.tile_size` pixels
pub fn split_raster_to_tiles(
    input: &Path,
    output_dir: &Path,
    config: &PipelineConfig,
) -> Result<SplitOutcome> {
    config.validate()?;
    TileSplitter::new(config.tile_size)?.split(input, output_dir)
}

/// Run trend or change-point statistics over every tile of `input_dir`.
/// Outputs land in `<output_dir>/<statistic>/`; an empty `statistics`
/// selects the analysis defaults.
pub fn analyze_tiles(
    input_dir: &Path,
    output_dir: &Path,
    analysis: Analysis,
    statistics: Vec<Statistic>,
    config: &PipelineConfig,
) -> Result<TileReport> {
    if !input_dir.is_dir() {
        return Err(Error::InputNotFound {
            path: input_dir.to_path_buf(),
        });
    }
    let worker = StatsWorker::new(analysis, statistics, output_dir, config.clone())?;
    TileOrchestrator::new(config)?.run(&worker, input_dir)
}

/// Denoise every tile of `input_dir` into `output_dir`, keeping file names
pub fn smooth_tiles(
    input_dir: &Path,
    output_dir: &Path,
    config: &PipelineConfig,
) -> Result<TileReport> {
    if !input_dir.is_dir() {
        return Err(Error::InputNotFound {
            path: input_dir.to_path_buf(),
        });
    }
    let worker = SmoothingWorker::new(output_dir, config.clone())?;
    TileOrchestrator::new(config)?.run(&worker, input_dir)
}

/// Merge every tile in `input_dir` into one raster at `output`
pub fn merge_tiles_to_path(input_dir: &Path, output: &Path) -> Result<MosaicSummary> {
    MosaicMerger::new().merge(input_dir, output)
}

/// Write a batch report as pretty JSON
pub fn write_report_json(report: &TileReport, path: &Path) -> Result<()> {
    report.write_json(path)
}

/// What `run_pipeline` computes
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub analysis: Analysis,
    pub statistics: Vec<Statistic>,
    /// Denoise tiles before the statistics stage
    pub smooth: bool,
}

impl RunOptions {
    pub fn new(analysis: Analysis) -> Self {
        Self {
            analysis,
            statistics: Vec::new(),
            smooth: false,
        }
    }
}

/// Everything produced by `run_pipeline`
#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub split: SplitOutcome,
    pub smoothing: Option<TileReport>,
    pub analysis: TileReport,
    pub mosaics: Vec<(Statistic, MosaicSummary)>,
}

impl PipelineSummary {
    pub fn reports(&self) -> impl Iterator<Item = &TileReport> {
        self.smoothing.iter().chain(std::iter::once(&self.analysis))
    }
}

fn ensure_progress(report: &TileReport, config: &PipelineConfig) -> Result<()> {
    if report.succeeded.is_empty() && report.total() > 0 {
        return Err(Error::Processing(format!(
            "'{}' failed on every tile ({} failed)",
            report.job,
            report.failed.len()
        )));
    }
    if !config.continue_on_error && !report.is_complete_success() {
        return Err(Error::Processing(format!(
            "'{}' stopped after {} failed tile(s)",
            report.job,
            report.failed.len()
        )));
    }
    Ok(())
}

/// Split, optionally smooth, analyze, and merge each statistic to
/// `<work_dir>/<statistic>.tif`.
///
/// Layout under `work_dir`: `tiles/`, `smoothed/` (when enabled), and one
/// directory per statistic holding its result tiles.
pub fn run_pipeline(
    input: &Path,
    work_dir: &Path,
    options: &RunOptions,
    config: &PipelineConfig,
) -> Result<PipelineSummary> {
    config.validate()?;
    std::fs::create_dir_all(work_dir)?;

    let tiles_dir = work_dir.join("tiles");
    info!("Stage 1: split {:?} -> {:?}", input, tiles_dir);
    let split = split_raster_to_tiles(input, &tiles_dir, config)?;

    let mut analysis_input: PathBuf = tiles_dir;
    let smoothing = if options.smooth {
        let smoothed_dir = work_dir.join("smoothed");
        info!("Stage 2: smooth {:?} -> {:?}", analysis_input, smoothed_dir);
        let report = smooth_tiles(&analysis_input, &smoothed_dir, config)?;
        ensure_progress(&report, config)?;
        analysis_input = smoothed_dir;
        Some(report)
    } else {
        None
    };

    info!("Stage 3: {} analysis on {:?}", options.analysis, analysis_input);
    let worker = StatsWorker::new(
        options.analysis,
        options.statistics.clone(),
        work_dir,
        config.clone(),
    )?;
    let report = TileOrchestrator::new(config)?.run(&worker, &analysis_input)?;
    ensure_progress(&report, config)?;
    if !report.failed.is_empty() {
        warn!(
            "{} tile(s) failed; their area is nodata in the mosaics",
            report.failed.len()
        );
    }

    // Mosaics keep the input grid even when edge tiles are missing
    let merger = MosaicMerger::new().with_extent(split.extent());
    let mut mosaics = Vec::with_capacity(worker.statistics().len());
    for &stat in worker.statistics() {
        let output = work_dir.join(format!("{}.tif", stat.dir_name()));
        info!("Stage 4: merge {} -> {:?}", stat, output);
        let summary = merger.merge(&worker.statistic_dir(stat), &output)?;
        mosaics.push((stat, summary));
    }

    Ok(PipelineSummary {
        split,
        smoothing,
        analysis: report,
        mosaics,
    })
}
