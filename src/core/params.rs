use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default nodata sentinel when a tile declares none
pub const DEFAULT_NODATA: f64 = -9999.0;
/// Default tile edge length in pixels
pub const DEFAULT_TILE_SIZE: usize = 1000;

/// Parameters of the z-score + Savitzky-Golay smoothing stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingParams {
    /// Samples with |z| above this are replaced by the mean of the rest
    pub zscore_threshold: f64,
    /// Savitzky-Golay window (odd)
    pub window_length: usize,
    /// Savitzky-Golay polynomial order (< window_length)
    pub polyorder: usize,
}

impl Default for SmoothingParams {
    fn default() -> Self {
        Self {
            zscore_threshold: 2.0,
            window_length: 15,
            polyorder: 2,
        }
    }
}

/// Pipeline configuration suitable for config files and CLI overrides.
/// Passed explicitly into every component; nothing is read from process-wide state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Tile edge length in pixels, applied to both axes
    pub tile_size: usize,
    /// Sentinel used when a tile declares no nodata value
    pub default_nodata: f64,
    /// Minimum valid samples for Mann-Kendall / Sen's slope
    pub trend_min_samples: usize,
    /// Minimum valid samples for the Pettitt test
    pub change_point_min_samples: usize,
    /// Pettitt significance threshold
    pub significance: f64,
    /// Worker pool size; None means all available cores
    pub workers: Option<usize>,
    /// Keep processing sibling tiles after a failure
    pub continue_on_error: bool,
    /// Fan the per-pixel loop out across threads inside a tile
    pub parallel_pixels: bool,
    pub smoothing: SmoothingParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            default_nodata: DEFAULT_NODATA,
            trend_min_samples: 2,
            change_point_min_samples: 5,
            significance: 0.05,
            workers: None,
            continue_on_error: true,
            parallel_pixels: true,
            smoothing: SmoothingParams::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config file; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::InputNotFound {
                path: path.to_path_buf(),
            });
        }
        let json = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&json)?;
        Ok(config)
    }

    /// Number of worker threads the orchestrator will use
    pub fn resolved_workers(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Reject configurations that cannot run, before any work is dispatched
    pub fn validate(&self) -> Result<()> {
        if self.tile_size == 0 {
            return Err(Error::ZeroSize {
                size: self.tile_size,
            });
        }
        if self.trend_min_samples < 2 {
            return Err(Error::InvalidArgument {
                arg: "trend_min_samples",
                value: self.trend_min_samples.to_string(),
            });
        }
        if self.change_point_min_samples < 2 {
            return Err(Error::InvalidArgument {
                arg: "change_point_min_samples",
                value: self.change_point_min_samples.to_string(),
            });
        }
        if self.significance.is_nan() || self.significance <= 0.0 || self.significance >= 1.0 {
            return Err(Error::InvalidArgument {
                arg: "significance",
                value: self.significance.to_string(),
            });
        }
        if self.workers == Some(0) {
            return Err(Error::ZeroSize { size: 0 });
        }
        let sg = &self.smoothing;
        if sg.window_length == 0 || sg.window_length % 2 == 0 {
            return Err(Error::InvalidArgument {
                arg: "window_length",
                value: sg.window_length.to_string(),
            });
        }
        if sg.polyorder >= sg.window_length {
            return Err(Error::InvalidArgument {
                arg: "polyorder",
                value: sg.polyorder.to_string(),
            });
        }
        if sg.zscore_threshold.is_nan() || sg.zscore_threshold <= 0.0 {
            return Err(Error::InvalidArgument {
                arg: "zscore_threshold",
                value: sg.zscore_threshold.to_string(),
            });
        }
        Ok(())
    }
}
