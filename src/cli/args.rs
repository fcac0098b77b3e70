use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use tiletrend::{Analysis, Statistic};

#[derive(Parser)]
#[command(name = "tiletrend", version, about = "Tiled per-pixel trend and change-point analysis")]
pub struct CliArgs {
    /// Enable debug logging (otherwise RUST_LOG, default info)
    #[arg(long, global = true, default_value_t = false)]
    pub log: bool,

    /// JSON configuration file; command-line flags override its values
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Worker pool size (default: all available cores)
    #[arg(long, global = true)]
    pub workers: Option<usize>,

    /// Write the batch report(s) as JSON to this file
    #[arg(long, global = true)]
    pub report: Option<PathBuf>,

    /// Stop dispatching new tiles after the first failed tile
    #[arg(long, global = true, default_value_t = false)]
    pub fail_fast: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Cut a raster into tile_<row>_<col>.tif files
    Split {
        /// Input raster
        #[arg(short, long)]
        input: PathBuf,

        /// Directory for the tiles (created if missing)
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Tile edge length in pixels
        #[arg(long)]
        tile_size: Option<usize>,
    },

    /// Mann-Kendall / Sen's slope statistics for every tile
    Trend {
        #[command(flatten)]
        dirs: TileDirs,

        /// Statistics to write (default: mk-z, sen-slope)
        #[arg(long, value_enum, value_delimiter = ',')]
        statistics: Vec<Statistic>,

        /// Minimum valid samples per pixel
        #[arg(long)]
        min_samples: Option<usize>,
    },

    /// Pettitt change-point test for every tile
    ChangePoint {
        #[command(flatten)]
        dirs: TileDirs,

        /// Statistics to write (default: pettitt)
        #[arg(long, value_enum, value_delimiter = ',')]
        statistics: Vec<Statistic>,

        /// Significance threshold for reporting a change point
        #[arg(long)]
        significance: Option<f64>,

        /// Minimum valid samples per pixel
        #[arg(long)]
        min_samples: Option<usize>,
    },

    /// Z-score outlier replacement and Savitzky-Golay smoothing of every tile
    Smooth {
        #[command(flatten)]
        dirs: TileDirs,

        #[arg(long)]
        zscore_threshold: Option<f64>,

        /// Odd smoothing window length
        #[arg(long)]
        window_length: Option<usize>,

        #[arg(long)]
        polyorder: Option<usize>,
    },

    /// Merge result tiles of one statistic into a single raster
    Merge {
        /// Directory holding the tiles
        #[arg(long)]
        input_dir: PathBuf,

        /// Output raster
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Split, analyze and merge in one go
    Run {
        /// Input raster
        #[arg(short, long)]
        input: PathBuf,

        /// Working directory for tiles, result tiles and mosaics
        #[arg(long)]
        work_dir: PathBuf,

        #[arg(long, value_enum, default_value_t = Analysis::Trend)]
        analysis: Analysis,

        /// Statistics to write (default depends on the analysis)
        #[arg(long, value_enum, value_delimiter = ',')]
        statistics: Vec<Statistic>,

        /// Smooth tiles before the analysis
        #[arg(long, default_value_t = false)]
        smooth: bool,

        /// Tile edge length in pixels
        #[arg(long)]
        tile_size: Option<usize>,
    },
}

#[derive(Args)]
pub struct TileDirs {
    /// Directory of input tiles
    #[arg(long)]
    pub input_dir: PathBuf,

    /// Output root (created if missing)
    #[arg(long)]
    pub output_dir: PathBuf,
}
