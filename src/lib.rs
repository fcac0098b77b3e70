#![doc = r#"
tiletrend: tiled, parallel per-pixel time-series statistics for raster stacks.

This crate turns a large multi-temporal raster (one band per time step) into
per-pixel trend and change-point rasters. The raster is cut into fixed-size
GeoTIFF tiles, every tile is analysed on a bounded thread pool, and each
statistic's result tiles are merged back into one mosaic with the original
georeferencing.

Per pixel it computes the Mann-Kendall trend test with Sen's slope (plus p-value,
Kendall's tau and Sen's intercept on request) and the Pettitt change-point test.
An optional smoothing stage (z-score outlier replacement and Savitzky-Golay)
runs through the same tile machinery.

Requirements
------------
- GDAL development headers and runtime available on your system.
- Rust 2024 edition toolchain.

Quick start: whole pipeline
---------------------------
```rust,no_run
use std::path::Path;
use tiletrend::{Analysis, PipelineConfig, RunOptions, run_pipeline};

fn main() -> tiletrend::Result<()> {
    let config = PipelineConfig {
        tile_size: 512,
        ..Default::default()
    };
    let summary = run_pipeline(
        Path::new("/data/ndvi_stack.tif"),
        Path::new("/work/ndvi"),
        &RunOptions::new(Analysis::Trend),
        &config,
    )?;
    for (stat, mosaic) in &summary.mosaics {
        println!("{stat}: {:?} ({}x{})", mosaic.output, mosaic.width, mosaic.height);
    }
    Ok(())
}
```

Stage by stage
--------------
```rust,no_run
use std::path::Path;
use tiletrend::{
    Analysis, PipelineConfig, Statistic, analyze_tiles, merge_tiles_to_path,
    split_raster_to_tiles,
};

fn main() -> tiletrend::Result<()> {
    let config = PipelineConfig::default();
    split_raster_to_tiles(Path::new("/data/stack.tif"), Path::new("/work/tiles"), &config)?;

    let report = analyze_tiles(
        Path::new("/work/tiles"),
        Path::new("/work/out"),
        Analysis::ChangePoint,
        vec![Statistic::Pettitt, Statistic::PettittP],
        &config,
    )?;
    println!("succeeded={} failed={}", report.succeeded.len(), report.failed.len());

    merge_tiles_to_path(Path::new("/work/out/pettitt"), Path::new("/work/pettitt.tif"))?;
    Ok(())
}
```

Per-pixel statistics without I/O
--------------------------------
```rust
use tiletrend::core::stats::{sens_slope, trend_test};

let r = trend_test(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
assert!(r.z > 0.0);
assert_eq!(sens_slope(&[1.0, 2.0, 3.0, 4.0, 5.0]), Some(1.0));
```

Error handling
--------------
All public functions return `tiletrend::Result<T>`. Configuration problems
(zero tile size, missing input directory) surface before any tile is
dispatched; per-tile read/write failures are recorded in the `TileReport`
instead of aborting the batch.

```rust,no_run
use std::path::Path;
use tiletrend::{Analysis, Error, PipelineConfig, analyze_tiles};

fn main() {
    match analyze_tiles(
        Path::new("/missing"),
        Path::new("/out"),
        Analysis::Trend,
        vec![],
        &PipelineConfig::default(),
    ) {
        Ok(report) => println!("{} failed tiles", report.failed.len()),
        Err(Error::InputNotFound { path }) => eprintln!("no such directory: {path:?}"),
        Err(other) => eprintln!("error: {other}"),
    }
}
```

Useful modules
--------------
- [`api`]: high-level entry points.
- [`core::stats`](crate::core::stats): Mann-Kendall, Sen's slope, Pettitt and smoothing.
- [`core::processing`](crate::core::processing): splitter, workers, orchestrator and mosaic merger.
- [`io`]: GDAL reader, tile naming and GeoTIFF writers.
- [`error`]: crate-level `Error` and `Result`.
"#]

// Core modules (public)
pub mod api;
pub mod core;
pub mod error;
pub mod io;
pub mod types;

// Curated public API surface
// Types
pub use crate::core::params::{PipelineConfig, SmoothingParams};
pub use crate::core::window::{GeoTransform, RasterWindow, TileGrid};
pub use error::{Error, FailureKind, Result};
pub use types::{Analysis, RasterDataType, Statistic, TileId};

// Readers
pub use io::gdal::{BandStack, GdalError, GdalRasterReader, RasterMetadata};

// Stages
pub use crate::core::processing::{
    CancelToken, MosaicExtent, MosaicMerger, MosaicSummary, SmoothingWorker, SplitOutcome,
    StatsWorker, TileFailure, TileJob, TileOrchestrator, TileReport, TileSource, TileSplitter,
};

// High-level API re-exports
pub use api::{
    PipelineSummary, RunOptions, analyze_tiles, merge_tiles_to_path, run_pipeline, smooth_tiles,
    split_raster_to_tiles, write_report_json,
};
