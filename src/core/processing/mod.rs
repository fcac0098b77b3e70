//! Tile-level stages: splitting, per-tile workers, parallel orchestration
//! and mosaicking.
pub mod mosaic;
pub mod orchestrator;
pub mod split;
pub mod worker;

pub use mosaic::{MosaicExtent, MosaicMerger, MosaicSummary};
pub use orchestrator::{CancelToken, TileFailure, TileOrchestrator, TileReport};
pub use split::{SplitOutcome, TileSplitter};
pub use worker::{SmoothingWorker, StatsWorker, TileJob, TileSource};
