//! Core building blocks: run configuration, raster windows and the tile grid,
//! per-pixel statistics, and the tile processing stages. These are consumed
//! by the high-level `api` module.
pub mod params;
pub mod processing;
pub mod stats;
pub mod window;
