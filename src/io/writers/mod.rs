//! GeoTIFF output: typed creation, atomic temp-then-rename commits, and
//! embedded tile metadata.
pub mod metadata;
pub mod tiff;

pub use tiff::{PendingRaster, RasterSpec, create_geotiff, write_block};
