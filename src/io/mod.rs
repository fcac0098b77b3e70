//! I/O layer for GDAL-backed rasters.
//! Provides the `gdal` reader, tile file `naming`, and `writers` for
//! GeoTIFF outputs and metadata embedding.
pub mod gdal;
pub use self::gdal::{BandStack, GdalError, GdalRasterReader, RasterMetadata};

pub mod naming;

pub mod writers;
