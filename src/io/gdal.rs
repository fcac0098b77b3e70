use gdal::raster::GdalType;
use gdal::{Dataset, Metadata, errors::GdalError as GdalCrateError};
use ndarray::{Array2, Array3, s};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::core::stats::Nodata;
use crate::core::window::{GeoTransform, RasterWindow};
use crate::types::RasterDataType;

/// Errors encountered when using the GDAL reader
#[derive(Debug, Error)]
pub enum GdalError {
    #[error("GDAL error: {0}")]
    Gdal(#[from] GdalCrateError),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Dimension mismatch: expected {0}x{1}, got {2}x{3}")]
    DimensionMismatch(usize, usize, usize, usize),
    #[error("Window {0} outside raster of {1}x{2}")]
    WindowOutOfBounds(String, usize, usize),
}

/// Metadata extracted from a GDAL-supported raster
#[derive(Debug, Clone)]
pub struct RasterMetadata {
    /// Width (pixels) of the raster
    pub size_x: usize,
    /// Height (lines) of the raster
    pub size_y: usize,
    /// Number of raster bands
    pub bands: usize,
    pub geotransform: GeoTransform,
    /// Projection in WKT, stored verbatim
    pub projection: String,
    /// Nodata declared on band 1
    pub nodata: Option<f64>,
    /// Pixel type of band 1
    pub data_type: RasterDataType,
    /// Default-domain metadata key-value pairs
    pub metadata: HashMap<String, String>,
}

/// Time-ordered band stack of one tile, shaped `(bands, rows, cols)`.
/// Never mutated after load.
#[derive(Debug, Clone)]
pub struct BandStack {
    pub data: Array3<f64>,
    pub nodata: Nodata,
    /// Whether `nodata` came from the file rather than the configured default
    pub nodata_declared: bool,
    pub geotransform: GeoTransform,
    pub projection: String,
}

impl BandStack {
    pub fn bands(&self) -> usize {
        self.data.dim().0
    }

    /// `(rows, cols)` of one band
    pub fn shape(&self) -> (usize, usize) {
        let (_, rows, cols) = self.data.dim();
        (rows, cols)
    }
}

/// Reader for GDAL-supported rasters (GeoTIFF tiles in practice)
pub struct GdalRasterReader {
    pub dataset: Dataset,
    pub metadata: RasterMetadata,
    pub path: PathBuf,
}

impl GdalRasterReader {
    /// Open a raster and collect its metadata
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GdalError> {
        let dataset = Dataset::open(path.as_ref())?;
        let (size_x, size_y) = dataset.raster_size();
        let bands = dataset.raster_count() as usize;
        if bands == 0 {
            return Err(GdalError::UnsupportedFormat("No raster bands found".into()));
        }
        if size_x == 0 || size_y == 0 {
            return Err(GdalError::DimensionMismatch(1, 1, size_x, size_y));
        }
        let geotransform = match dataset.geo_transform() {
            Ok(gt) => gt,
            Err(_) => [0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        };
        let (nodata, data_type) = {
            let first = dataset.rasterband(1)?;
            (first.no_data_value(), RasterDataType::from(first.band_type()))
        };

        let mut metadata_map = HashMap::new();
        if let Some(entries) = dataset.metadata_domain("") {
            for entry in entries {
                if let Some((key, val)) = entry.split_once('=') {
                    metadata_map.insert(key.to_string(), val.to_string());
                }
            }
        }
        let projection = dataset.projection();

        Ok(GdalRasterReader {
            dataset,
            metadata: RasterMetadata {
                size_x,
                size_y,
                bands,
                geotransform: GeoTransform::from_gdal(geotransform),
                projection,
                nodata,
                data_type,
                metadata: metadata_map,
            },
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Full-extent window of this raster
    pub fn full_window(&self) -> RasterWindow {
        RasterWindow {
            x_offset: 0,
            y_offset: 0,
            width: self.metadata.size_x,
            height: self.metadata.size_y,
            transform: self.metadata.geotransform,
        }
    }

    /// Read one band (1-based) over `window` in its native type, row-major
    pub fn read_window<T: GdalType + Copy>(
        &self,
        index: usize,
        window: &RasterWindow,
    ) -> Result<Vec<T>, GdalError> {
        if index == 0 || index > self.metadata.bands {
            return Err(GdalError::UnsupportedFormat(format!(
                "Band index {} out of range",
                index
            )));
        }
        if window.x_offset + window.width > self.metadata.size_x
            || window.y_offset + window.height > self.metadata.size_y
        {
            return Err(GdalError::WindowOutOfBounds(
                format!(
                    "{}x{}+{}+{}",
                    window.width, window.height, window.x_offset, window.y_offset
                ),
                self.metadata.size_x,
                self.metadata.size_y,
            ));
        }
        let band = self.dataset.rasterband(index)?;
        let size = (window.width, window.height);
        let buf = band.read_as::<T>(
            (window.x_offset as isize, window.y_offset as isize),
            size,
            size,
            None,
        )?;
        let data = buf.data().to_vec();
        if data.len() != window.pixel_count() {
            return Err(GdalError::DimensionMismatch(
                window.width,
                window.height,
                data.len(),
                1,
            ));
        }
        Ok(data)
    }

    /// Read a single band (1-based) as an f64 ndarray of shape (height, width)
    pub fn read_band(&self, index: usize) -> Result<Array2<f64>, GdalError> {
        let window = self.full_window();
        let data = self.read_window::<f64>(index, &window)?;
        Array2::from_shape_vec((window.height, window.width), data).map_err(|_| {
            GdalError::DimensionMismatch(
                self.metadata.size_x,
                self.metadata.size_y,
                window.width,
                window.height,
            )
        })
    }

    /// Load every band as an f64 stack. The nodata sentinel is resolved here,
    /// once, from the file or from `default_nodata`.
    pub fn read_stack(&self, default_nodata: f64) -> Result<BandStack, GdalError> {
        let (rows, cols) = (self.metadata.size_y, self.metadata.size_x);
        let mut data = Array3::<f64>::zeros((self.metadata.bands, rows, cols));
        for idx in 1..=self.metadata.bands {
            let band = self.read_band(idx)?;
            data.slice_mut(s![idx - 1, .., ..]).assign(&band);
        }
        debug!(
            "Loaded stack {:?}: {} bands of {}x{}",
            self.path, self.metadata.bands, cols, rows
        );
        Ok(BandStack {
            data,
            nodata: Nodata::resolve(
                self.metadata.nodata,
                default_nodata,
                self.metadata.data_type,
            ),
            nodata_declared: self.metadata.nodata.is_some(),
            geotransform: self.metadata.geotransform,
            projection: self.metadata.projection.clone(),
        })
    }
}
