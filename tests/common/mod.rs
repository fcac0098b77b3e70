//! Shared fixtures: small GeoTIFF band stacks written into temp directories.
#![allow(dead_code)]

use gdal::raster::GdalType;
use std::path::Path;

use tiletrend::GeoTransform;
use tiletrend::io::writers::{PendingRaster, RasterSpec, write_block};
use tiletrend::{GdalRasterReader, RasterDataType};

pub const NODATA: f64 = -9999.0;

pub fn north_up() -> GeoTransform {
    GeoTransform::new(500_000.0, 4_200_000.0, 30.0, -30.0)
}

/// Write a `cols x rows` raster with `bands` bands whose pixel `(b, r, c)` is `value(b, r, c)`
pub fn write_raster<T, F>(
    path: &Path,
    data_type: RasterDataType,
    (cols, rows, bands): (usize, usize, usize),
    geotransform: GeoTransform,
    nodata: Option<f64>,
    value: F,
) where
    T: GdalType + Copy,
    F: Fn(usize, usize, usize) -> T,
{
    let spec = RasterSpec {
        cols,
        rows,
        bands,
        data_type,
        geotransform,
        projection: String::new(),
        nodata,
    };
    let pending = PendingRaster::create(path, &spec).expect("create raster");
    for b in 0..bands {
        let mut data = Vec::with_capacity(cols * rows);
        for r in 0..rows {
            for c in 0..cols {
                data.push(value(b, r, c));
            }
        }
        write_block(pending.dataset(), b + 1, (0, 0), (cols, rows), data).expect("write band");
    }
    pending.commit().expect("commit raster");
}

/// Float32 stack where every pixel carries the same series
pub fn write_uniform_series(path: &Path, cols: usize, rows: usize, series: &[f32]) {
    write_raster::<f32, _>(
        path,
        RasterDataType::Float32,
        (cols, rows, series.len()),
        north_up(),
        Some(NODATA),
        |b, _, _| series[b],
    );
}

/// Band `index` (1-based) as row-major f64 values
pub fn read_values(path: &Path, index: usize) -> Vec<f64> {
    let reader = GdalRasterReader::open(path).expect("open raster");
    reader.read_band(index).expect("read band").iter().copied().collect()
}
