//! MosaicMerger: place every tile of one statistic into a single raster using
//! only each tile's geotransform and size.
use gdal::raster::GdalType;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::core::window::GeoTransform;
use crate::error::{Error, Result};
use crate::io::naming::{list_raster_files, parse_tile_id};
use crate::io::writers::{PendingRaster, RasterSpec, write_block};
use crate::io::{GdalRasterReader, RasterMetadata};
use crate::types::RasterDataType;

const RESOLUTION_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct MosaicSummary {
    pub output: PathBuf,
    pub width: usize,
    pub height: usize,
    pub bands: usize,
    pub tiles: usize,
    pub geotransform: GeoTransform,
}

/// Tile placement inside the output grid
#[derive(Debug, Clone)]
struct Placement {
    path: PathBuf,
    x_offset: usize,
    y_offset: usize,
    width: usize,
    height: usize,
}

fn same_resolution(a: f64, b: f64) -> bool {
    (a - b).abs() <= RESOLUTION_TOLERANCE * a.abs().max(b.abs())
}

/// Output grid fixed ahead of the merge, normally the raster that was split
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MosaicExtent {
    pub geotransform: GeoTransform,
    pub width: usize,
    pub height: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MosaicMerger {
    extent: Option<MosaicExtent>,
}

impl MosaicMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge onto `extent` instead of the union of the tiles found, so missing
    /// edge tiles leave nodata rather than shrinking the mosaic
    pub fn with_extent(mut self, extent: MosaicExtent) -> Self {
        self.extent = Some(extent);
        self
    }

    /// Merge every raster in `input_dir` into `output`. Tiles are written in
    /// sorted order, so a later tile wins where two overlap.
    pub fn merge(&self, input_dir: &Path, output: &Path) -> Result<MosaicSummary> {
        let mut files = list_raster_files(input_dir)?;
        if files.is_empty() {
            return Err(Error::Mosaic(format!("no tiles found in {:?}", input_dir)));
        }
        files.sort_by_key(|p| (parse_tile_id(p).is_none(), parse_tile_id(p), p.clone()));

        let mut tiles: Vec<(PathBuf, RasterMetadata)> = Vec::with_capacity(files.len());
        for path in files {
            let reader =
                GdalRasterReader::open(&path).map_err(|e| Error::tile_read(&path, e))?;
            tiles.push((path, reader.metadata));
        }

        let (first_path, first) = &tiles[0];
        let reference = first.geotransform;
        for (path, meta) in &tiles {
            if meta.geotransform.is_rotated() {
                return Err(Error::Mosaic(format!("rotated tile {:?} not supported", path)));
            }
            if meta.bands != first.bands {
                return Err(Error::Mosaic(format!(
                    "{:?} has {} bands, {:?} has {}",
                    path, meta.bands, first_path, first.bands
                )));
            }
            if !same_resolution(meta.geotransform.pixel_width, reference.pixel_width)
                || !same_resolution(meta.geotransform.pixel_height, reference.pixel_height)
            {
                return Err(Error::Mosaic(format!(
                    "{:?} resolution ({}, {}) differs from ({}, {})",
                    path,
                    meta.geotransform.pixel_width,
                    meta.geotransform.pixel_height,
                    reference.pixel_width,
                    reference.pixel_height
                )));
            }
        }

        let (geotransform, width, height) = match self.extent {
            Some(extent) => {
                let gt = extent.geotransform;
                if gt.is_rotated()
                    || !same_resolution(gt.pixel_width, reference.pixel_width)
                    || !same_resolution(gt.pixel_height, reference.pixel_height)
                {
                    return Err(Error::Mosaic(format!(
                        "target grid ({}, {}) does not match tile resolution ({}, {})",
                        gt.pixel_width,
                        gt.pixel_height,
                        reference.pixel_width,
                        reference.pixel_height
                    )));
                }
                (gt, extent.width, extent.height)
            }
            None => union_grid(&tiles, reference),
        };
        info!(
            "Merging {} tiles from {:?} into {}x{} mosaic ({} bands, {})",
            tiles.len(),
            input_dir,
            width,
            height,
            first.bands,
            first.data_type
        );

        let mut placements = Vec::with_capacity(tiles.len());
        for (path, meta) in &tiles {
            let origin = (meta.geotransform.origin_x, meta.geotransform.origin_y);
            let (col, row) = geotransform.geo_to_pixel(origin.0, origin.1);
            let (col, row) = (col.round(), row.round());
            if !col.is_finite()
                || !row.is_finite()
                || col < 0.0
                || row < 0.0
                || col as usize + meta.size_x > width
                || row as usize + meta.size_y > height
            {
                return Err(Error::Mosaic(format!(
                    "tile {:?} falls outside the mosaic at ({}, {})",
                    path, col, row
                )));
            }
            placements.push(Placement {
                path: path.clone(),
                x_offset: col as usize,
                y_offset: row as usize,
                width: meta.size_x,
                height: meta.size_y,
            });
        }

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let spec = RasterSpec {
            cols: width,
            rows: height,
            bands: first.bands,
            data_type: first.data_type,
            geotransform,
            projection: first.projection.clone(),
            nodata: first.nodata,
        };
        let pending =
            PendingRaster::create(output, &spec).map_err(|e| Error::tile_write(output, e))?;
        let fill = first.nodata.unwrap_or(0.0);
        for idx in 1..=first.bands {
            let mut band = pending
                .dataset()
                .rasterband(idx)
                .map_err(|e| Error::tile_write(output, e))?;
            band.fill(fill, None).map_err(|e| Error::tile_write(output, e))?;
        }

        let bands = first.bands;
        let written = match first.data_type {
            RasterDataType::UInt8 => place_tiles::<u8>(&pending, &placements, bands),
            RasterDataType::UInt16 => place_tiles::<u16>(&pending, &placements, bands),
            RasterDataType::Int16 => place_tiles::<i16>(&pending, &placements, bands),
            RasterDataType::UInt32 => place_tiles::<u32>(&pending, &placements, bands),
            RasterDataType::Int32 => place_tiles::<i32>(&pending, &placements, bands),
            RasterDataType::Float32 => place_tiles::<f32>(&pending, &placements, bands),
            RasterDataType::Float64 => place_tiles::<f64>(&pending, &placements, bands),
        };
        written?;
        let output = pending.commit().map_err(|e| Error::tile_write(output, e))?;

        info!("Mosaic written to {:?}", output);
        Ok(MosaicSummary {
            output,
            width,
            height,
            bands,
            tiles: placements.len(),
            geotransform,
        })
    }
}

/// Grid spanning the union of every tile's bounds at the reference resolution
fn union_grid(
    tiles: &[(PathBuf, RasterMetadata)],
    reference: GeoTransform,
) -> (GeoTransform, usize, usize) {
    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for (_, meta) in tiles {
        let (x0, y0, x1, y1) = meta.geotransform.bounds(meta.size_x, meta.size_y);
        min_x = min_x.min(x0);
        min_y = min_y.min(y0);
        max_x = max_x.max(x1);
        max_y = max_y.max(y1);
    }

    let pw = reference.pixel_width;
    let ph = reference.pixel_height;
    let width = ((max_x - min_x) / pw.abs()).round() as usize;
    let height = ((max_y - min_y) / ph.abs()).round() as usize;
    let geotransform = GeoTransform::new(
        if pw > 0.0 { min_x } else { max_x },
        if ph < 0.0 { max_y } else { min_y },
        pw,
        ph,
    );
    (geotransform, width, height)
}

fn place_tiles<T: GdalType + Copy>(
    pending: &PendingRaster,
    placements: &[Placement],
    bands: usize,
) -> Result<()> {
    for p in placements {
        let reader =
            GdalRasterReader::open(&p.path).map_err(|e| Error::tile_read(&p.path, e))?;
        let window = reader.full_window();
        for idx in 1..=bands {
            let data = reader
                .read_window::<T>(idx, &window)
                .map_err(|e| Error::tile_read(&p.path, e))?;
            write_block(
                pending.dataset(),
                idx,
                (p.x_offset, p.y_offset),
                (p.width, p.height),
                data,
            )
            .map_err(|e| Error::tile_write(pending.target(), e))?;
        }
        debug!("Placed {:?} at ({}, {})", p.path, p.x_offset, p.y_offset);
    }
    Ok(())
}
