//! TileSplitter: cut one large raster into a row-major grid of GeoTIFF tiles.
use gdal::raster::GdalType;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::mosaic::MosaicExtent;
use crate::core::window::{GeoTransform, RasterWindow, TileGrid};
use crate::error::{Error, Result};
use crate::io::GdalRasterReader;
use crate::io::naming::tile_file_name;
use crate::io::writers::metadata::{embed_tiff_metadata, tile_metadata_fields};
use crate::io::writers::{PendingRaster, RasterSpec, write_block};
use crate::types::{RasterDataType, TileId};

/// Tiles written by one split
#[derive(Debug, Clone)]
pub struct SplitOutcome {
    pub tiles_x: usize,
    pub tiles_y: usize,
    pub tiles: Vec<(TileId, PathBuf)>,
    /// Size and georeferencing of the raster that was split
    pub width: usize,
    pub height: usize,
    pub geotransform: GeoTransform,
}

impl SplitOutcome {
    /// Grid the tiles were cut from, for merging results back onto it
    pub fn extent(&self) -> MosaicExtent {
        MosaicExtent {
            geotransform: self.geotransform,
            width: self.width,
            height: self.height,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TileSplitter {
    tile_size: usize,
}

impl TileSplitter {
    pub fn new(tile_size: usize) -> Result<Self> {
        if tile_size == 0 {
            return Err(Error::ZeroSize { size: tile_size });
        }
        Ok(Self { tile_size })
    }

    pub fn tile_size(&self) -> usize {
        self.tile_size
    }

    /// Write `tile_<row>_<col>.tif` for every grid window of `input` into `output_dir`.
    /// Existing files with the same names are replaced; others are left alone.
    pub fn split(&self, input: &Path, output_dir: &Path) -> Result<SplitOutcome> {
        if !input.is_file() {
            return Err(Error::InputNotFound {
                path: input.to_path_buf(),
            });
        }
        std::fs::create_dir_all(output_dir)?;

        let reader = GdalRasterReader::open(input)?;
        let meta = &reader.metadata;
        let grid = TileGrid::new(meta.size_x, meta.size_y, self.tile_size, meta.geotransform)?;
        info!(
            "Splitting {:?} ({}x{}, {} bands, {}) into {}x{} tiles of {} px",
            input,
            meta.size_x,
            meta.size_y,
            meta.bands,
            meta.data_type,
            grid.tiles_x,
            grid.tiles_y,
            self.tile_size
        );

        let mut tiles = Vec::with_capacity(grid.len());
        for (id, window) in grid.iter() {
            let target = output_dir.join(tile_file_name(id));
            write_tile(&reader, id, &window, &target)?;
            debug!(
                "Tile {} -> {:?} ({}x{} at {},{})",
                id, target, window.width, window.height, window.x_offset, window.y_offset
            );
            tiles.push((id, target));
        }

        info!("Wrote {} tiles to {:?}", tiles.len(), output_dir);
        Ok(SplitOutcome {
            tiles_x: grid.tiles_x,
            tiles_y: grid.tiles_y,
            tiles,
            width: meta.size_x,
            height: meta.size_y,
            geotransform: meta.geotransform,
        })
    }
}

fn write_tile(
    reader: &GdalRasterReader,
    id: TileId,
    window: &RasterWindow,
    target: &Path,
) -> Result<()> {
    let meta = &reader.metadata;
    let spec = RasterSpec {
        cols: window.width,
        rows: window.height,
        bands: meta.bands,
        data_type: meta.data_type,
        geotransform: window.transform,
        projection: meta.projection.clone(),
        nodata: meta.nodata,
    };
    let mut pending =
        PendingRaster::create(target, &spec).map_err(|e| Error::tile_write(target, e))?;
    let copied = match meta.data_type {
        RasterDataType::UInt8 => copy_bands::<u8>(reader, window, &pending),
        RasterDataType::UInt16 => copy_bands::<u16>(reader, window, &pending),
        RasterDataType::Int16 => copy_bands::<i16>(reader, window, &pending),
        RasterDataType::UInt32 => copy_bands::<u32>(reader, window, &pending),
        RasterDataType::Int32 => copy_bands::<i32>(reader, window, &pending),
        RasterDataType::Float32 => copy_bands::<f32>(reader, window, &pending),
        RasterDataType::Float64 => copy_bands::<f64>(reader, window, &pending),
    };
    copied?;
    embed_tiff_metadata(pending.dataset_mut(), &tile_metadata_fields(id, None))
        .map_err(|e| Error::tile_write(target, e))?;
    pending.commit().map_err(|e| Error::tile_write(target, e))?;
    Ok(())
}

/// Copy every band of `window` without changing the pixel type
fn copy_bands<T: GdalType + Copy>(
    reader: &GdalRasterReader,
    window: &RasterWindow,
    pending: &PendingRaster,
) -> Result<()> {
    for idx in 1..=reader.metadata.bands {
        let data = reader
            .read_window::<T>(idx, window)
            .map_err(|e| Error::tile_read(&reader.path, e))?;
        write_block(
            pending.dataset(),
            idx,
            (0, 0),
            (window.width, window.height),
            data,
        )
        .map_err(|e| Error::tile_write(pending.target(), e))?;
    }
    Ok(())
}
