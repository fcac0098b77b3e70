//! Tile file naming. Grid coordinates are encoded in every file name so that
//! tiles correspond across directories without relying on listing order.
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{Statistic, TileId};

pub const TILE_PREFIX: &str = "tile";

/// `tile_<row>_<col>.tif`
pub fn tile_file_name(id: TileId) -> String {
    format!("{}_{}.tif", TILE_PREFIX, id)
}

/// `<prefix>_<row>_<col>.tif`, e.g. `mk_0_3.tif`
pub fn output_file_name(statistic: Statistic, id: TileId) -> String {
    format!("{}_{}.tif", statistic.file_prefix(), id)
}

/// Recover grid coordinates from a `<prefix>_<row>_<col>.<ext>` file name
pub fn parse_tile_id(path: &Path) -> Option<TileId> {
    let stem = path.file_stem()?.to_str()?;
    let mut parts = stem.rsplitn(3, '_');
    let col = parts.next()?.parse::<usize>().ok()?;
    let row = parts.next()?.parse::<usize>().ok()?;
    let prefix = parts.next()?;
    if prefix.is_empty() || prefix.starts_with('.') {
        return None;
    }
    Some(TileId::new(row, col))
}

/// Visible `.tif` / `.tiff` file (in-progress writes are hidden dot-files)
pub fn is_raster_file(path: &Path) -> bool {
    let visible = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| !n.starts_with('.'))
        .unwrap_or(false);
    let tif = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"))
        .unwrap_or(false);
    visible && tif && path.is_file()
}

/// Raster files directly inside `dir`, sorted by path
pub fn list_raster_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::InputNotFound {
            path: dir.to_path_buf(),
        });
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if is_raster_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
