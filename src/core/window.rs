//! Raster windows, their derived geotransforms, and the tile grid used for
//! both splitting and every derived output.
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::TileId;

/// Affine transformation coefficients for georeferencing rasters.
///
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    /// Usually negative for north-up rasters
    pub pixel_height: f64,
    pub row_rotation: f64,
    pub col_rotation: f64,
}

impl GeoTransform {
    /// North-up transform with no rotation
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// From GDAL order
    /// `[origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]`
    pub fn from_gdal(coeffs: [f64; 6]) -> Self {
        Self {
            origin_x: coeffs[0],
            pixel_width: coeffs[1],
            row_rotation: coeffs[2],
            origin_y: coeffs[3],
            col_rotation: coeffs[4],
            pixel_height: coeffs[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    /// Geographic coordinates of a pixel's top-left corner
    pub fn pixel_to_geo_corner(&self, col: usize, row: usize) -> (f64, f64) {
        let col_f = col as f64;
        let row_f = row as f64;
        let x = self.origin_x + col_f * self.pixel_width + row_f * self.row_rotation;
        let y = self.origin_y + col_f * self.col_rotation + row_f * self.pixel_height;
        (x, y)
    }

    /// Fractional (col, row) of a geographic coordinate; NaN for degenerate transforms
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let det = self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation;
        if det.abs() < 1e-12 {
            return (f64::NAN, f64::NAN);
        }
        let dx = x - self.origin_x;
        let dy = y - self.origin_y;
        let col = (self.pixel_height * dx - self.row_rotation * dy) / det;
        let row = (-self.col_rotation * dx + self.pixel_width * dy) / det;
        (col, row)
    }

    /// Transform of a sub-window whose top-left pixel is `(x_offset, y_offset)`.
    /// Resolution and rotation are inherited unchanged.
    pub fn for_window(&self, x_offset: usize, y_offset: usize) -> Self {
        let (origin_x, origin_y) = self.pixel_to_geo_corner(x_offset, y_offset);
        Self {
            origin_x,
            origin_y,
            ..*self
        }
    }

    pub fn is_rotated(&self) -> bool {
        self.row_rotation.abs() > 1e-12 || self.col_rotation.abs() > 1e-12
    }

    /// `(min_x, min_y, max_x, max_y)` of a raster of the given size
    pub fn bounds(&self, width: usize, height: usize) -> (f64, f64, f64, f64) {
        let (x0, y0) = self.pixel_to_geo_corner(0, 0);
        let (x1, y1) = self.pixel_to_geo_corner(width, 0);
        let (x2, y2) = self.pixel_to_geo_corner(0, height);
        let (x3, y3) = self.pixel_to_geo_corner(width, height);

        let min_x = x0.min(x1).min(x2).min(x3);
        let max_x = x0.max(x1).max(x2).max(x3);
        let min_y = y0.min(y1).min(y2).min(y3);
        let max_y = y0.max(y1).max(y2).max(y3);

        (min_x, min_y, max_x, max_y)
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }
}

/// Rectangular sub-region of a raster together with its derived geotransform
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RasterWindow {
    pub x_offset: usize,
    pub y_offset: usize,
    pub width: usize,
    pub height: usize,
    /// Derived transform; written verbatim into every tile cut from this window
    pub transform: GeoTransform,
}

impl RasterWindow {
    /// Build a window of a `raster_width x raster_height` raster with transform `parent`
    pub fn new(
        x_offset: usize,
        y_offset: usize,
        width: usize,
        height: usize,
        raster_width: usize,
        raster_height: usize,
        parent: &GeoTransform,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::ZeroSize {
                size: width.min(height),
            });
        }
        if x_offset + width > raster_width || y_offset + height > raster_height {
            return Err(Error::InvalidArgument {
                arg: "window",
                value: format!(
                    "{}x{}+{}+{} exceeds {}x{}",
                    width, height, x_offset, y_offset, raster_width, raster_height
                ),
            });
        }
        Ok(Self {
            x_offset,
            y_offset,
            width,
            height,
            transform: parent.for_window(x_offset, y_offset),
        })
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }
}

/// Row-major grid of non-overlapping `tile_size x tile_size` windows.
/// The last row and column are clipped to the raster extent, never padded.
#[derive(Debug, Clone)]
pub struct TileGrid {
    raster_width: usize,
    raster_height: usize,
    tile_size: usize,
    transform: GeoTransform,
    pub tiles_x: usize,
    pub tiles_y: usize,
}

impl TileGrid {
    pub fn new(
        raster_width: usize,
        raster_height: usize,
        tile_size: usize,
        transform: GeoTransform,
    ) -> Result<Self> {
        if tile_size == 0 {
            return Err(Error::ZeroSize { size: tile_size });
        }
        if raster_width == 0 || raster_height == 0 {
            return Err(Error::InvalidArgument {
                arg: "raster_size",
                value: format!("{}x{}", raster_width, raster_height),
            });
        }
        let tiles_x = raster_width.div_ceil(tile_size);
        let tiles_y = raster_height.div_ceil(tile_size);

        debug!(
            "TileGrid: {}x{} raster, tile_size={} -> {}x{} tiles",
            raster_width, raster_height, tile_size, tiles_x, tiles_y
        );

        Ok(Self {
            raster_width,
            raster_height,
            tile_size,
            transform,
            tiles_x,
            tiles_y,
        })
    }

    pub fn len(&self) -> usize {
        self.tiles_x * self.tiles_y
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Window for grid cell `id`; None when outside the grid
    pub fn window(&self, id: TileId) -> Option<RasterWindow> {
        if id.row >= self.tiles_y || id.col >= self.tiles_x {
            return None;
        }
        let x_offset = id.col * self.tile_size;
        let y_offset = id.row * self.tile_size;
        let width = self.tile_size.min(self.raster_width - x_offset);
        let height = self.tile_size.min(self.raster_height - y_offset);
        RasterWindow::new(
            x_offset,
            y_offset,
            width,
            height,
            self.raster_width,
            self.raster_height,
            &self.transform,
        )
        .ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TileId, RasterWindow)> + '_ {
        (0..self.tiles_y)
            .flat_map(move |row| (0..self.tiles_x).map(move |col| TileId::new(row, col)))
            .filter_map(move |id| self.window(id).map(|w| (id, w)))
    }
}
