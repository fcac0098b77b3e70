use gdal::raster::{Buffer, GdalType};
use gdal::{Dataset, DriverManager};
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::debug;

use crate::core::window::GeoTransform;
use crate::io::GdalError;
use crate::types::RasterDataType;

/// Shape and georeferencing of a GeoTIFF to be created
#[derive(Debug, Clone)]
pub struct RasterSpec {
    pub cols: usize,
    pub rows: usize,
    pub bands: usize,
    pub data_type: RasterDataType,
    pub geotransform: GeoTransform,
    pub projection: String,
    pub nodata: Option<f64>,
}

fn create_typed<T: GdalType>(path: &Path, spec: &RasterSpec) -> Result<Dataset, GdalError> {
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    Ok(driver.create_with_band_type::<T, _>(path, spec.cols, spec.rows, spec.bands)?)
}

/// Create a GeoTIFF at `path` with the pixel type, georeferencing and nodata of `spec`
pub fn create_geotiff(path: &Path, spec: &RasterSpec) -> Result<Dataset, GdalError> {
    let mut ds = match spec.data_type {
        RasterDataType::UInt8 => create_typed::<u8>(path, spec)?,
        RasterDataType::UInt16 => create_typed::<u16>(path, spec)?,
        RasterDataType::Int16 => create_typed::<i16>(path, spec)?,
        RasterDataType::UInt32 => create_typed::<u32>(path, spec)?,
        RasterDataType::Int32 => create_typed::<i32>(path, spec)?,
        RasterDataType::Float32 => create_typed::<f32>(path, spec)?,
        RasterDataType::Float64 => create_typed::<f64>(path, spec)?,
    };
    ds.set_geo_transform(&spec.geotransform.to_gdal())?;
    if !spec.projection.is_empty() {
        ds.set_projection(&spec.projection)?;
    }
    if let Some(nodata) = spec.nodata {
        for idx in 1..=spec.bands {
            let mut band = ds.rasterband(idx)?;
            band.set_no_data_value(Some(nodata))?;
        }
    }
    Ok(ds)
}

/// Write a row-major block into band `index` (1-based) at pixel offset `(x, y)`
pub fn write_block<T: GdalType + Copy>(
    ds: &Dataset,
    index: usize,
    offset: (usize, usize),
    size: (usize, usize),
    data: Vec<T>,
) -> Result<(), GdalError> {
    if data.len() != size.0 * size.1 {
        return Err(GdalError::DimensionMismatch(size.0, size.1, data.len(), 1));
    }
    let mut band = ds.rasterband(index)?;
    let mut buf = Buffer::new(size, data);
    band.write((offset.0 as isize, offset.1 as isize), size, &mut buf)?;
    Ok(())
}

/// GeoTIFF written under a hidden temporary name next to its target and renamed
/// into place on `commit`. Dropping without committing removes the partial file.
pub struct PendingRaster {
    dataset: Dataset,
    temp: TempPath,
    target: PathBuf,
}

impl PendingRaster {
    pub fn create(target: &Path, spec: &RasterSpec) -> Result<Self, GdalError> {
        let dir = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut builder = tempfile::Builder::new();
        builder.prefix(".tiletrend-").suffix(".tif");
        // same mode as a plainly created file, not owner-only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(std::fs::Permissions::from_mode(0o666));
        }
        let temp = builder
            .tempfile_in(dir)
            .map_err(|e| GdalError::UnsupportedFormat(format!("temp file in {:?}: {}", dir, e)))?
            .into_temp_path();
        let dataset = create_geotiff(&temp, spec)?;
        Ok(Self {
            dataset,
            temp,
            target: target.to_path_buf(),
        })
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn dataset_mut(&mut self) -> &mut Dataset {
        &mut self.dataset
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Flush and close the dataset, then atomically rename it onto the target
    pub fn commit(self) -> std::io::Result<PathBuf> {
        let PendingRaster {
            dataset,
            temp,
            target,
        } = self;
        drop(dataset);
        temp.persist(&target).map_err(|e| e.error)?;
        debug!("Committed raster {:?}", target);
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::GdalRasterReader;

    fn spec(data_type: RasterDataType) -> RasterSpec {
        RasterSpec {
            cols: 3,
            rows: 2,
            bands: 2,
            data_type,
            geotransform: GeoTransform::new(100.0, 50.0, 10.0, -10.0),
            projection: String::new(),
            nodata: Some(-9999.0),
        }
    }

    #[test]
    fn test_commit_writes_target_only() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.tif");
        let pending = PendingRaster::create(&target, &spec(RasterDataType::Int16)).unwrap();
        write_block::<i16>(pending.dataset(), 1, (0, 0), (3, 2), vec![1, 2, 3, 4, 5, 6]).unwrap();
        write_block::<i16>(pending.dataset(), 2, (1, 1), (2, 1), vec![7, 8]).unwrap();
        assert!(!target.exists());
        pending.commit().unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);

        let reader = GdalRasterReader::open(&target).unwrap();
        assert_eq!(reader.metadata.data_type, RasterDataType::Int16);
        assert_eq!(reader.metadata.nodata, Some(-9999.0));
        assert_eq!(reader.metadata.geotransform.to_gdal()[0], 100.0);
        let b1 = reader.read_band(1).unwrap();
        assert_eq!(b1[[1, 2]], 6.0);
        let b2 = reader.read_band(2).unwrap();
        assert_eq!(b2[[1, 1]], 7.0);
    }

    #[test]
    fn test_dropped_pending_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("never.tif");
        {
            let _pending = PendingRaster::create(&target, &spec(RasterDataType::Float32)).unwrap();
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_committed_file_mode_matches_plain_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain.bin");
        std::fs::File::create(&plain).unwrap();
        let target = dir.path().join("out.tif");
        let pending = PendingRaster::create(&target, &spec(RasterDataType::UInt8)).unwrap();
        let target = pending.commit().unwrap();

        let mode = |p: &Path| std::fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&target), mode(&plain));
    }

    #[test]
    fn test_block_size_checked() {
        let dir = tempfile::tempdir().unwrap();
        let pending =
            PendingRaster::create(&dir.path().join("x.tif"), &spec(RasterDataType::UInt8)).unwrap();
        assert!(write_block::<u8>(pending.dataset(), 1, (0, 0), (3, 2), vec![1, 2]).is_err());
    }
}
