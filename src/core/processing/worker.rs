//! Per-tile workers. Each worker loads one tile's band stack, runs a per-pixel
//! routine over every time series, and writes its own output files.
use ndarray::{Array2, Array3, ArrayView1, ArrayView2, ArrayViewMut1, Axis, Zip};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::core::params::PipelineConfig;
use crate::core::stats::{Nodata, SeriesSmoother, ValidSamples, detect_change_point, trend_test};
use crate::error::{Error, Result};
use crate::io::naming::output_file_name;
use crate::io::writers::metadata::{embed_tiff_metadata, tile_metadata_fields};
use crate::io::writers::{PendingRaster, RasterSpec, write_block};
use crate::io::{BandStack, GdalRasterReader};
use crate::types::{Analysis, RasterDataType, Statistic, TileId};

/// One input tile handed to a worker
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TileSource {
    pub id: TileId,
    pub path: PathBuf,
}

/// Unit of work dispatched once per tile by the orchestrator.
/// Implementations hold no per-tile mutable state.
pub trait TileJob: Sync {
    fn name(&self) -> &str;

    /// Process one tile and return the paths written
    fn process(&self, tile: &TileSource) -> Result<Vec<PathBuf>>;
}

/// Load a tile's full band stack, tagging failures as read errors
pub fn load_stack(path: &Path, default_nodata: f64) -> Result<BandStack> {
    let reader = GdalRasterReader::open(path).map_err(|e| Error::tile_read(path, e))?;
    reader
        .read_stack(default_nodata)
        .map_err(|e| Error::tile_read(path, e))
}

fn write_float_raster(
    target: &Path,
    stack: &BandStack,
    id: TileId,
    statistic: Option<Statistic>,
    bands: &[ArrayView2<'_, f64>],
) -> Result<PathBuf> {
    let (rows, cols) = stack.shape();
    let spec = RasterSpec {
        cols,
        rows,
        bands: bands.len(),
        data_type: RasterDataType::Float32,
        geotransform: stack.geotransform,
        projection: stack.projection.clone(),
        // sentinel as the f32 pixels will hold it
        nodata: Some(stack.nodata.value() as f32 as f64),
    };
    let mut pending =
        PendingRaster::create(target, &spec).map_err(|e| Error::tile_write(target, e))?;
    for (i, band) in bands.iter().enumerate() {
        let data: Vec<f32> = band.iter().map(|&v| v as f32).collect();
        write_block(pending.dataset(), i + 1, (0, 0), (cols, rows), data)
            .map_err(|e| Error::tile_write(target, e))?;
    }
    embed_tiff_metadata(pending.dataset_mut(), &tile_metadata_fields(id, statistic))
        .map_err(|e| Error::tile_write(target, e))?;
    pending.commit().map_err(|e| Error::tile_write(target, e))
}

const N_STATS: usize = Statistic::ALL.len();

/// Slot of `stat` in per-pixel value arrays; follows `Statistic::ALL` order
fn stat_index(stat: Statistic) -> usize {
    stat as usize
}

/// Trend or change-point statistics for every pixel of a tile.
/// Writes `<output_dir>/<statistic>/<prefix>_<row>_<col>.tif` per requested statistic.
#[derive(Debug, Clone)]
pub struct StatsWorker {
    name: String,
    analysis: Analysis,
    statistics: Vec<Statistic>,
    output_dir: PathBuf,
    config: PipelineConfig,
}

impl StatsWorker {
    /// An empty `statistics` selects the analysis defaults. Output directories
    /// are created here so an unwritable destination fails before dispatch.
    pub fn new(
        analysis: Analysis,
        statistics: Vec<Statistic>,
        output_dir: &Path,
        config: PipelineConfig,
    ) -> Result<Self> {
        config.validate()?;
        let mut statistics = if statistics.is_empty() {
            analysis.default_statistics()
        } else {
            statistics
        };
        statistics.sort();
        statistics.dedup();
        if let Some(stray) = statistics.iter().find(|s| s.analysis() != analysis) {
            return Err(Error::InvalidArgument {
                arg: "statistics",
                value: format!("{} is not produced by {} analysis", stray, analysis),
            });
        }
        for stat in &statistics {
            std::fs::create_dir_all(output_dir.join(stat.dir_name()))?;
        }
        Ok(Self {
            name: analysis.to_string().to_lowercase(),
            analysis,
            statistics,
            output_dir: output_dir.to_path_buf(),
            config,
        })
    }

    pub fn analysis(&self) -> Analysis {
        self.analysis
    }

    pub fn statistics(&self) -> &[Statistic] {
        &self.statistics
    }

    pub fn statistic_dir(&self, statistic: Statistic) -> PathBuf {
        self.output_dir.join(statistic.dir_name())
    }

    fn wants(&self, analysis: Analysis) -> bool {
        self.statistics.iter().any(|s| s.analysis() == analysis)
    }

    /// Per-pixel values of every statistic; untested entries hold the nodata sentinel
    fn pixel_values(&self, series: ArrayView1<'_, f64>, nodata: Nodata) -> [f64; N_STATS] {
        let mut out = [nodata.value(); N_STATS];
        let samples = ValidSamples::extract(series, nodata);

        if self.wants(Analysis::Trend) && samples.len() >= self.config.trend_min_samples {
            if let Some(r) = trend_test(&samples.values) {
                out[stat_index(Statistic::MkZ)] = r.z;
                out[stat_index(Statistic::SenSlope)] = r.slope;
                out[stat_index(Statistic::MkP)] = r.p_value;
                out[stat_index(Statistic::KendallTau)] = r.tau;
                out[stat_index(Statistic::SenIntercept)] = r.intercept;
            }
        }

        if self.wants(Analysis::ChangePoint) {
            let outcome = detect_change_point(
                &samples,
                self.config.change_point_min_samples,
                self.config.significance,
            );
            out[stat_index(Statistic::Pettitt)] = outcome.encode(nodata.value());
            if let Some(p) = outcome.p_value() {
                out[stat_index(Statistic::PettittP)] = p;
            }
        }
        out
    }

    /// Compute the requested statistic grids for one band stack
    pub fn compute(&self, stack: &BandStack) -> Vec<(Statistic, Array2<f64>)> {
        let nodata = stack.nodata;
        let mut pixels = Array2::from_elem(stack.shape(), [nodata.value(); N_STATS]);
        let zip = Zip::from(&mut pixels).and(stack.data.lanes(Axis(0)));
        if self.config.parallel_pixels {
            zip.par_for_each(|px, series| *px = self.pixel_values(series, nodata));
        } else {
            zip.for_each(|px, series| *px = self.pixel_values(series, nodata));
        }

        self.statistics
            .iter()
            .map(|&stat| {
                let idx = stat_index(stat);
                (stat, pixels.map(|v| v[idx]))
            })
            .collect()
    }
}

impl TileJob for StatsWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&self, tile: &TileSource) -> Result<Vec<PathBuf>> {
        let stack = load_stack(&tile.path, self.config.default_nodata)?;
        debug!(
            "{} tile {}: {} bands, nodata={} (declared: {})",
            self.name,
            tile.id,
            stack.bands(),
            stack.nodata.value(),
            stack.nodata_declared
        );

        let mut written = Vec::with_capacity(self.statistics.len());
        for (stat, grid) in self.compute(&stack) {
            let target = self
                .statistic_dir(stat)
                .join(output_file_name(stat, tile.id));
            written.push(write_float_raster(
                &target,
                &stack,
                tile.id,
                Some(stat),
                &[grid.view()],
            )?);
        }
        Ok(written)
    }
}

/// Outlier replacement plus Savitzky-Golay smoothing of every pixel series.
/// Output tiles keep the input file name, band count and georeferencing.
#[derive(Debug, Clone)]
pub struct SmoothingWorker {
    smoother: SeriesSmoother,
    output_dir: PathBuf,
    config: PipelineConfig,
}

impl SmoothingWorker {
    pub fn new(output_dir: &Path, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(output_dir)?;
        Ok(Self {
            smoother: SeriesSmoother::new(&config.smoothing)?,
            output_dir: output_dir.to_path_buf(),
            config,
        })
    }

    fn smooth_series(
        &self,
        series: ArrayView1<'_, f64>,
        mut out: ArrayViewMut1<'_, f64>,
        nodata: Nodata,
    ) {
        out.fill(nodata.value());
        let mut samples = ValidSamples::extract(series, nodata);
        if samples.is_empty() {
            return;
        }
        let mut scratch = Vec::with_capacity(samples.len());
        self.smoother.smooth(&mut samples.values, &mut scratch);
        for (&pos, &v) in samples.positions.iter().zip(&samples.values) {
            out[pos] = v;
        }
    }

    /// Smoothed copy of `stack`; missing samples stay at the nodata sentinel
    pub fn compute(&self, stack: &BandStack) -> Array3<f64> {
        let nodata = stack.nodata;
        let mut out = Array3::<f64>::zeros(stack.data.raw_dim());
        let zip = Zip::from(out.lanes_mut(Axis(0))).and(stack.data.lanes(Axis(0)));
        if self.config.parallel_pixels {
            zip.par_for_each(|o, series| self.smooth_series(series, o, nodata));
        } else {
            zip.for_each(|o, series| self.smooth_series(series, o, nodata));
        }
        out
    }
}

impl TileJob for SmoothingWorker {
    fn name(&self) -> &str {
        "smooth"
    }

    fn process(&self, tile: &TileSource) -> Result<Vec<PathBuf>> {
        let stack = load_stack(&tile.path, self.config.default_nodata)?;
        let smoothed = self.compute(&stack);
        let file_name = tile
            .path
            .file_name()
            .ok_or_else(|| Error::tile_read(&tile.path, "tile path has no file name"))?;
        let target = self.output_dir.join(file_name);
        let bands: Vec<_> = smoothed.outer_iter().collect();
        let path = write_float_raster(&target, &stack, tile.id, None, &bands)?;
        Ok(vec![path])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::window::GeoTransform;
    use approx::assert_relative_eq;
    use ndarray::s;

    const ND: f64 = -9999.0;

    /// 1x2 tile: pixel (0,0) holds `a`, pixel (0,1) holds `b`
    fn stack(a: &[f64], b: &[f64]) -> BandStack {
        let mut data = Array3::<f64>::zeros((a.len(), 1, 2));
        for t in 0..a.len() {
            data[[t, 0, 0]] = a[t];
            data[[t, 0, 1]] = b[t];
        }
        BandStack {
            data,
            nodata: Nodata(ND),
            nodata_declared: true,
            geotransform: GeoTransform::default(),
            projection: String::new(),
        }
    }

    fn worker(
        analysis: Analysis,
        stats: Vec<Statistic>,
        parallel: bool,
    ) -> (tempfile::TempDir, StatsWorker) {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            parallel_pixels: parallel,
            ..Default::default()
        };
        let w = StatsWorker::new(analysis, stats, dir.path(), config).unwrap();
        (dir, w)
    }

    #[test]
    fn test_trend_single_valid_sample_is_nodata() {
        let (_dir, w) = worker(Analysis::Trend, vec![], true);
        let s = stack(&[1.0, 2.0, 3.0, 4.0, 5.0], &[ND, ND, 7.0, ND, ND]);
        let out = w.compute(&s);
        assert_eq!(out.len(), 2);
        let (_, z) = &out[0];
        let (_, slope) = &out[1];
        assert!(z[[0, 0]] > 0.0);
        assert_relative_eq!(slope[[0, 0]], 1.0);
        assert_eq!(z[[0, 1]], ND);
        assert_eq!(slope[[0, 1]], ND);
    }

    #[test]
    fn test_change_point_short_series_is_nodata() {
        let (_dir, w) = worker(
            Analysis::ChangePoint,
            vec![Statistic::Pettitt, Statistic::PettittP],
            false,
        );
        let mut a = vec![1.0; 10];
        a.extend(vec![10.0; 10]);
        let mut b = vec![ND; 20];
        b[..4].copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        let out = w.compute(&stack(&a, &b));
        let (stat, pettitt) = &out[0];
        assert_eq!(*stat, Statistic::Pettitt);
        assert_eq!(pettitt[[0, 0]], 10.0);
        assert_eq!(pettitt[[0, 1]], ND);
        let (_, p) = &out[1];
        assert!(p[[0, 0]] < 0.05);
        assert_eq!(p[[0, 1]], ND);
    }

    #[test]
    fn test_parallel_and_sequential_agree() {
        let a: Vec<f64> = (0..12).map(|i| (i as f64 * 0.7).sin() + i as f64 * 0.1).collect();
        let b: Vec<f64> = (0..12).map(|i| if i % 3 == 0 { ND } else { 12.0 - i as f64 }).collect();
        let s = stack(&a, &b);
        let (_d1, seq) = worker(Analysis::Trend, Statistic::ALL[..5].to_vec(), false);
        let (_d2, par) = worker(Analysis::Trend, Statistic::ALL[..5].to_vec(), true);
        assert_eq!(seq.compute(&s), par.compute(&s));
    }

    #[test]
    fn test_mixed_analysis_statistics_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = StatsWorker::new(
            Analysis::Trend,
            vec![Statistic::MkZ, Statistic::Pettitt],
            dir.path(),
            PipelineConfig::default(),
        )
        .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_output_dirs_created() {
        let (dir, w) = worker(Analysis::Trend, vec![], true);
        assert!(dir.path().join("mk_z").is_dir());
        assert!(dir.path().join("sen_slope").is_dir());
        assert_eq!(w.statistic_dir(Statistic::MkZ), dir.path().join("mk_z"));
    }

    #[test]
    fn test_smoothing_keeps_nodata_positions() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::default();
        config.smoothing.window_length = 5;
        let w = SmoothingWorker::new(dir.path(), config).unwrap();
        let a = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        let b = [2.0, ND, 2.0, 2.0, 50.0, 2.0, 2.0, 2.0, ND, 2.0];
        let out = w.compute(&stack(&a, &b));
        for v in out.slice(s![.., 0, 0]) {
            assert_relative_eq!(*v, 1.0, epsilon = 1e-9);
        }
        let px: ArrayView1<f64> = out.slice(s![.., 0, 1]);
        assert_eq!(px[1], ND);
        assert_eq!(px[8], ND);
        for t in [0, 2, 3, 4, 5, 6, 7, 9] {
            assert_relative_eq!(px[t], 2.0, epsilon = 1e-9);
        }
    }
}
