use ndarray::ArrayView1;

use crate::types::RasterDataType;

/// Nodata sentinel resolved once per tile. A sample is missing when it equals
/// the sentinel or is NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Nodata(pub f64);

impl Nodata {
    /// Tile-declared value if present, otherwise the configured default.
    /// Float32 samples compare against the sentinel as stored in f32.
    pub fn resolve(declared: Option<f64>, default: f64, data_type: RasterDataType) -> Self {
        let value = declared.unwrap_or(default);
        match data_type {
            RasterDataType::Float32 => Nodata(value as f32 as f64),
            _ => Nodata(value),
        }
    }

    #[inline]
    pub fn is_missing(&self, value: f64) -> bool {
        value.is_nan() || value == self.0
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

/// Valid samples of one pixel's time series, in temporal order, with the
/// band ordinal each came from. Order is never changed by extraction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidSamples {
    pub values: Vec<f64>,
    pub positions: Vec<usize>,
}

impl ValidSamples {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            values: Vec::with_capacity(n),
            positions: Vec::with_capacity(n),
        }
    }

    /// Strip missing samples from `series`
    pub fn extract(series: ArrayView1<'_, f64>, nodata: Nodata) -> Self {
        let mut out = Self::with_capacity(series.len());
        out.refill(series, nodata);
        out
    }

    /// Reuse the buffers for another pixel
    pub fn refill(&mut self, series: ArrayView1<'_, f64>, nodata: Nodata) {
        self.values.clear();
        self.positions.clear();
        for (t, &v) in series.iter().enumerate() {
            if !nodata.is_missing(v) {
                self.values.push(v);
                self.positions.push(t);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Median of a slice; NaN when empty. Reorders `values`.
pub(crate) fn median_in_place(values: &mut [f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return f64::NAN;
    }
    let mid = n / 2;
    let (_, upper, _) = values.select_nth_unstable_by(mid, f64::total_cmp);
    let upper = *upper;
    if n % 2 == 1 {
        upper
    } else {
        let lower = values[..mid]
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        (lower + upper) / 2.0
    }
}

/// Sign as -1 / 0 / +1 (0 for equal values)
#[inline]
pub(crate) fn sign(d: f64) -> i64 {
    if d > 0.0 {
        1
    } else if d < 0.0 {
        -1
    } else {
        0
    }
}
