//! Per-pixel denoising: z-score outlier replacement followed by Savitzky-Golay
//! smoothing with nearest-value edge extension.
use crate::core::params::SmoothingParams;
use crate::error::{Error, Result};

/// Replace samples whose population z-score exceeds `threshold` with the mean
/// of the remaining samples. Returns the number of replaced samples.
pub fn replace_zscore_outliers(values: &mut [f64], threshold: f64) -> usize {
    let n = values.len();
    if n < 2 {
        return 0;
    }
    let nf = n as f64;
    let mean = values.iter().sum::<f64>() / nf;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / nf;
    let std = var.sqrt();
    if std == 0.0 || !std.is_finite() {
        return 0;
    }

    let is_outlier = |v: f64| ((v - mean) / std).abs() > threshold;
    let (kept_sum, kept) = values
        .iter()
        .filter(|&&v| !is_outlier(v))
        .fold((0.0, 0usize), |(s, c), &v| (s + v, c + 1));
    if kept == 0 || kept == n {
        return 0;
    }
    let replacement = kept_sum / kept as f64;

    let mut replaced = 0;
    for v in values.iter_mut() {
        if is_outlier(*v) {
            *v = replacement;
            replaced += 1;
        }
    }
    replaced
}

/// Least-squares smoothing weights for a centred window of `window_length`
/// samples fitted with a polynomial of degree `polyorder`.
pub fn savgol_coefficients(window_length: usize, polyorder: usize) -> Result<Vec<f64>> {
    if window_length == 0 || window_length % 2 == 0 {
        return Err(Error::InvalidArgument {
            arg: "window_length",
            value: window_length.to_string(),
        });
    }
    if polyorder >= window_length {
        return Err(Error::InvalidArgument {
            arg: "polyorder",
            value: polyorder.to_string(),
        });
    }
    let half = window_length / 2;
    if half == 0 {
        return Ok(vec![1.0]);
    }

    // Offsets scaled to [-1, 1]; the fitted centre value does not depend on the scale
    let offsets: Vec<f64> = (0..window_length)
        .map(|i| (i as f64 - half as f64) / half as f64)
        .collect();
    let k = polyorder + 1;

    // Normal equations (A^T A) y = e_0
    let mut m = vec![vec![0.0; k + 1]; k];
    for (a, row) in m.iter_mut().enumerate() {
        for b in 0..k {
            row[b] = offsets.iter().map(|u| u.powi((a + b) as i32)).sum();
        }
        row[k] = if a == 0 { 1.0 } else { 0.0 };
    }
    let y = solve_augmented(m).ok_or_else(|| {
        Error::Processing(format!(
            "singular Savitzky-Golay system (window={}, polyorder={})",
            window_length, polyorder
        ))
    })?;

    Ok(offsets
        .iter()
        .map(|u| y.iter().enumerate().map(|(p, yp)| yp * u.powi(p as i32)).sum())
        .collect())
}

/// Gauss-Jordan elimination with partial pivoting on an augmented `k x (k+1)` matrix
fn solve_augmented(mut m: Vec<Vec<f64>>) -> Option<Vec<f64>> {
    let k = m.len();
    for col in 0..k {
        let pivot = (col..k).max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))?;
        if m[pivot][col].abs() < 1e-12 {
            return None;
        }
        m.swap(col, pivot);
        let p = m[col][col];
        for v in m[col].iter_mut() {
            *v /= p;
        }
        for row in 0..k {
            if row != col {
                let factor = m[row][col];
                if factor != 0.0 {
                    for c in col..=k {
                        let pivot_value = m[col][c];
                        m[row][c] -= factor * pivot_value;
                    }
                }
            }
        }
    }
    Some(m.into_iter().map(|row| row[k]).collect())
}

/// Convolve `values` with symmetric smoothing `coeffs`, extending edges with the
/// nearest sample. Output has the same length as the input.
pub fn savgol_apply(values: &[f64], coeffs: &[f64], out: &mut Vec<f64>) {
    out.clear();
    let n = values.len();
    if n == 0 {
        return;
    }
    let half = coeffs.len() / 2;
    for t in 0..n {
        let mut acc = 0.0;
        for (i, c) in coeffs.iter().enumerate() {
            let idx = (t + i).saturating_sub(half).min(n - 1);
            acc += c * values[idx];
        }
        out.push(acc);
    }
}

/// Smoother with precomputed coefficients, shared across all pixels of a run
#[derive(Debug, Clone)]
pub struct SeriesSmoother {
    params: SmoothingParams,
    coeffs: Vec<f64>,
}

impl SeriesSmoother {
    pub fn new(params: &SmoothingParams) -> Result<Self> {
        Ok(Self {
            params: params.clone(),
            coeffs: savgol_coefficients(params.window_length, params.polyorder)?,
        })
    }

    /// Outlier replacement then smoothing of one pixel's valid samples, in place
    pub fn smooth(&self, values: &mut Vec<f64>, scratch: &mut Vec<f64>) {
        replace_zscore_outliers(values, self.params.zscore_threshold);
        savgol_apply(values, &self.coeffs, scratch);
        std::mem::swap(values, scratch);
    }
}
