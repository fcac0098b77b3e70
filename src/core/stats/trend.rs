//! Mann-Kendall monotonic trend test and Sen's slope estimator.
//!
//! Both take the valid samples of one pixel in temporal order. Z answers
//! "is there a trend", the slope answers "how steep"; they are computed
//! independently and neither is thresholded here.
use super::series::{median_in_place, sign};

/// Outcome of the Mann-Kendall test plus Sen's estimators for one series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendResult {
    /// Sum of pairwise signs
    pub s: f64,
    /// Tie-corrected variance of S
    pub var_s: f64,
    /// Continuity-corrected normal approximation of S
    pub z: f64,
    /// Two-sided p-value of `z`
    pub p_value: f64,
    /// Kendall's tau
    pub tau: f64,
    /// Sen's slope (median pairwise slope)
    pub slope: f64,
    /// Sen's intercept
    pub intercept: f64,
}

/// Run the full trend analysis. None when fewer than 2 samples.
pub fn trend_test(values: &[f64]) -> Option<TrendResult> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let (s, var_s) = mann_kendall_s(values);
    let z = mann_kendall_z(s, var_s);
    let slope = sens_slope(values)?;
    let intercept = sens_intercept(values, slope);
    let pairs = (n * (n - 1)) as f64 / 2.0;

    Some(TrendResult {
        s,
        var_s,
        z,
        p_value: 2.0 * normal_cdf(-z.abs()),
        tau: s / pairs,
        slope,
        intercept,
    })
}

/// S statistic and its variance, corrected for groups of tied values
pub fn mann_kendall_s(values: &[f64]) -> (f64, f64) {
    let n = values.len();
    let mut s: i64 = 0;
    for i in 0..n {
        let xi = values[i];
        for &xj in &values[i + 1..] {
            s += sign(xj - xi);
        }
    }

    let nf = n as f64;
    let mut var_s = nf * (nf - 1.0) * (2.0 * nf + 5.0);

    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);
    let mut start = 0;
    while start < sorted.len() {
        let mut end = start + 1;
        while end < sorted.len() && sorted[end] == sorted[start] {
            end += 1;
        }
        let tp = (end - start) as f64;
        if tp > 1.0 {
            var_s -= tp * (tp - 1.0) * (2.0 * tp + 5.0);
        }
        start = end;
    }

    (s as f64, var_s / 18.0)
}

/// Continuity-corrected Z; 0 when S is 0 or the variance vanishes
pub fn mann_kendall_z(s: f64, var_s: f64) -> f64 {
    if var_s <= 0.0 {
        return 0.0;
    }
    let sd = var_s.sqrt();
    if s > 0.0 {
        (s - 1.0) / sd
    } else if s < 0.0 {
        (s + 1.0) / sd
    } else {
        0.0
    }
}

/// Median of `(x_j - x_i) / (j - i)` over all pairs `j > i`. None when fewer than 2 samples.
pub fn sens_slope(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let mut slopes = Vec::with_capacity(n * (n - 1) / 2);
    for i in 0..n {
        for j in i + 1..n {
            slopes.push((values[j] - values[i]) / (j - i) as f64);
        }
    }
    Some(median_in_place(&mut slopes))
}

/// `median(x) - median(t) * slope`, with t the ordinal index 0..n
pub fn sens_intercept(values: &[f64], slope: f64) -> f64 {
    let mut sorted = values.to_vec();
    let median_x = median_in_place(&mut sorted);
    let median_t = (values.len() as f64 - 1.0) / 2.0;
    median_x - median_t * slope
}

/// Standard normal CDF (Abramowitz & Stegun 26.2.17, error < 7.5e-8)
pub fn normal_cdf(x: f64) -> f64 {
    if x < -8.0 {
        return 0.0;
    }
    if x > 8.0 {
        return 1.0;
    }

    let t = 1.0 / (1.0 + 0.2316419 * x.abs());
    let d = 0.3989422804014327; // 1/sqrt(2*pi)
    let p = d
        * (-x * x / 2.0).exp()
        * (t * (0.319381530
            + t * (-0.356563782 + t * (1.781477937 + t * (-1.821255978 + t * 1.330274429)))));

    if x > 0.0 { 1.0 - p } else { p }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_increasing_series() {
        let r = trend_test(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(r.s, 10.0);
        assert_relative_eq!(r.var_s, 50.0 / 3.0, epsilon = 1e-12);
        assert!(r.z > 0.0);
        assert_relative_eq!(r.z, 9.0 / (50.0f64 / 3.0).sqrt(), epsilon = 1e-12);
        assert_eq!(r.slope, 1.0);
        assert_eq!(r.tau, 1.0);
        assert_relative_eq!(r.intercept, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_decreasing_series() {
        let r = trend_test(&[9.0, 7.0, 4.0, 2.0, 1.0, 0.5]).unwrap();
        assert!(r.z < 0.0);
        assert!(r.slope < 0.0);
        assert_eq!(r.tau, -1.0);
    }

    #[test]
    fn test_linear_series_slope_is_exact() {
        let values: Vec<f64> = (0..12).map(|i| 3.5 + 0.25 * i as f64).collect();
        assert_eq!(sens_slope(&values), Some(0.25));
    }

    #[test]
    fn test_z_grows_with_length() {
        let mut last = 0.0;
        for n in 3..30 {
            let values: Vec<f64> = (0..n).map(|i| 2.0 * i as f64).collect();
            let z = trend_test(&values).unwrap().z;
            assert!(z > last, "z should grow with n (n={n}, z={z}, prev={last})");
            last = z;
        }
    }

    #[test]
    fn test_insufficient_samples() {
        assert!(trend_test(&[]).is_none());
        assert!(trend_test(&[4.2]).is_none());
        assert!(sens_slope(&[4.2]).is_none());
    }

    #[test]
    fn test_ties_reduce_variance() {
        let (_, untied) = mann_kendall_s(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let (s, tied) = mann_kendall_s(&[1.0, 2.0, 2.0, 2.0, 5.0]);
        assert_eq!(s, 7.0);
        // one group of three: 3*2*11 = 66 removed before dividing by 18
        assert_relative_eq!(tied, untied - 66.0 / 18.0, epsilon = 1e-12);
    }

    #[test]
    fn test_constant_series() {
        let r = trend_test(&[2.0, 2.0, 2.0, 2.0]).unwrap();
        assert_eq!(r.s, 0.0);
        assert_eq!(r.var_s, 0.0);
        assert_eq!(r.z, 0.0);
        assert_eq!(r.slope, 0.0);
        assert_relative_eq!(r.p_value, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_slope_ignores_outlier() {
        let r = trend_test(&[1.0, 2.0, 3.0, 400.0, 5.0, 6.0, 7.0]).unwrap();
        assert_eq!(r.slope, 1.0);
    }

    #[test]
    fn test_normal_cdf() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-6);
        assert!((normal_cdf(1.96) - 0.975).abs() < 1e-3);
        assert!((normal_cdf(-1.96) - 0.025).abs() < 1e-3);
    }
}
