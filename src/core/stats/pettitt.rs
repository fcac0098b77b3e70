//! Pettitt test for a single abrupt change point.
//!
//! Order-sensitive: callers must pass valid samples in their original temporal order.
use super::series::{ValidSamples, sign};

/// Raw Pettitt result over a series of valid samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PettittResult {
    /// 0-based index into the valid samples of the last value before the change
    pub change_point: usize,
    /// Signed `U_K` at the change point
    pub u_max: f64,
    /// `min(1, 2 exp(-6 U_K^2 / (n^3 + n^2)))`
    pub p_value: f64,
}

/// Compute `U_t = sum_{i<=t} sum_{j>t} sign(x_i - x_j)` for every `t` and keep the
/// first `t` with the largest `|U_t|`. None for an empty series.
pub fn pettitt_test(values: &[f64]) -> Option<PettittResult> {
    let n = values.len();
    if n == 0 {
        return None;
    }

    // U_t = U_{t-1} + sum_j sign(x_t - x_j)
    let mut u: i64 = 0;
    let mut best_u: i64 = 0;
    let mut best_t = 0;
    for (t, &xt) in values.iter().enumerate() {
        u += values.iter().map(|&xj| sign(xt - xj)).sum::<i64>();
        if u.abs() > best_u.abs() {
            best_u = u;
            best_t = t;
        }
    }

    let nf = n as f64;
    let u_max = best_u as f64;
    let p_value = (2.0 * (-6.0 * u_max * u_max / (nf.powi(3) + nf.powi(2))).exp()).min(1.0);

    Some(PettittResult {
        change_point: best_t,
        u_max,
        p_value,
    })
}

/// Pixel outcome of the change-point test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChangePointOutcome {
    /// Too few valid samples; written as nodata
    Untested,
    /// Tested, no significant change; written as 0
    NoChange { p_value: f64 },
    /// Significant change; `position` is the 1-based band ordinal in the original series
    Change { position: usize, p_value: f64 },
}

impl ChangePointOutcome {
    /// Value stored in the change-point raster
    pub fn encode(&self, nodata: f64) -> f64 {
        match self {
            ChangePointOutcome::Untested => nodata,
            ChangePointOutcome::NoChange { .. } => 0.0,
            ChangePointOutcome::Change { position, .. } => *position as f64,
        }
    }

    pub fn p_value(&self) -> Option<f64> {
        match self {
            ChangePointOutcome::Untested => None,
            ChangePointOutcome::NoChange { p_value }
            | ChangePointOutcome::Change { p_value, .. } => Some(*p_value),
        }
    }
}

/// Apply the minimum-length and significance policy to one pixel's samples
pub fn detect_change_point(
    samples: &ValidSamples,
    min_samples: usize,
    significance: f64,
) -> ChangePointOutcome {
    if samples.len() < min_samples {
        return ChangePointOutcome::Untested;
    }
    match pettitt_test(&samples.values) {
        None => ChangePointOutcome::Untested,
        Some(r) if r.p_value < significance => ChangePointOutcome::Change {
            position: samples.positions[r.change_point] + 1,
            p_value: r.p_value,
        },
        Some(r) => ChangePointOutcome::NoChange { p_value: r.p_value },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array1;

    use crate::core::stats::series::Nodata;

    fn samples(values: &[f64]) -> ValidSamples {
        ValidSamples::extract(Array1::from(values.to_vec()).view(), Nodata(-9999.0))
    }

    #[test]
    fn test_step_located_at_boundary() {
        let x = [1.0, 1.0, 1.0, 1.0, 1.0, 10.0, 10.0, 10.0, 10.0, 10.0];
        let r = pettitt_test(&x).unwrap();
        assert_eq!(r.change_point + 1, 5);
        assert_eq!(r.u_max.abs(), 25.0);
        // n = 10 caps |U| at 25, so the two-sided approximation stays just above 0.05
        assert_relative_eq!(r.p_value, 2.0 * (-6.0 * 625.0 / 1100.0f64).exp(), epsilon = 1e-12);
    }

    #[test]
    fn test_longer_step_is_significant() {
        let mut x = vec![1.0; 10];
        x.extend(vec![10.0; 10]);
        let outcome = detect_change_point(&samples(&x), 5, 0.05);
        match outcome {
            ChangePointOutcome::Change { position, p_value } => {
                assert_eq!(position, 10);
                assert!(p_value < 0.01);
            }
            other => panic!("expected a change, got {other:?}"),
        }
        assert_eq!(outcome.encode(-9999.0), 10.0);
    }

    #[test]
    fn test_short_series_untested() {
        let outcome = detect_change_point(&samples(&[1.0, 2.0, 3.0, 4.0]), 5, 0.05);
        assert_eq!(outcome, ChangePointOutcome::Untested);
        assert_eq!(outcome.encode(-9999.0), -9999.0);
        assert_eq!(outcome.p_value(), None);
    }

    #[test]
    fn test_flat_series_no_change() {
        let outcome = detect_change_point(&samples(&[3.0; 12]), 5, 0.05);
        assert_eq!(outcome, ChangePointOutcome::NoChange { p_value: 1.0 });
        assert_eq!(outcome.encode(-9999.0), 0.0);
    }

    #[test]
    fn test_position_maps_back_through_gaps() {
        let mut x = vec![1.0; 10];
        x.extend(vec![10.0; 10]);
        // knock out bands 2 and 5 (0-based) before the step
        x[2] = -9999.0;
        x[5] = -9999.0;
        let s = samples(&x);
        assert_eq!(s.len(), 18);
        match detect_change_point(&s, 5, 0.05) {
            ChangePointOutcome::Change { position, .. } => assert_eq!(position, 10),
            other => panic!("expected a change, got {other:?}"),
        }
    }

    #[test]
    fn test_change_at_first_position_is_not_zero() {
        let mut x = vec![0.0];
        x.extend(vec![50.0; 40]);
        let r = pettitt_test(&x).unwrap();
        assert_eq!(r.change_point, 0);
        assert_eq!(r.u_max, -40.0);

        // a first-band change encodes as 1, never as the reserved 0
        let first = ChangePointOutcome::Change {
            position: 1,
            p_value: 0.01,
        };
        assert_eq!(first.encode(-9999.0), 1.0);
    }
}
