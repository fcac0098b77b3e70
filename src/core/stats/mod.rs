//! Per-pixel time-series statistics. Pure functions over one pixel's valid
//! samples; no I/O and no shared state.
pub mod pettitt;
pub mod series;
pub mod smoothing;
pub mod trend;

pub use pettitt::{ChangePointOutcome, PettittResult, detect_change_point, pettitt_test};
pub use series::{Nodata, ValidSamples};
pub use smoothing::SeriesSmoother;
pub use trend::{TrendResult, sens_slope, trend_test};
