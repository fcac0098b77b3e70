//! Shared types and enums used across tiletrend.
//! Includes `Statistic`, `Analysis`, `RasterDataType` and the `TileId` grid key.
use clap::ValueEnum;
use gdal::raster::GdalDataType;
use serde::{Deserialize, Serialize};

/// One per-pixel output raster. Each statistic is written to its own directory.
#[derive(
    Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Debug, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    /// Mann-Kendall Z statistic
    MkZ,
    /// Sen's slope estimator
    SenSlope,
    /// Two-sided Mann-Kendall p-value
    MkP,
    /// Kendall's tau
    KendallTau,
    /// Sen's intercept
    SenIntercept,
    /// Pettitt change-point position (0 = no significant change)
    Pettitt,
    /// Pettitt p-value
    PettittP,
}

impl Statistic {
    pub const ALL: [Statistic; 7] = [
        Statistic::MkZ,
        Statistic::SenSlope,
        Statistic::MkP,
        Statistic::KendallTau,
        Statistic::SenIntercept,
        Statistic::Pettitt,
        Statistic::PettittP,
    ];

    /// Directory name under an analysis output root
    pub fn dir_name(&self) -> &'static str {
        match self {
            Statistic::MkZ => "mk_z",
            Statistic::SenSlope => "sen_slope",
            Statistic::MkP => "mk_p",
            Statistic::KendallTau => "kendall_tau",
            Statistic::SenIntercept => "sen_intercept",
            Statistic::Pettitt => "pettitt",
            Statistic::PettittP => "pettitt_p",
        }
    }

    /// File prefix for per-tile outputs (`<prefix>_<row>_<col>.tif`)
    pub fn file_prefix(&self) -> &'static str {
        match self {
            Statistic::MkZ => "mk",
            Statistic::SenSlope => "sen",
            Statistic::MkP => "mkp",
            Statistic::KendallTau => "tau",
            Statistic::SenIntercept => "intercept",
            Statistic::Pettitt => "pettitt",
            Statistic::PettittP => "pettittp",
        }
    }

    pub fn analysis(&self) -> Analysis {
        match self {
            Statistic::MkZ
            | Statistic::SenSlope
            | Statistic::MkP
            | Statistic::KendallTau
            | Statistic::SenIntercept => Analysis::Trend,
            Statistic::Pettitt | Statistic::PettittP => Analysis::ChangePoint,
        }
    }
}

impl std::fmt::Display for Statistic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

/// Family of per-pixel tests run by a stats worker
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Analysis {
    Trend,
    ChangePoint,
}

impl Analysis {
    /// Statistics written when the caller does not choose any
    pub fn default_statistics(&self) -> Vec<Statistic> {
        match self {
            Analysis::Trend => vec![Statistic::MkZ, Statistic::SenSlope],
            Analysis::ChangePoint => vec![Statistic::Pettitt],
        }
    }
}

impl std::fmt::Display for Analysis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Analysis::Trend => write!(f, "Trend"),
            Analysis::ChangePoint => write!(f, "ChangePoint"),
        }
    }
}

/// Pixel types carried through splitting and mosaicking without conversion.
/// Anything GDAL reports outside this set is widened to `Float64`.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum RasterDataType {
    UInt8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float32,
    Float64,
}

impl From<GdalDataType> for RasterDataType {
    fn from(value: GdalDataType) -> Self {
        match value {
            GdalDataType::UInt8 => RasterDataType::UInt8,
            GdalDataType::UInt16 => RasterDataType::UInt16,
            GdalDataType::Int16 => RasterDataType::Int16,
            GdalDataType::UInt32 => RasterDataType::UInt32,
            GdalDataType::Int32 => RasterDataType::Int32,
            GdalDataType::Float32 => RasterDataType::Float32,
            _ => RasterDataType::Float64,
        }
    }
}

impl std::fmt::Display for RasterDataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RasterDataType::UInt8 => "UInt8",
            RasterDataType::UInt16 => "UInt16",
            RasterDataType::Int16 => "Int16",
            RasterDataType::UInt32 => "UInt32",
            RasterDataType::Int32 => "Int32",
            RasterDataType::Float32 => "Float32",
            RasterDataType::Float64 => "Float64",
        };
        write!(f, "{}", s)
    }
}

/// Grid coordinates of a tile in the split grid. Orders row-major.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct TileId {
    pub row: usize,
    pub col: usize,
}

impl TileId {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl std::fmt::Display for TileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.row, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_id_order_is_row_major() {
        let mut ids = vec![TileId::new(1, 0), TileId::new(0, 2), TileId::new(0, 1)];
        ids.sort();
        assert_eq!(
            ids,
            vec![TileId::new(0, 1), TileId::new(0, 2), TileId::new(1, 0)]
        );
        assert_eq!(TileId::new(3, 12).to_string(), "3_12");
    }

    #[test]
    fn test_statistic_analysis_groups() {
        for stat in Statistic::ALL {
            let expected = matches!(stat, Statistic::Pettitt | Statistic::PettittP);
            assert_eq!(stat.analysis() == Analysis::ChangePoint, expected);
        }
        assert_eq!(
            Analysis::Trend.default_statistics(),
            vec![Statistic::MkZ, Statistic::SenSlope]
        );
    }

    #[test]
    fn test_unknown_gdal_type_widens() {
        assert_eq!(
            RasterDataType::from(GdalDataType::Float32),
            RasterDataType::Float32
        );
        assert_eq!(
            RasterDataType::from(GdalDataType::Unknown),
            RasterDataType::Float64
        );
    }
}
