use chrono::{SecondsFormat, Utc};
use gdal::Dataset;
use gdal::Metadata;
use std::collections::HashMap;

use crate::io::GdalError;
use crate::types::{Statistic, TileId};

pub const KEY_TILE_ROW: &str = "TILE_ROW";
pub const KEY_TILE_COL: &str = "TILE_COL";
pub const KEY_STATISTIC: &str = "STATISTIC";
pub const KEY_CREATED: &str = "CREATED";
pub const KEY_SOFTWARE: &str = "SOFTWARE";

/// Default-domain tags describing where a tile came from and what it holds
pub fn tile_metadata_fields(id: TileId, statistic: Option<Statistic>) -> HashMap<String, String> {
    let mut metadata = HashMap::new();
    metadata.insert(KEY_TILE_ROW.to_string(), id.row.to_string());
    metadata.insert(KEY_TILE_COL.to_string(), id.col.to_string());
    if let Some(stat) = statistic {
        metadata.insert(KEY_STATISTIC.to_string(), stat.dir_name().to_string());
    }
    metadata.insert(
        KEY_CREATED.to_string(),
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    );
    metadata.insert(
        KEY_SOFTWARE.to_string(),
        format!("tiletrend {}", env!("CARGO_PKG_VERSION")),
    );
    metadata
}

pub fn embed_tiff_metadata(
    ds: &mut Dataset,
    metadata: &HashMap<String, String>,
) -> Result<(), GdalError> {
    for (key, value) in metadata {
        ds.set_metadata_item(key, value, "")?;
    }
    Ok(())
}

/// Grid coordinates recorded by `tile_metadata_fields`, if both are present
pub fn tile_id_from_metadata(metadata: &HashMap<String, String>) -> Option<TileId> {
    let row = metadata.get(KEY_TILE_ROW)?.parse().ok()?;
    let col = metadata.get(KEY_TILE_COL)?.parse().ok()?;
    Some(TileId::new(row, col))
}
