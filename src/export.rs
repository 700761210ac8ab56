use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;

use crate::types::FeatureRow;

/// Write the feature table as CSV for downstream consumption.
pub fn write_feature_table(path: &Path, rows: &[FeatureRow]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file: {:?}", path))?;
    let mut writer = csv::Writer::from_writer(file);
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("Failed to write row for tract {}", row.geography))?;
    }
    writer.flush().context("Failed to flush output file")?;
    Ok(())
}
