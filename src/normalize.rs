use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, StringRecord};
use std::fs::File;
use std::path::Path;
use tracing::warn;

use crate::error::PipelineError;

/// Static description of one census extract: which columns to keep and what
/// to call them in the normalized table.
pub struct SourceSpec {
    pub name: &'static str,
    pub geography_column: &'static str,
    /// (raw census label, canonical field name)
    pub columns: &'static [(&'static str, &'static str)],
}

pub static SEX_AGE: SourceSpec = SourceSpec {
    name: "sex_and_age",
    geography_column: "Geography",
    columns: &[
        ("Estimate!!Total!!Total population", "total_pop"),
        (
            "Estimate!!Total!!Total population!!SUMMARY INDICATORS!!Sex ratio (males per 100 females)",
            "sex_ratio",
        ),
        (
            "Estimate!!Total!!Total population!!SUMMARY INDICATORS!!Old-age dependency ratio",
            "old_age_dep_ratio",
        ),
        (
            "Estimate!!Total!!Total population!!SUMMARY INDICATORS!!Child dependency ratio",
            "child_dep_ratio",
        ),
    ],
};

pub static RACE: SourceSpec = SourceSpec {
    name: "race",
    geography_column: "Geography",
    // The leading space is in the published extract.
    columns: &[(" !!Total:!!Hispanic or Latino", "total_hispanic_latino")],
};

pub static INCOME: SourceSpec = SourceSpec {
    name: "income",
    geography_column: "Geography",
    columns: &[(
        "Estimate!!Households!!Median income (dollars)",
        "household_med_income",
    )],
};

/// A source table reduced to the canonical key plus renamed columns. Values
/// stay as raw strings; casting happens when the feature table is built.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTable {
    pub source: &'static str,
    pub columns: Vec<&'static str>,
    /// (canonical key, values parallel to `columns`), in input order.
    pub rows: Vec<(String, Vec<String>)>,
}

/// Canonical join key: the last 6 characters of the raw geography string.
/// The raw value is a concatenated FIPS code ending in the tract code.
pub fn derive_key(raw: &str) -> Result<String, PipelineError> {
    let chars: Vec<char> = raw.chars().collect();
    if chars.len() < 6 {
        return Err(PipelineError::MalformedKey(raw.to_string()));
    }
    Ok(chars[chars.len() - 6..].iter().collect())
}

/// Read one census extract and project it down to the canonical columns.
///
/// The extracts carry two non-data rows around the header: physical row 1 is
/// the header, rows 0 and 2 are skipped. Rows whose geography value is too
/// short to hold a tract code are dropped with a warning; a missing expected
/// column aborts with an error.
pub fn normalize(spec: &SourceSpec, path: &Path) -> Result<NormalizedTable> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open {} extract: {:?}", spec.name, path))?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file);

    let mut header: Option<StringRecord> = None;
    let mut data = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record =
            record.with_context(|| format!("Failed to read row {} of {}", i, spec.name))?;
        match i {
            0 | 2 => continue,
            1 => header = Some(record),
            _ => data.push(record),
        }
    }
    let header = header.ok_or_else(|| anyhow!("{} extract has no header row", spec.name))?;

    let geo_idx = column_index(&header, spec.name, spec.geography_column)?;
    let mut value_indices = Vec::with_capacity(spec.columns.len());
    for &(raw_label, _) in spec.columns {
        value_indices.push(column_index(&header, spec.name, raw_label)?);
    }

    let mut rows = Vec::with_capacity(data.len());
    for record in &data {
        let raw_geography = record.get(geo_idx).unwrap_or("");
        let key = match derive_key(raw_geography) {
            Ok(key) => key,
            Err(err) => {
                warn!("{}: {err}; dropping row", spec.name);
                continue;
            }
        };
        let values = value_indices
            .iter()
            .map(|&idx| record.get(idx).unwrap_or("").to_string())
            .collect();
        rows.push((key, values));
    }

    Ok(NormalizedTable {
        source: spec.name,
        columns: spec.columns.iter().map(|(_, canonical)| *canonical).collect(),
        rows,
    })
}

fn column_index(
    header: &StringRecord,
    table: &'static str,
    column: &'static str,
) -> Result<usize> {
    header
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| PipelineError::SchemaMismatch { table, column }.into())
}
