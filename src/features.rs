use anyhow::{anyhow, Result};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::str::FromStr;
use tracing::warn;

use crate::error::PipelineError;
use crate::normalize::NormalizedTable;
use crate::tracts::name_to_key;
use crate::types::{AssignedPoint, FeatureRow};

/// Field values of one merged row, looked up by canonical column name.
pub type MergedRow = HashMap<&'static str, String>;

/// Inner-join normalized tables on the canonical key. A key missing from any
/// one table drops out entirely: partial demographic data is unusable. The
/// surviving row set does not depend on the order the tables are given in.
pub fn merge_tables(tables: &[NormalizedTable]) -> Result<BTreeMap<String, MergedRow>> {
    let (first, _) = tables
        .split_first()
        .ok_or_else(|| anyhow!("No tables to merge"))?;

    let lookups: Vec<HashMap<&String, &Vec<String>>> = tables
        .iter()
        .map(|table| table.rows.iter().map(|(key, values)| (key, values)).collect())
        .collect();

    let mut merged = BTreeMap::new();
    for (key, _) in &first.rows {
        if !lookups.iter().all(|lookup| lookup.contains_key(key)) {
            continue;
        }
        let mut fields = MergedRow::new();
        for (table, lookup) in tables.iter().zip(&lookups) {
            for (column, value) in table.columns.iter().zip(lookup[key].iter()) {
                fields.insert(*column, value.clone());
            }
        }
        merged.insert(key.clone(), fields);
    }
    Ok(merged)
}

/// Assemble the final feature table from the normalized sources and the
/// resolved point-of-interest set. Pass an empty slice for `points` to run
/// without the places enrichment; the label stays false everywhere.
///
/// Rows with a total population of zero are dropped. Any unparseable numeric
/// value aborts the whole build rather than silently dropping the row, since
/// it signals upstream data corruption.
pub fn build(tables: &[NormalizedTable], points: &[AssignedPoint]) -> Result<Vec<FeatureRow>> {
    let merged = merge_tables(tables)?;
    let labeled = labeled_keys(points);

    let mut rows = Vec::with_capacity(merged.len());
    for (geography, fields) in &merged {
        let total_pop: u64 = parse_field(fields, "total_pop", geography)?;
        if total_pop == 0 {
            continue;
        }
        rows.push(FeatureRow {
            geography: geography.clone(),
            total_pop,
            sex_ratio: parse_field(fields, "sex_ratio", geography)?,
            old_age_dep_ratio: parse_field(fields, "old_age_dep_ratio", geography)?,
            child_dep_ratio: parse_field(fields, "child_dep_ratio", geography)?,
            total_hispanic_latino: parse_field(fields, "total_hispanic_latino", geography)?,
            household_med_income: parse_field(fields, "household_med_income", geography)?,
            centroid_lat: parse_field(fields, "centroid_lat", geography)?,
            centroid_long: parse_field(fields, "centroid_long", geography)?,
            has_target_business: labeled.contains(geography),
        });
    }
    Ok(rows)
}

/// Canonical keys of every tract holding at least one assigned point. Tract
/// names that are not numeric carry no key; those points are skipped with a
/// warning rather than failing the build.
fn labeled_keys(points: &[AssignedPoint]) -> HashSet<String> {
    let mut keys = HashSet::new();
    for assigned in points {
        match name_to_key(&assigned.tract_name) {
            Some(key) => {
                keys.insert(key);
            }
            None => warn!(
                "tract name '{}' is not numeric; skipping point ({}, {})",
                assigned.tract_name, assigned.point.latitude, assigned.point.longitude
            ),
        }
    }
    keys
}

fn parse_field<T: FromStr>(
    fields: &MergedRow,
    field: &'static str,
    geography: &str,
) -> Result<T, PipelineError> {
    let raw = fields.get(field).map(String::as_str).unwrap_or("");
    raw.trim().parse().map_err(|_| PipelineError::TypeCoercion {
        field,
        value: raw.to_string(),
        geography: geography.to_string(),
    })
}
