use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    /// Optional: without it the pipeline runs unlabeled (all-false label).
    pub places: Option<PlacesConfig>,
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub sex_age_csv: PathBuf,
    pub race_csv: PathBuf,
    pub income_csv: PathBuf,
    /// Tract polygons, either a .shp or a GeoJSON FeatureCollection.
    pub tract_geometry: PathBuf,
    /// County FIPS code the tract set is filtered to.
    #[serde(default = "default_county_fips")]
    pub county_fips: String,
}

// Bexar County, TX
fn default_county_fips() -> String {
    "029".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlacesConfig {
    /// "lat,long" center of the search circle.
    pub location: String,
    /// Search radius in meters.
    pub radius_m: u32,
    /// Business type to search for, e.g. "yoga studio".
    pub keyword: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

impl PlacesConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub feature_table: PathBuf,
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn parses_full_config_and_applies_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[input]
sex_age_csv = "sex_and_age.csv"
race_csv = "race.csv"
income_csv = "income.csv"
tract_geometry = "tl_rd22_48_tract/tl_rd22_48_tract.shp"

[places]
location = "29.4241,-98.4936"
radius_m = 50000
keyword = "yoga studio"

[output]
feature_table = "features.csv"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(config.input.county_fips, "029");
        let places = config.places.expect("places section present");
        assert_eq!(places.keyword, "yoga studio");
        assert_eq!(places.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn places_section_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[input]
sex_age_csv = "a.csv"
race_csv = "b.csv"
income_csv = "c.csv"
tract_geometry = "tracts.geojson"
county_fips = "031"

[output]
feature_table = "out.csv"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from_file(&path).unwrap();
        assert!(config.places.is_none());
        assert_eq!(config.input.county_fips, "031");
    }
}
