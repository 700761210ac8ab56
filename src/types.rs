use geo::{MultiPolygon, Point};
use serde::Serialize;

/// One census tract of the selected county.
#[derive(Debug, Clone)]
pub struct Tract {
    /// 6-digit tract code (`TRACTCE`), unique within the county.
    pub code: String,
    /// Tract name in decimal notation, e.g. "1200.01".
    pub name: String,
    pub geometry: MultiPolygon<f64>,
    /// Internal point published with the shapefile (`INTPTLAT`/`INTPTLON`).
    pub centroid: Point<f64>,
}

/// Raw coordinate pair returned by the nearby-places search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointOfInterest {
    pub latitude: f64,
    pub longitude: f64,
}

/// A point of interest resolved to the tract containing it. Points that fall
/// outside every tract polygon are dropped during assignment, so every value
/// of this type names a real tract.
#[derive(Debug, Clone)]
pub struct AssignedPoint {
    pub point: PointOfInterest,
    pub tract_name: String,
}

/// One row of the final feature table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRow {
    pub geography: String,
    pub total_pop: u64,
    pub sex_ratio: f64,
    pub old_age_dep_ratio: f64,
    pub child_dep_ratio: f64,
    pub total_hispanic_latino: u64,
    pub household_med_income: i64,
    pub centroid_lat: f64,
    pub centroid_long: f64,
    pub has_target_business: bool,
}
