use anyhow::{anyhow, Context, Result};
use geo::{BoundingRect, Intersects, MultiPolygon, Point};
use rayon::prelude::*;
use rstar::{RTree, RTreeObject, AABB};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::warn;

use crate::normalize::NormalizedTable;
use crate::types::{AssignedPoint, PointOfInterest, Tract};

// Attribute names in TIGER/Line tract files.
const COUNTY_FIELD: &str = "COUNTYFP";
const CODE_FIELD: &str = "TRACTCE";
const NAME_FIELD: &str = "NAME";
const LAT_FIELD: &str = "INTPTLAT";
const LON_FIELD: &str = "INTPTLON";

struct TractEnvelope {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for TractEnvelope {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

/// One county's tract polygons with a bounding-box index for point lookups.
/// Read-only after construction.
pub struct TractIndex {
    tracts: Vec<Tract>,
    tree: RTree<TractEnvelope>,
}

impl TractIndex {
    /// Load tract polygons from a shapefile or GeoJSON FeatureCollection,
    /// keeping only tracts of the given county.
    pub fn load(path: &Path, county_fips: &str) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|s: &str| s.to_lowercase())
            .ok_or_else(|| anyhow!("Tract geometry file has no extension"))?;

        let tracts = match extension.as_str() {
            "shp" => load_shapefile(path, county_fips)?,
            "json" | "geojson" => load_geojson(path, county_fips)?,
            _ => return Err(anyhow!("Unsupported geometry format: {}", extension)),
        };

        if tracts.is_empty() {
            return Err(anyhow!(
                "No tract polygons found for county {} in {:?}",
                county_fips,
                path
            ));
        }

        Ok(Self::from_tracts(tracts))
    }

    pub fn from_tracts(tracts: Vec<Tract>) -> Self {
        let items: Vec<TractEnvelope> = tracts
            .iter()
            .enumerate()
            .filter_map(|(i, tract)| {
                let rect = tract.geometry.bounding_rect()?;
                Some(TractEnvelope {
                    index: i,
                    aabb: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                })
            })
            .collect();
        let tree = RTree::bulk_load(items);
        Self { tracts, tree }
    }

    pub fn len(&self) -> usize {
        self.tracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracts.is_empty()
    }

    pub fn tracts(&self) -> &[Tract] {
        &self.tracts
    }

    /// The tract whose polygon contains the point, boundary included.
    ///
    /// A valid tract set partitions the county, so more than one match is a
    /// data-quality problem: it is logged and the first match wins.
    pub fn find_containing(&self, point: Point<f64>) -> Option<&Tract> {
        let envelope = AABB::from_point([point.x(), point.y()]);
        let mut matches = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .filter_map(|candidate| self.tracts.get(candidate.index))
            .filter(|tract| tract.geometry.intersects(&point));

        let first = matches.next()?;
        let extra = matches.count();
        if extra > 0 {
            warn!(
                "point ({}, {}) is contained by {} tract polygons; keeping tract {}",
                point.y(),
                point.x(),
                extra + 1,
                first.code
            );
        }
        Some(first)
    }

    /// Resolve each point to its containing tract. Points outside every
    /// tract polygon are dropped. The index is immutable, so assignment is
    /// safe to run across points in parallel and order-independent.
    pub fn assign_points(&self, points: &[PointOfInterest]) -> Vec<AssignedPoint> {
        points
            .par_iter()
            .filter_map(|point| {
                let tract = self.find_containing(Point::new(point.longitude, point.latitude))?;
                Some(AssignedPoint {
                    point: *point,
                    tract_name: tract.name.clone(),
                })
            })
            .collect()
    }

    /// Per-tract centroid coordinates, shaped like a normalized census table
    /// so the feature builder can join it on the canonical key.
    pub fn centroid_table(&self) -> NormalizedTable {
        NormalizedTable {
            source: "tract_centroids",
            columns: vec!["centroid_lat", "centroid_long"],
            rows: self
                .tracts
                .iter()
                .map(|tract| {
                    (
                        tract.code.clone(),
                        vec![
                            tract.centroid.y().to_string(),
                            tract.centroid.x().to_string(),
                        ],
                    )
                })
                .collect(),
        }
    }
}

/// Canonical key for a tract name in decimal notation: "1200.01" becomes
/// "120001" and "100" becomes "10000". Returns `None` for names that are not
/// numeric (named subdivisions); callers log the skip.
pub fn name_to_key(name: &str) -> Option<String> {
    let value: f64 = name.trim().parse().ok()?;
    Some(((value * 100.0).round() as i64).to_string())
}

fn load_shapefile(path: &Path, county_fips: &str) -> Result<Vec<Tract>> {
    let mut reader = shapefile::Reader::from_path(path)
        .with_context(|| format!("Failed to open shapefile: {:?}", path))?;

    let mut tracts = Vec::new();

    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result?;

        let county = match dbase_string(&record, COUNTY_FIELD)? {
            Some(county) => county,
            None => continue,
        };
        if county != county_fips {
            continue;
        }

        let code = dbase_string(&record, CODE_FIELD)?
            .ok_or_else(|| anyhow!("Tract record has no {} value", CODE_FIELD))?;
        let name = dbase_string(&record, NAME_FIELD)?
            .ok_or_else(|| anyhow!("Tract {} has no {} value", code, NAME_FIELD))?;
        let centroid = Point::new(
            parse_coordinate(&record, LON_FIELD, &code)?,
            parse_coordinate(&record, LAT_FIELD, &code)?,
        );

        let geometry = match shape {
            shapefile::Shape::Polygon(polygon) => {
                let geo_polygon: MultiPolygon<f64> = polygon
                    .try_into()
                    .map_err(|e| anyhow!("Failed to convert polygon: {:?}", e))?;
                geo_polygon
            }
            shapefile::Shape::PolygonM(polygon) => {
                let geo_polygon: MultiPolygon<f64> = polygon
                    .try_into()
                    .map_err(|e| anyhow!("Failed to convert polygonM: {:?}", e))?;
                geo_polygon
            }
            shapefile::Shape::PolygonZ(polygon) => {
                let geo_polygon: MultiPolygon<f64> = polygon
                    .try_into()
                    .map_err(|e| anyhow!("Failed to convert polygonZ: {:?}", e))?;
                geo_polygon
            }
            _ => continue, // Skip non-polygon shapes
        };

        tracts.push(Tract {
            code,
            name,
            geometry,
            centroid,
        });
    }

    Ok(tracts)
}

fn dbase_string(record: &shapefile::dbase::Record, field: &str) -> Result<Option<String>> {
    use shapefile::dbase::FieldValue;
    match record.get(field) {
        None => Err(anyhow!("Field '{}' not found in shapefile attributes", field)),
        Some(FieldValue::Character(value)) => Ok(value.as_ref().map(|s| s.trim().to_string())),
        Some(FieldValue::Numeric(value)) => Ok(value.map(|n| n.to_string())),
        Some(FieldValue::Float(value)) => Ok(value.map(|n| n.to_string())),
        Some(other) => Err(anyhow!(
            "Field '{}' has unsupported attribute type: {:?}",
            field,
            other
        )),
    }
}

fn parse_coordinate(
    record: &shapefile::dbase::Record,
    field: &str,
    code: &str,
) -> Result<f64> {
    let raw = dbase_string(record, field)?
        .ok_or_else(|| anyhow!("Tract {} has no {} value", code, field))?;
    raw.parse()
        .with_context(|| format!("Tract {}: cannot parse {} value '{}'", code, field, raw))
}

fn load_geojson(path: &Path, county_fips: &str) -> Result<Vec<Tract>> {
    use geojson::GeoJson;

    let file =
        File::open(path).with_context(|| format!("Failed to open GeoJSON file: {:?}", path))?;
    let reader = BufReader::new(file);
    let geojson = GeoJson::from_reader(reader).context("Failed to parse tract GeoJSON")?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(anyhow!("Tract GeoJSON must be a FeatureCollection")),
    };

    let mut tracts = Vec::new();

    for feature in collection.features {
        let county = match property_string(&feature, COUNTY_FIELD) {
            Some(county) => county,
            None => continue,
        };
        if county != county_fips {
            continue;
        }

        let code = property_string(&feature, CODE_FIELD)
            .ok_or_else(|| anyhow!("Tract feature has no {} property", CODE_FIELD))?;
        let name = property_string(&feature, NAME_FIELD)
            .ok_or_else(|| anyhow!("Tract {} has no {} property", code, NAME_FIELD))?;
        let lat: f64 = property_string(&feature, LAT_FIELD)
            .and_then(|raw| raw.parse().ok())
            .ok_or_else(|| anyhow!("Tract {} has no usable {} property", code, LAT_FIELD))?;
        let lon: f64 = property_string(&feature, LON_FIELD)
            .and_then(|raw| raw.parse().ok())
            .ok_or_else(|| anyhow!("Tract {} has no usable {} property", code, LON_FIELD))?;

        let geometry = match feature.geometry {
            Some(geometry) => {
                let valid_geo: geo::Geometry<f64> = geometry
                    .value
                    .try_into()
                    .map_err(|e| anyhow!("Failed to convert GeoJSON geometry: {:?}", e))?;
                match valid_geo {
                    geo::Geometry::MultiPolygon(mp) => mp,
                    geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
                    _ => continue, // Skip points/lines
                }
            }
            None => continue,
        };

        tracts.push(Tract {
            code,
            name,
            geometry,
            centroid: Point::new(lon, lat),
        });
    }

    Ok(tracts)
}

fn property_string(feature: &geojson::Feature, key: &str) -> Option<String> {
    match feature.properties.as_ref()?.get(key)? {
        serde_json::Value::String(s) => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
