//! End-to-end pipeline test over on-disk fixtures: three census extracts,
//! a tract GeoJSON, and a fixture point-of-interest list.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use sitescout::features;
use sitescout::normalize;
use sitescout::tracts::TractIndex;
use sitescout::types::{FeatureRow, PointOfInterest};

const SEX_AGE_CSV: &str = "\
GEO_ID,NAME,S0101_C01_001E,S0101_C01_033E,S0101_C01_035E,S0101_C01_036E
Geography,Geographic Area Name,Estimate!!Total!!Total population,Estimate!!Total!!Total population!!SUMMARY INDICATORS!!Sex ratio (males per 100 females),Estimate!!Total!!Total population!!SUMMARY INDICATORS!!Old-age dependency ratio,Estimate!!Total!!Total population!!SUMMARY INDICATORS!!Child dependency ratio
id,name,a,b,c,d
1400000US48029110100,\"Census Tract 1101, Bexar County, Texas\",4781,96.5,21.4,35.9
1400000US48029120001,\"Census Tract 1200.01, Bexar County, Texas\",3200,101.2,18.0,41.3
1400000US48029130000,\"Census Tract 1300, Bexar County, Texas\",0,90.0,10.0,10.0
1400000US48029999999,\"Census Tract 9999.99, Bexar County, Texas\",500,99.0,20.0,30.0
";

const RACE_CSV: &str = "\
GEO_ID,NAME,P2_002N
Geography,Geographic Area Name, !!Total:!!Hispanic or Latino
id,name,a
1400000US48029110100,\"Census Tract 1101, Bexar County, Texas\",2900
1400000US48029120001,\"Census Tract 1200.01, Bexar County, Texas\",1850
1400000US48029130000,\"Census Tract 1300, Bexar County, Texas\",0
1400000US48029888888,\"Census Tract 8888.88, Bexar County, Texas\",10
";

const INCOME_CSV: &str = "\
GEO_ID,NAME,S1901_C01_012E
Geography,Geographic Area Name,Estimate!!Households!!Median income (dollars)
id,name,a
1400000US48029110100,\"Census Tract 1101, Bexar County, Texas\",66326
1400000US48029120001,\"Census Tract 1200.01, Bexar County, Texas\",48750
1400000US48029130000,\"Census Tract 1300, Bexar County, Texas\",52000
1400000US48029777777,\"Census Tract 7777.77, Bexar County, Texas\",100000
";

// Three unit-square tracts in county 029 plus one in county 031 that the
// loader must filter out.
const TRACTS_GEOJSON: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {
      "type": "Feature",
      "properties": {"COUNTYFP": "029", "TRACTCE": "110100", "NAME": "1101",
                     "INTPTLAT": "+0.5000000", "INTPTLON": "+0.5000000"},
      "geometry": {"type": "Polygon",
                   "coordinates": [[[0.0,0.0],[1.0,0.0],[1.0,1.0],[0.0,1.0],[0.0,0.0]]]}
    },
    {
      "type": "Feature",
      "properties": {"COUNTYFP": "029", "TRACTCE": "120001", "NAME": "1200.01",
                     "INTPTLAT": "+0.5000000", "INTPTLON": "+2.5000000"},
      "geometry": {"type": "Polygon",
                   "coordinates": [[[2.0,0.0],[3.0,0.0],[3.0,1.0],[2.0,1.0],[2.0,0.0]]]}
    },
    {
      "type": "Feature",
      "properties": {"COUNTYFP": "029", "TRACTCE": "130000", "NAME": "1300",
                     "INTPTLAT": "+0.5000000", "INTPTLON": "+6.5000000"},
      "geometry": {"type": "Polygon",
                   "coordinates": [[[6.0,0.0],[7.0,0.0],[7.0,1.0],[6.0,1.0],[6.0,0.0]]]}
    },
    {
      "type": "Feature",
      "properties": {"COUNTYFP": "031", "TRACTCE": "200000", "NAME": "2000",
                     "INTPTLAT": "+0.5000000", "INTPTLON": "+8.5000000"},
      "geometry": {"type": "Polygon",
                   "coordinates": [[[8.0,0.0],[9.0,0.0],[9.0,1.0],[8.0,1.0],[8.0,0.0]]]}
    }
  ]
}"#;

fn write_fixture(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn fixtures_produce_a_labeled_two_row_feature_table() {
    let dir = tempfile::tempdir().unwrap();
    let sex_age_path = write_fixture(dir.path(), "sex_and_age.csv", SEX_AGE_CSV);
    let race_path = write_fixture(dir.path(), "race.csv", RACE_CSV);
    let income_path = write_fixture(dir.path(), "income.csv", INCOME_CSV);
    let tracts_path = write_fixture(dir.path(), "tracts.geojson", TRACTS_GEOJSON);

    let sex_age = normalize::normalize(&normalize::SEX_AGE, &sex_age_path).unwrap();
    let race = normalize::normalize(&normalize::RACE, &race_path).unwrap();
    let income = normalize::normalize(&normalize::INCOME, &income_path).unwrap();
    assert_eq!(sex_age.rows.len(), 4);

    let index = TractIndex::load(&tracts_path, "029").unwrap();
    // The county-031 tract must not survive loading.
    assert_eq!(index.len(), 3);

    // One point inside tract 1101, one far outside the county.
    let points = vec![
        PointOfInterest {
            latitude: 0.5,
            longitude: 0.5,
        },
        PointOfInterest {
            latitude: 40.0,
            longitude: -74.0,
        },
    ];
    let assigned = index.assign_points(&points);
    assert_eq!(assigned.len(), 1);
    assert_eq!(assigned[0].tract_name, "1101");

    let tables = vec![sex_age, race, income, index.centroid_table()];
    let rows = features::build(&tables, &assigned).unwrap();

    // Keys missing from any one source drop out (999999 / 888888 / 777777),
    // and the zero-population tract 130000 is excluded.
    assert_eq!(rows.len(), 2);
    let by_key: HashMap<&str, &FeatureRow> =
        rows.iter().map(|row| (row.geography.as_str(), row)).collect();

    let labeled = &by_key["110100"];
    assert!(labeled.has_target_business);
    assert_eq!(labeled.total_pop, 4781);
    assert_eq!(labeled.total_hispanic_latino, 2900);
    assert_eq!(labeled.household_med_income, 66326);
    assert_eq!(labeled.centroid_lat, 0.5);
    assert_eq!(labeled.centroid_long, 0.5);

    let unlabeled = &by_key["120001"];
    assert!(!unlabeled.has_target_business);
    assert_eq!(unlabeled.centroid_long, 2.5);
}

#[test]
fn degraded_run_without_points_keeps_the_demographic_table() {
    let dir = tempfile::tempdir().unwrap();
    let sex_age_path = write_fixture(dir.path(), "sex_and_age.csv", SEX_AGE_CSV);
    let race_path = write_fixture(dir.path(), "race.csv", RACE_CSV);
    let income_path = write_fixture(dir.path(), "income.csv", INCOME_CSV);
    let tracts_path = write_fixture(dir.path(), "tracts.geojson", TRACTS_GEOJSON);

    let tables = vec![
        normalize::normalize(&normalize::SEX_AGE, &sex_age_path).unwrap(),
        normalize::normalize(&normalize::RACE, &race_path).unwrap(),
        normalize::normalize(&normalize::INCOME, &income_path).unwrap(),
        TractIndex::load(&tracts_path, "029").unwrap().centroid_table(),
    ];

    let rows = features::build(&tables, &[]).unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| !row.has_target_business));
}

#[test]
fn tract_centroids_resolve_to_their_own_tract() {
    let dir = tempfile::tempdir().unwrap();
    let tracts_path = write_fixture(dir.path(), "tracts.geojson", TRACTS_GEOJSON);

    let index = TractIndex::load(&tracts_path, "029").unwrap();
    for tract in index.tracts() {
        let found = index.find_containing(tract.centroid).expect("contained");
        assert_eq!(found.code, tract.code);
    }
}
