use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use geo::Point;
use std::path::PathBuf;
use tracing::warn;

use sitescout::config::{AppConfig, PlacesConfig};
use sitescout::places::PlacesClient;
use sitescout::tracts::TractIndex;
use sitescout::types::{AssignedPoint, PointOfInterest};
use sitescout::{export, features, normalize};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the per-tract feature table
    Build {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Look up the census tract containing a coordinate
    Locate {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        #[arg(long)]
        lat: f64,
        #[arg(long)]
        lon: f64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Build { config } => {
            let app_config = AppConfig::load_from_file(config)?;

            // 1. Normalize the census extracts
            let sex_age = normalize::normalize(&normalize::SEX_AGE, &app_config.input.sex_age_csv)?;
            let race = normalize::normalize(&normalize::RACE, &app_config.input.race_csv)?;
            let income = normalize::normalize(&normalize::INCOME, &app_config.input.income_csv)?;
            println!(
                "Normalized extracts: {} sex/age, {} race, {} income rows",
                sex_age.rows.len(),
                race.rows.len(),
                income.rows.len()
            );

            // 2. Load tract geometry
            let index = TractIndex::load(
                &app_config.input.tract_geometry,
                &app_config.input.county_fips,
            )?;
            println!(
                "Loaded {} tract polygons for county {}",
                index.len(),
                app_config.input.county_fips
            );

            // 3. Points of interest (optional; failure degrades to an unlabeled table)
            let assigned = fetch_assigned_points(&app_config, &index);

            // 4. Build and export the feature table
            let tables = vec![sex_age, race, income, index.centroid_table()];
            let rows = features::build(&tables, &assigned)?;
            export::write_feature_table(&app_config.output.feature_table, &rows)?;
            println!(
                "Wrote {} feature rows to {:?}",
                rows.len(),
                app_config.output.feature_table
            );
        }
        Commands::Locate { config, lat, lon } => {
            let app_config = AppConfig::load_from_file(config)?;
            let index = TractIndex::load(
                &app_config.input.tract_geometry,
                &app_config.input.county_fips,
            )?;
            match index.find_containing(Point::new(*lon, *lat)) {
                Some(tract) => {
                    println!("({lat}, {lon}) is in tract {} ({})", tract.code, tract.name)
                }
                None => println!(
                    "({lat}, {lon}) is not in any tract of county {}",
                    app_config.input.county_fips
                ),
            }
        }
    }

    Ok(())
}

/// Run the places search and tract assignment. Any failure here only costs
/// the label column: the run continues with an empty assignment set and the
/// degraded mode is surfaced as a warning.
fn fetch_assigned_points(config: &AppConfig, index: &TractIndex) -> Vec<AssignedPoint> {
    let Some(places_config) = &config.places else {
        warn!("no [places] configuration; has_target_business will be false everywhere");
        return Vec::new();
    };

    match search_places(places_config) {
        Ok(points) => {
            println!("Places search returned {} points", points.len());
            let assigned = index.assign_points(&points);
            println!("{} points resolved to a tract", assigned.len());
            assigned
        }
        Err(err) => {
            warn!(
                "places enrichment unavailable ({err:#}); has_target_business will be false everywhere"
            );
            Vec::new()
        }
    }
}

fn search_places(config: &PlacesConfig) -> Result<Vec<PointOfInterest>> {
    let api_key = places_api_key()?;
    let client = PlacesClient::new(api_key, config.timeout())?;
    Ok(client.search(config)?)
}

/// The credential comes from the environment (`.env` supported) and is
/// handed to the client explicitly.
fn places_api_key() -> Result<String> {
    dotenvy::dotenv().ok();
    std::env::var("PLACES_API_KEY").context("PLACES_API_KEY is not set")
}
