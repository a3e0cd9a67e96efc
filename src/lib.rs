//! Command line front end for the `gravewalk_core` guidance engine.

pub mod config;
pub mod replay;

use std::{fs, path::Path};

use anyhow::{Context, Result, bail};
use geo::{Coord, coord};
use gravewalk_core::{GeoFeature, Guide};

pub use config::Settings;

/// Loads a `GeoJSON` feature file into a guide backed by an in-memory store
pub fn load_guide(features: &Path, settings: &Settings) -> Result<Guide> {
    let raw = fs::read_to_string(features)
        .with_context(|| format!("reading {}", features.display()))?;
    let drafts = gravewalk_core::load_feature_collection(&raw)
        .with_context(|| format!("loading features from {}", features.display()))?;
    tracing::info!("Loaded {} features from {}", drafts.len(), features.display());
    Ok(Guide::with_memory_store(drafts, settings.guidance.clone())?)
}

/// Resolves `--to`: an id or exact name first, then a unique partial name match
pub fn resolve_destination(guide: &Guide, query: &str) -> Result<GeoFeature> {
    if let Some(feature) = guide.find_feature(query) {
        return Ok(feature);
    }
    let mut matches = guide.search_features(query);
    match matches.len() {
        0 => bail!("no feature matches `{query}`"),
        1 => Ok(matches.remove(0)),
        n => {
            let candidates = matches
                .iter()
                .map(|f| format!("{} ({})", f.name(), f.id.0))
                .collect::<Vec<_>>()
                .join(", ");
            bail!("`{query}` matches {n} features: {candidates}")
        }
    }
}

/// Parses `lon,lat`
pub fn parse_lon_lat(input: &str) -> Result<Coord<f64>> {
    let Some((lon, lat)) = input.split_once(',') else {
        bail!("expected `lon,lat`, got `{input}`");
    };
    let lon: f64 = lon.trim().parse().context("invalid longitude")?;
    let lat: f64 = lat.trim().parse().context("invalid latitude")?;
    if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
        bail!("`{input}` is not a valid longitude/latitude pair");
    }
    Ok(coord! { x: lon, y: lat })
}
