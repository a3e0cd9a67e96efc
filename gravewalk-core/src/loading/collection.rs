use geojson::GeoJson;

use crate::{Error, model::FeatureDraft};

/// Parses a `GeoJSON` document into feature drafts.
///
/// Accepts a `FeatureCollection` or a single `Feature`; every feature must
/// carry a `name` property.
///
/// # Errors
///
/// Returns [`Error::GeoJson`] if the document does not parse and
/// [`Error::Validation`] for the first feature that is not a valid draft
pub fn load_feature_collection(input: &str) -> Result<Vec<FeatureDraft>, Error> {
    let geojson = input
        .parse::<GeoJson>()
        .map_err(|e| Error::GeoJson(e.to_string()))?;

    let features = match geojson {
        GeoJson::FeatureCollection(collection) => collection.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(_) => {
            return Err(Error::GeoJson(
                "expected a Feature or FeatureCollection, got a bare geometry".to_string(),
            ));
        }
    };

    features
        .iter()
        .enumerate()
        .map(|(idx, feature)| {
            let draft = FeatureDraft::from_geojson(feature)
                .and_then(|draft| draft.validate().map(|()| draft));
            draft.map_err(|e| match e {
                Error::Validation(msg) => Error::Validation(format!("feature #{idx}: {msg}")),
                other => other,
            })
        })
        .collect()
}
