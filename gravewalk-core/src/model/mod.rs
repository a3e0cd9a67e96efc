//! Data model for cemetery guidance
//!
//! Contains stored map features and the routable path network derived from them.

pub mod feature;
pub mod paths;

pub use feature::{
    FeatureDraft, FeatureGeometry, FeatureId, FeatureKind, FeaturePatch, FeatureProperties,
    GeoFeature,
};
pub use paths::{IndexedPoint, PathEdge, PathGraph, PathNode};
