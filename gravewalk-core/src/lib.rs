//! Walking route guidance over the mapped paths of a cemetery.
//!
//! Path features from a [`store::FeatureStore`] are turned into a routable
//! [`PathGraph`], routes to a grave or landmark are planned over it, and a
//! [`Session`] follows a visitor's position samples until arrival.

mod config;
mod error;
pub mod geometry;
pub mod guidance;
mod guide;
pub mod loading;
pub mod model;
pub mod prelude;
pub mod routing;
pub mod store;

pub use config::GuidanceConfig;
pub use error::Error;
pub use guidance::{GuidanceState, Phase, SampleOutcome, Session, SessionWorker};
pub use guide::Guide;
pub use loading::{GraphHandle, build_path_graph, load_feature_collection};
pub use model::{
    FeatureDraft, FeatureGeometry, FeatureId, FeatureKind, FeaturePatch, FeatureProperties,
    GeoFeature, PathGraph,
};
pub use routing::{Maneuver, Route, RouteStep, plan};

/// Distance in meters
pub type Meters = f64;
