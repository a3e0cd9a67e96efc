pub use crate::{
    Error, GuidanceConfig, Meters,
    guidance::{GuidanceState, Phase, SampleOutcome, Session, SessionWorker},
    guide::Guide,
    loading::{GraphHandle, build_path_graph, load_feature_collection},
    model::{
        FeatureDraft, FeatureGeometry, FeatureId, FeatureKind, FeaturePatch, FeatureProperties,
        GeoFeature, PathGraph,
    },
    routing::{Maneuver, Route, RouteStep, plan},
    store::{FeatureStore, MemoryStore},
};
