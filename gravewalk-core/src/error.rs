use std::time::Duration;

use thiserror::Error;

use crate::model::FeatureId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid feature: {0}")]
    Validation(String),
    #[error("No walking paths available")]
    EmptyGraph,
    #[error("No route available: {0}")]
    Unreachable(String),
    #[error("Route search did not finish within {0:?}")]
    PlanTimeout(Duration),
    #[error("Feature {0} not found")]
    NotFound(FeatureId),
    #[error("Current position is unknown")]
    PositionUnknown,
    #[error("GeoJSON error: {0}")]
    GeoJson(String),
}
