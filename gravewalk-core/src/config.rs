use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Meters};

/// Tolerances used by graph building, planning and progress tracking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuidanceConfig {
    /// Raw path coordinates closer than this collapse into one graph node
    pub snap_tolerance: Meters,
    /// Furthest a visitor or destination may be from a path node and still be routed
    pub max_snap_distance: Meters,
    /// Distance from the active route that triggers a re-plan
    pub deviation_threshold: Meters,
    /// Distance from the destination at which the visitor has arrived
    pub arrival_tolerance: Meters,
    /// Heading changes up to this many degrees do not produce a turn step
    pub straight_tolerance_deg: f64,
    #[serde(rename = "plan_timeout_ms", with = "millis")]
    pub plan_timeout: Duration,
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            snap_tolerance: 1.5,
            max_snap_distance: 40.0,
            deviation_threshold: 15.0,
            arrival_tolerance: 5.0,
            straight_tolerance_deg: 20.0,
            plan_timeout: Duration::from_millis(250),
        }
    }
}

impl GuidanceConfig {
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if any tolerance is not a positive finite number
    pub fn validate(&self) -> Result<(), Error> {
        let distances = [
            ("snap_tolerance", self.snap_tolerance),
            ("max_snap_distance", self.max_snap_distance),
            ("deviation_threshold", self.deviation_threshold),
            ("arrival_tolerance", self.arrival_tolerance),
        ];
        for (name, value) in distances {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::Validation(format!(
                    "{name} must be a positive distance, got {value}"
                )));
            }
        }

        if !(self.straight_tolerance_deg > 0.0 && self.straight_tolerance_deg < 180.0) {
            return Err(Error::Validation(format!(
                "straight_tolerance_deg must be between 0 and 180, got {}",
                self.straight_tolerance_deg
            )));
        }

        if self.plan_timeout.is_zero() {
            return Err(Error::Validation("plan_timeout_ms must be above zero".to_string()));
        }

        Ok(())
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
