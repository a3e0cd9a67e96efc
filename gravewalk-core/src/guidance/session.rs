use std::sync::Arc;

use chrono::{DateTime, Utc};
use geo::Coord;
use log::{info, trace, warn};
use tokio::sync::watch;

use super::state::{GuidancePublisher, GuidanceState};
use crate::{
    Error, GuidanceConfig, Meters,
    geometry::{distance_to_polyline, haversine_distance},
    loading::GraphHandle,
    model::{FeatureId, GeoFeature},
    routing::{Route, plan},
    store::FeatureStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Routing,
    Arrived,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSample {
    pub coord: Coord<f64>,
    pub timestamp: DateTime<Utc>,
}

/// What a position sample did to the session
#[derive(Debug, Clone, PartialEq)]
pub enum SampleOutcome {
    /// No active route; the position was only recorded
    Ignored,
    /// Older than the last processed sample; discarded
    Stale,
    /// Still inside the route corridor
    OnRoute { off_route: Meters },
    /// Left the corridor and got a fresh route
    Replanned,
    /// Reached the destination
    Arrived,
    /// Left the corridor and no new route could be planned
    ReplanFailed(Error),
}

/// Guidance session of one visitor
///
/// A state machine over [`Phase`]: `Idle -> Routing -> Arrived`, with cancel
/// returning to `Idle`. Every transition publishes one [`GuidanceState`]
/// snapshot. Methods take `&mut self`, so events are handled strictly one
/// at a time; see [`super::SessionWorker`] for a threaded front end.
pub struct Session {
    store: Arc<dyn FeatureStore>,
    graph: GraphHandle,
    config: GuidanceConfig,
    publisher: GuidancePublisher,
    phase: Phase,
    route: Option<Route>,
    destination: Option<GeoFeature>,
    last_sample: Option<PositionSample>,
    replan_count: usize,
}

impl Session {
    pub fn new(store: Arc<dyn FeatureStore>, graph: GraphHandle, config: GuidanceConfig) -> Self {
        Self {
            store,
            graph,
            config,
            publisher: GuidancePublisher::new(),
            phase: Phase::Idle,
            route: None,
            destination: None,
            last_sample: None,
            replan_count: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn state(&self) -> GuidanceState {
        self.publisher.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<GuidanceState> {
        self.publisher.subscribe()
    }

    /// Latest known visitor position
    pub fn position(&self) -> Option<Coord<f64>> {
        self.last_sample.map(|sample| sample.coord)
    }

    /// Re-plans since the current route was started
    pub fn replan_count(&self) -> usize {
        self.replan_count
    }

    /// Starts guiding from the latest submitted position to `destination`
    ///
    /// # Errors
    ///
    /// Returns [`Error::PositionUnknown`] if no position was submitted yet, or
    /// any planning error. The error is also published into the state.
    pub fn start_routing(&mut self, destination: FeatureId) -> Result<(), Error> {
        match self.position() {
            Some(start) => self.start_routing_from(start, destination),
            None => {
                self.fail(Error::PositionUnknown);
                Err(Error::PositionUnknown)
            }
        }
    }

    /// Starts guiding from `start` to `destination`, replacing any current session
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`], [`Error::EmptyGraph`] or a planning error.
    /// The error is also published into the state.
    pub fn start_routing_from(
        &mut self,
        start: Coord<f64>,
        destination: FeatureId,
    ) -> Result<(), Error> {
        self.route = None;
        self.destination = None;
        self.replan_count = 0;

        let planned = self.store.feature_by_id(destination).and_then(|feature| {
            let graph = self.graph.current()?;
            let route = plan(start, &feature, &graph, &self.config)?;
            Ok((feature, route))
        });

        match planned {
            Ok((feature, route)) => {
                info!(
                    "Routing to {} ({}): {:.0} m, {} steps",
                    feature.name(),
                    feature.id,
                    route.total_distance,
                    route.steps.len()
                );
                self.phase = Phase::Routing;
                self.publisher.publish(|state| {
                    state.is_routing = true;
                    state.route_coords.clone_from(&route.coordinates);
                    state.route_steps.clone_from(&route.steps);
                    state.destination_arrived = false;
                    state.within_arrival_radius = false;
                    state.error = None;
                });
                self.route = Some(route);
                self.destination = Some(feature);
                Ok(())
            }
            Err(err) => {
                self.fail(err.clone());
                Err(err)
            }
        }
    }

    /// Feeds one position sample through the tracker
    pub fn submit_position(&mut self, coord: Coord<f64>, timestamp: DateTime<Utc>) -> SampleOutcome {
        if !self.record_position(coord, timestamp) {
            return SampleOutcome::Stale;
        }

        match self.phase {
            Phase::Idle => SampleOutcome::Ignored,
            Phase::Arrived => {
                if let Some(target) = self.route.as_ref().and_then(Route::destination) {
                    let within = haversine_distance(coord, target) <= self.config.arrival_tolerance;
                    self.publisher
                        .publish(|state| state.within_arrival_radius = within);
                }
                SampleOutcome::Ignored
            }
            Phase::Routing => self.track(coord),
        }
    }

    /// Records a position without tracking it, for samples superseded by a
    /// later command
    pub(crate) fn note_position(&mut self, coord: Coord<f64>, timestamp: DateTime<Utc>) {
        self.record_position(coord, timestamp);
    }

    /// Stops guiding; the arrival latch is left as it is
    pub fn cancel_routing(&mut self) {
        if self.phase != Phase::Idle {
            info!("Routing cancelled");
        }
        self.phase = Phase::Idle;
        self.route = None;
        self.destination = None;
        self.publisher.publish(|state| {
            state.is_routing = false;
            state.route_coords.clear();
            state.route_steps.clear();
            state.within_arrival_radius = false;
        });
    }

    /// Back to the initial state, arrival latch and error included
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.route = None;
        self.destination = None;
        self.replan_count = 0;
        self.publisher
            .publish(|state| *state = GuidanceState::default());
    }

    fn record_position(&mut self, coord: Coord<f64>, timestamp: DateTime<Utc>) -> bool {
        if let Some(last) = self.last_sample
            && timestamp < last.timestamp
        {
            trace!("Dropping sample from {timestamp}, already at {}", last.timestamp);
            return false;
        }
        self.last_sample = Some(PositionSample { coord, timestamp });
        true
    }

    fn track(&mut self, coord: Coord<f64>) -> SampleOutcome {
        let Some(route) = &self.route else {
            return SampleOutcome::Ignored;
        };
        let Some(target) = route.destination() else {
            return SampleOutcome::Ignored;
        };

        let to_destination = haversine_distance(coord, target);
        if to_destination <= self.config.arrival_tolerance {
            info!(
                "Arrived at {} ({to_destination:.1} m away)",
                route.destination_name
            );
            self.phase = Phase::Arrived;
            self.publisher.publish(|state| {
                state.is_routing = false;
                state.destination_arrived = true;
                state.within_arrival_radius = true;
            });
            return SampleOutcome::Arrived;
        }

        let off_route = distance_to_polyline(coord, &route.coordinates).unwrap_or(f64::INFINITY);
        trace!("{to_destination:.1} m to go, {off_route:.1} m off route");
        if off_route <= self.config.deviation_threshold {
            return SampleOutcome::OnRoute { off_route };
        }

        self.replan(coord, off_route)
    }

    fn replan(&mut self, coord: Coord<f64>, off_route: Meters) -> SampleOutcome {
        let Some(destination) = &self.destination else {
            return SampleOutcome::Ignored;
        };
        info!(
            "Visitor is {off_route:.0} m off route, re-planning to {}",
            destination.name()
        );

        let planned = self
            .graph
            .current()
            .and_then(|graph| plan(coord, destination, &graph, &self.config));

        match planned {
            Ok(route) => {
                self.replan_count += 1;
                self.publisher.publish(|state| {
                    state.route_coords.clone_from(&route.coordinates);
                    state.route_steps.clone_from(&route.steps);
                    state.error = None;
                });
                self.route = Some(route);
                SampleOutcome::Replanned
            }
            Err(err) => {
                self.fail(err.clone());
                SampleOutcome::ReplanFailed(err)
            }
        }
    }

    fn fail(&mut self, err: Error) {
        warn!("Guidance failed: {err}");
        self.phase = Phase::Idle;
        self.route = None;
        self.destination = None;
        let message = err.to_string();
        self.publisher.publish(|state| {
            state.is_routing = false;
            state.route_coords.clear();
            state.route_steps.clear();
            state.destination_arrived = false;
            state.within_arrival_radius = false;
            state.error = Some(message);
        });
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("phase", &self.phase)
            .field("route", &self.route)
            .field("last_sample", &self.last_sample)
            .field("replan_count", &self.replan_count)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use geo::coord;

    use super::*;
    use crate::{
        model::FeatureDraft,
        store::{FeatureStore, MemoryStore},
    };

    struct Fixture {
        session: Session,
        grave: FeatureId,
    }

    /// A straight north-south path and a grave at its northern end
    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        store
            .create_feature(FeatureDraft::line(
                "Main avenue",
                vec![
                    coord! { x: 0.0, y: 0.0 },
                    coord! { x: 0.0, y: 0.001 },
                    coord! { x: 0.0, y: 0.002 },
                ],
            ))
            .unwrap();
        let grave = store
            .create_feature(FeatureDraft::point("Grave 12", coord! { x: 0.0, y: 0.002 }))
            .unwrap()
            .id;

        let graph = GraphHandle::new();
        let config = GuidanceConfig::default();
        graph.rebuild(&store.all_features(None), &config).unwrap();

        Fixture {
            session: Session::new(store, graph, config),
            grave,
        }
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap() + Duration::seconds(seconds)
    }

    #[test]
    fn starting_without_a_position_fails() {
        let Fixture { mut session, grave } = fixture();
        assert_eq!(session.start_routing(grave), Err(Error::PositionUnknown));

        let state = session.state();
        assert!(!state.is_routing);
        assert_eq!(state.error.as_deref(), Some("Current position is unknown"));
    }

    #[test]
    fn start_routing_uses_the_last_position() {
        let Fixture { mut session, grave } = fixture();
        assert_eq!(
            session.submit_position(coord! { x: 0.0, y: 0.0 }, at(0)),
            SampleOutcome::Ignored
        );
        session.start_routing(grave).unwrap();

        let state = session.state();
        assert_eq!(session.phase(), Phase::Routing);
        assert!(state.is_routing);
        assert_eq!(state.route_coords.len(), 3);
        assert_eq!(state.route_steps.len(), 2);
        assert_eq!(state.error, None);
    }

    #[test]
    fn on_corridor_samples_do_not_replan() {
        let Fixture { mut session, grave } = fixture();
        session
            .start_routing_from(coord! { x: 0.0, y: 0.0 }, grave)
            .unwrap();

        // ~5.5 m east of the avenue
        let outcome = session.submit_position(coord! { x: 0.00005, y: 0.0005 }, at(1));
        assert!(matches!(outcome, SampleOutcome::OnRoute { off_route } if off_route < 6.0));
        assert_eq!(session.replan_count(), 0);
    }

    #[test]
    fn one_deviation_replans_once() {
        let Fixture { mut session, grave } = fixture();
        session
            .start_routing_from(coord! { x: 0.0, y: 0.0 }, grave)
            .unwrap();

        // ~22 m east of the avenue
        let off = coord! { x: 0.0002, y: 0.001 };
        assert_eq!(session.submit_position(off, at(1)), SampleOutcome::Replanned);
        assert_eq!(session.route().unwrap().coordinates.first(), Some(&off));
        assert_eq!(session.state().route_coords.first(), Some(&off));

        assert!(matches!(
            session.submit_position(off, at(2)),
            SampleOutcome::OnRoute { .. }
        ));
        assert_eq!(session.replan_count(), 1);
    }

    #[test]
    fn arrival_latches() {
        let Fixture { mut session, grave } = fixture();
        session
            .start_routing_from(coord! { x: 0.0, y: 0.0 }, grave)
            .unwrap();

        assert_eq!(
            session.submit_position(coord! { x: 0.0, y: 0.00199 }, at(1)),
            SampleOutcome::Arrived
        );
        let state = session.state();
        assert_eq!(session.phase(), Phase::Arrived);
        assert!(state.destination_arrived && state.within_arrival_radius);
        assert!(!state.is_routing);
        assert!(!state.route_coords.is_empty());

        // Walking away again only lowers the proximity flag
        assert_eq!(
            session.submit_position(coord! { x: 0.0, y: 0.0 }, at(2)),
            SampleOutcome::Ignored
        );
        let state = session.state();
        assert!(state.destination_arrived);
        assert!(!state.within_arrival_radius);
        assert_eq!(session.phase(), Phase::Arrived);
    }

    #[test]
    fn stale_samples_are_dropped() {
        let Fixture { mut session, grave } = fixture();
        session
            .start_routing_from(coord! { x: 0.0, y: 0.0 }, grave)
            .unwrap();
        session.submit_position(coord! { x: 0.0, y: 0.0005 }, at(10));

        assert_eq!(
            session.submit_position(coord! { x: 0.0, y: 0.00199 }, at(5)),
            SampleOutcome::Stale
        );
        assert_eq!(session.phase(), Phase::Routing);
        assert_eq!(session.position(), Some(coord! { x: 0.0, y: 0.0005 }));
    }

    #[test]
    fn failed_replan_returns_to_idle() {
        let Fixture { mut session, grave } = fixture();
        session
            .start_routing_from(coord! { x: 0.0, y: 0.0 }, grave)
            .unwrap();

        let outcome = session.submit_position(coord! { x: 0.01, y: 0.001 }, at(1));
        assert!(matches!(
            outcome,
            SampleOutcome::ReplanFailed(Error::Unreachable(_))
        ));

        let state = session.state();
        assert_eq!(session.phase(), Phase::Idle);
        assert!(!state.is_routing);
        assert!(state.route_coords.is_empty());
        assert!(state.error.unwrap().starts_with("No route available"));
    }

    #[test]
    fn cancel_keeps_the_latch_and_reset_clears_it() {
        let Fixture { mut session, grave } = fixture();
        session
            .start_routing_from(coord! { x: 0.0, y: 0.0 }, grave)
            .unwrap();
        session.submit_position(coord! { x: 0.0, y: 0.002 }, at(1));

        session.cancel_routing();
        let state = session.state();
        assert_eq!(session.phase(), Phase::Idle);
        assert!(state.destination_arrived);
        assert!(state.route_coords.is_empty() && state.route_steps.is_empty());

        session.reset();
        assert_eq!(session.state(), GuidanceState::default());
    }

    #[test]
    fn unknown_destination_is_reported() {
        let Fixture { mut session, .. } = fixture();
        assert_eq!(
            session.start_routing_from(coord! { x: 0.0, y: 0.0 }, FeatureId(42)),
            Err(Error::NotFound(FeatureId(42)))
        );
        assert_eq!(
            session.state().error.as_deref(),
            Some("Feature 42 not found")
        );
    }

    #[test]
    fn a_new_start_clears_the_previous_error() {
        let Fixture { mut session, grave } = fixture();
        session
            .start_routing_from(coord! { x: 0.0, y: 0.0 }, FeatureId(42))
            .unwrap_err();
        session
            .start_routing_from(coord! { x: 0.0, y: 0.0 }, grave)
            .unwrap();
        assert_eq!(session.state().error, None);
    }
}
