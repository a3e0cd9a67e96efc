use geo::Coord;
use serde::Serialize;
use tokio::sync::watch;

use crate::{geometry::lonlat, routing::RouteStep};

/// What the presentation layer sees of a guidance session
///
/// Published as one immutable snapshot per change, so `is_routing` is never
/// observed together with a route that is not there yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GuidanceState {
    pub is_routing: bool,
    #[serde(with = "lonlat::vec")]
    pub route_coords: Vec<Coord<f64>>,
    pub route_steps: Vec<RouteStep>,
    /// Latched on arrival; cleared only by starting a new route or a reset
    pub destination_arrived: bool,
    /// Whether the latest sample lies within the arrival tolerance
    pub within_arrival_radius: bool,
    pub error: Option<String>,
}

/// Single-slot publisher for [`GuidanceState`]
#[derive(Debug)]
pub struct GuidancePublisher {
    sender: watch::Sender<GuidanceState>,
}

impl Default for GuidancePublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl GuidancePublisher {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(GuidanceState::default());
        Self { sender }
    }

    /// Receivers are notified after every change and always read a whole snapshot
    pub fn subscribe(&self) -> watch::Receiver<GuidanceState> {
        self.sender.subscribe()
    }

    pub fn snapshot(&self) -> GuidanceState {
        self.sender.borrow().clone()
    }

    /// Applies `update` to the state; subscribers are only woken if something changed
    pub(crate) fn publish(&self, update: impl FnOnce(&mut GuidanceState)) -> bool {
        self.sender.send_if_modified(|state| {
            let before = state.clone();
            update(state);
            *state != before
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribers_see_changes_only() {
        let publisher = GuidancePublisher::new();
        let mut receiver = publisher.subscribe();

        assert!(!publisher.publish(|state| state.is_routing = false));
        assert!(!receiver.has_changed().unwrap());

        assert!(publisher.publish(|state| state.error = Some("No walking paths available".into())));
        assert!(receiver.has_changed().unwrap());
        assert_eq!(
            receiver.borrow_and_update().error.as_deref(),
            Some("No walking paths available")
        );
        assert_eq!(publisher.snapshot().error.as_deref(), Some("No walking paths available"));
    }
}
