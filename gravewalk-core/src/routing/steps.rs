use geo::Coord;

use super::route::{Maneuver, RouteStep};
use crate::{
    Meters,
    geometry::{bearing, compass_direction, haversine_distance, turn_angle},
};

const BEAR_LIMIT_DEG: f64 = 60.0;
const TURN_LIMIT_DEG: f64 = 150.0;

/// Turn-by-turn steps for a coordinate sequence without repeated points
///
/// Runs of segments whose heading stays within `straight_tolerance_deg` of the
/// heading the run started with collapse into one instruction. The first step
/// sets off from the start, the last one always arrives at `destination`.
/// Legs at either end no longer than `short_leg` give no heading of their own:
/// a visitor a metre beside the path is not told to turn onto it.
pub(crate) fn derive_steps(
    coords: &[Coord<f64>],
    destination: &str,
    straight_tolerance_deg: f64,
    short_leg: Meters,
) -> Vec<RouteStep> {
    let Some(&last) = coords.last() else {
        return Vec::new();
    };

    let mut steps = Vec::new();
    let mut walked = 0.0;

    if let [first, _, ..] = coords {
        // Index of the first leg that is long enough to set the heading
        let lead = coords
            .windows(2)
            .position(|leg| haversine_distance(leg[0], leg[1]) > short_leg)
            .unwrap_or(0);
        let heading = bearing(coords[lead], coords[lead + 1]);
        steps.push(RouteStep {
            instruction: format!(
                "Head {} toward {destination}",
                compass_direction(heading)
            ),
            coordinate: *first,
            maneuver: Maneuver::Depart,
            distance_from_start: 0.0,
        });

        let mut run_heading = heading;
        let last_idx = coords.len() - 1;
        for (idx, window) in coords.windows(3).enumerate() {
            let [prev, here, next] = window else {
                continue;
            };
            walked += haversine_distance(*prev, *here);

            let here_idx = idx + 1;
            if here_idx <= lead
                || (here_idx + 1 == last_idx && haversine_distance(*here, *next) <= short_leg)
            {
                continue;
            }

            let outgoing = bearing(*here, *next);
            let angle = turn_angle(run_heading, outgoing);
            if angle.abs() <= straight_tolerance_deg {
                continue;
            }

            let maneuver = classify(angle);
            steps.push(RouteStep {
                instruction: format!("{} toward {destination}", describe(maneuver)),
                coordinate: *here,
                maneuver,
                distance_from_start: walked,
            });
            run_heading = outgoing;
        }

        if let [.., before_last, _] = coords {
            walked += haversine_distance(*before_last, last);
        }
    }

    steps.push(RouteStep {
        instruction: format!("Arrive at {destination}"),
        coordinate: last,
        maneuver: Maneuver::Arrive,
        distance_from_start: walked,
    });
    steps
}

fn classify(angle: f64) -> Maneuver {
    let right = angle > 0.0;
    match angle.abs() {
        a if a <= BEAR_LIMIT_DEG => {
            if right {
                Maneuver::BearRight
            } else {
                Maneuver::BearLeft
            }
        }
        a if a <= TURN_LIMIT_DEG => {
            if right {
                Maneuver::TurnRight
            } else {
                Maneuver::TurnLeft
            }
        }
        _ => Maneuver::UTurn,
    }
}

fn describe(maneuver: Maneuver) -> &'static str {
    match maneuver {
        Maneuver::Depart => "Head",
        Maneuver::BearLeft => "Bear left",
        Maneuver::BearRight => "Bear right",
        Maneuver::TurnLeft => "Turn left",
        Maneuver::TurnRight => "Turn right",
        Maneuver::UTurn => "Make a U-turn",
        Maneuver::Arrive => "Arrive",
    }
}
