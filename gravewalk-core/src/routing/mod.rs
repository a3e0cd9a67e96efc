//! Route planning over the path network

mod dijkstra;
mod planner;
mod route;
mod steps;

pub use planner::plan;
pub use route::{Maneuver, Route, RouteStep};
