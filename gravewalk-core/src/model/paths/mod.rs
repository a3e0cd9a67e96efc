//! Walkable path network

pub mod components;
pub mod network;

pub use components::{PathEdge, PathNode};
pub use network::{IndexedPoint, PathGraph};
