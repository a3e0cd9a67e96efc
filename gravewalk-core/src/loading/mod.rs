//! This module is responsible for loading feature data and building the
//! routable path network from it.

mod builder;
mod collection;
mod handle;

pub use builder::build_path_graph;
pub use collection::load_feature_collection;
pub use handle::GraphHandle;
