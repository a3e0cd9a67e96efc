use std::sync::{Arc, PoisonError, RwLock};

use log::{info, warn};

use super::build_path_graph;
use crate::{Error, GuidanceConfig, model::GeoFeature, model::PathGraph};

/// Shared slot holding the current path graph
///
/// Rebuilds construct a complete new graph first and then swap it in, so a
/// planner holding the previous `Arc` keeps a consistent view.
#[derive(Debug, Clone, Default)]
pub struct GraphHandle {
    current: Arc<RwLock<Option<Arc<PathGraph>>>>,
}

impl GraphHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns [`Error::EmptyGraph`] if no graph has been built, or the last
    /// rebuild found no paths
    pub fn current(&self) -> Result<Arc<PathGraph>, Error> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(Error::EmptyGraph)
    }

    pub fn is_empty(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Rebuilds from scratch and swaps the result in.
    ///
    /// A failed build clears the slot; sessions then report that no paths are
    /// available instead of routing over removed paths.
    ///
    /// # Errors
    ///
    /// Propagates the build error
    pub fn rebuild<'a, I>(&self, features: I, config: &GuidanceConfig) -> Result<Arc<PathGraph>, Error>
    where
        I: IntoIterator<Item = &'a GeoFeature>,
    {
        let built = build_path_graph(features, config).map(Arc::new);
        let mut slot = self.current.write().unwrap_or_else(PoisonError::into_inner);
        match built {
            Ok(graph) => {
                info!("Swapped in path graph with {} nodes", graph.node_count());
                *slot = Some(Arc::clone(&graph));
                Ok(graph)
            }
            Err(err) => {
                warn!("Path graph cleared: {err}");
                *slot = None;
                Err(err)
            }
        }
    }
}
