use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use log::{info, warn};

use crate::{
    Error, GuidanceConfig,
    guidance::Session,
    loading::GraphHandle,
    model::{FeatureDraft, FeatureId, FeatureKind, FeaturePatch, GeoFeature, PathGraph},
    store::{FeatureStore, MemoryStore},
};

/// Keeps the path graph in step with the feature store and hands out sessions
pub struct Guide {
    store: Arc<dyn FeatureStore>,
    graph: GraphHandle,
    config: GuidanceConfig,
    /// Held from the store read to the swap so rebuilds publish in order
    rebuild_lock: Mutex<()>,
}

impl fmt::Debug for Guide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guide")
            .field("graph", &self.graph)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Guide {
    /// Validates `config` and builds the initial graph
    ///
    /// A store without paths is not an error here; sessions report it when
    /// they try to route.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an invalid configuration
    pub fn new(store: Arc<dyn FeatureStore>, config: GuidanceConfig) -> Result<Self, Error> {
        config.validate()?;
        let guide = Self {
            store,
            graph: GraphHandle::new(),
            config,
            rebuild_lock: Mutex::new(()),
        };
        match guide.rebuild_graph() {
            Ok(_) | Err(Error::EmptyGraph) => Ok(guide),
            Err(err) => Err(err),
        }
    }

    /// A guide over a fresh [`MemoryStore`] holding `drafts`
    ///
    /// # Errors
    ///
    /// Returns the first validation error among `drafts` or in `config`
    pub fn with_memory_store(
        drafts: impl IntoIterator<Item = FeatureDraft>,
        config: GuidanceConfig,
    ) -> Result<Self, Error> {
        let store = MemoryStore::with_features(drafts)?;
        Self::new(Arc::new(store), config)
    }

    pub fn store(&self) -> &Arc<dyn FeatureStore> {
        &self.store
    }

    pub fn graph(&self) -> &GraphHandle {
        &self.graph
    }

    pub fn config(&self) -> &GuidanceConfig {
        &self.config
    }

    /// Rebuilds the path graph from the stored line features
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyGraph`] if the store holds no paths; the graph is
    /// cleared in that case
    pub fn rebuild_graph(&self) -> Result<Arc<PathGraph>, Error> {
        let _rebuilding = self
            .rebuild_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let lines = self.store.all_features(Some(FeatureKind::Line));
        info!("Rebuilding path graph from {} paths", lines.len());
        self.graph.rebuild(&lines, &self.config)
    }

    /// # Errors
    ///
    /// Returns [`Error::Validation`] for a malformed draft
    pub fn create_feature(&self, draft: FeatureDraft) -> Result<GeoFeature, Error> {
        let feature = self.store.create_feature(draft)?;
        if feature.kind() == FeatureKind::Line {
            self.refresh_graph();
        }
        Ok(feature)
    }

    /// # Errors
    ///
    /// Returns [`Error::NotFound`] or [`Error::Validation`]
    pub fn update_feature(&self, id: FeatureId, patch: FeaturePatch) -> Result<GeoFeature, Error> {
        let before = self.store.feature_by_id(id)?.kind();
        let feature = self.store.update_feature(id, patch)?;
        if before == FeatureKind::Line || feature.kind() == FeatureKind::Line {
            self.refresh_graph();
        }
        Ok(feature)
    }

    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no feature has this id
    pub fn delete_feature(&self, id: FeatureId) -> Result<GeoFeature, Error> {
        let feature = self.store.delete_feature(id)?;
        if feature.kind() == FeatureKind::Line {
            self.refresh_graph();
        }
        Ok(feature)
    }

    /// Looks a destination up by numeric id, falling back to an exact name match
    pub fn find_feature(&self, query: &str) -> Option<GeoFeature> {
        let query = query.trim();
        if let Ok(id) = query.parse::<u64>()
            && let Ok(feature) = self.store.feature_by_id(FeatureId(id))
        {
            return Some(feature);
        }
        self.store
            .all_features(None)
            .into_iter()
            .find(|feature| feature.name() == query)
    }

    /// Features whose name contains every term of `query`, ignoring case
    ///
    /// Paths are left out; they are walked along, not visited.
    pub fn search_features(&self, query: &str) -> Vec<GeoFeature> {
        self.store
            .search_by_name(query, None)
            .into_iter()
            .filter(|feature| feature.kind() != FeatureKind::Line)
            .collect()
    }

    /// A new session for one visitor, sharing this guide's store and graph
    pub fn session(&self) -> Session {
        Session::new(
            Arc::clone(&self.store),
            self.graph.clone(),
            self.config.clone(),
        )
    }

    fn refresh_graph(&self) {
        if let Err(err) = self.rebuild_graph() {
            warn!("Path graph unavailable after change: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicBool, Ordering},
        thread,
        time::Duration,
    };

    use geo::coord;

    use super::*;

    fn avenue() -> FeatureDraft {
        FeatureDraft::line(
            "Main avenue",
            vec![coord! { x: 0.0, y: 0.0 }, coord! { x: 0.0, y: 0.001 }],
        )
    }

    #[test]
    fn starts_without_paths() {
        let guide = Guide::with_memory_store(Vec::new(), GuidanceConfig::default()).unwrap();
        assert!(guide.graph().is_empty());
    }

    #[test]
    fn rejects_invalid_config() {
        let config = GuidanceConfig {
            deviation_threshold: -1.0,
            ..GuidanceConfig::default()
        };
        assert!(matches!(
            Guide::with_memory_store([avenue()], config),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn line_changes_rebuild_the_graph() {
        let guide = Guide::with_memory_store(Vec::new(), GuidanceConfig::default()).unwrap();

        let path = guide.create_feature(avenue()).unwrap();
        assert_eq!(guide.graph().current().unwrap().edge_count(), 1);

        guide
            .update_feature(
                path.id,
                FeaturePatch {
                    geometry: Some(FeatureDraft::line(
                        "Main avenue",
                        vec![
                            coord! { x: 0.0, y: 0.0 },
                            coord! { x: 0.0, y: 0.001 },
                            coord! { x: 0.001, y: 0.001 },
                        ],
                    )
                    .geometry),
                    ..FeaturePatch::default()
                },
            )
            .unwrap();
        assert_eq!(guide.graph().current().unwrap().edge_count(), 2);

        guide.delete_feature(path.id).unwrap();
        assert_eq!(guide.graph().current().unwrap_err(), Error::EmptyGraph);
    }

    #[test]
    fn point_changes_keep_the_graph() {
        let guide = Guide::with_memory_store([avenue()], GuidanceConfig::default()).unwrap();
        let before = guide.graph().current().unwrap();

        guide
            .create_feature(FeatureDraft::point("Chapel", coord! { x: 0.0, y: 0.0005 }))
            .unwrap();
        assert!(Arc::ptr_eq(&before, &guide.graph().current().unwrap()));
    }

    #[test]
    fn finds_features_by_id_or_name() {
        let guide = Guide::with_memory_store(
            [
                avenue(),
                FeatureDraft::point("Grave 12", coord! { x: 0.0, y: 0.001 }),
            ],
            GuidanceConfig::default(),
        )
        .unwrap();

        assert_eq!(guide.find_feature("2").map(|f| f.id), Some(FeatureId(2)));
        assert_eq!(
            guide.find_feature(" Grave 12 ").map(|f| f.id),
            Some(FeatureId(2))
        );
        assert!(guide.find_feature("Grave 13").is_none());
    }

    #[test]
    fn searches_destinations_by_partial_name() {
        let guide = Guide::with_memory_store(
            [
                FeatureDraft::line(
                    "Galang walk",
                    vec![coord! { x: 0.0, y: 0.0 }, coord! { x: 0.0, y: 0.001 }],
                ),
                FeatureDraft::point("Marites Galang", coord! { x: 0.0, y: 0.001 }),
                FeatureDraft::point("Jose Galang", coord! { x: 0.0, y: 0.0005 }),
            ],
            GuidanceConfig::default(),
        )
        .unwrap();

        let found: Vec<_> = guide
            .search_features("galang")
            .into_iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(found, vec![FeatureId(2), FeatureId(3)]);
        assert_eq!(guide.search_features("marites g").len(), 1);
        assert!(guide.search_features("walk").is_empty());
    }

    /// Hands out its line snapshot, then stalls once before returning it
    struct StallingStore {
        inner: MemoryStore,
        stall: AtomicBool,
    }

    impl FeatureStore for StallingStore {
        fn all_features(&self, kind: Option<FeatureKind>) -> Vec<GeoFeature> {
            let snapshot = self.inner.all_features(kind);
            if kind == Some(FeatureKind::Line) && self.stall.swap(false, Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(300));
            }
            snapshot
        }

        fn feature_by_id(&self, id: FeatureId) -> Result<GeoFeature, Error> {
            self.inner.feature_by_id(id)
        }

        fn most_recently_updated(&self) -> Option<GeoFeature> {
            self.inner.most_recently_updated()
        }

        fn create_feature(&self, draft: FeatureDraft) -> Result<GeoFeature, Error> {
            self.inner.create_feature(draft)
        }

        fn update_feature(&self, id: FeatureId, patch: FeaturePatch) -> Result<GeoFeature, Error> {
            self.inner.update_feature(id, patch)
        }

        fn delete_feature(&self, id: FeatureId) -> Result<GeoFeature, Error> {
            self.inner.delete_feature(id)
        }
    }

    #[test]
    fn overlapping_rebuilds_publish_the_latest_paths() {
        let store = Arc::new(StallingStore {
            inner: MemoryStore::new(),
            stall: AtomicBool::new(false),
        });
        let guide = Guide::new(
            Arc::clone(&store) as Arc<dyn FeatureStore>,
            GuidanceConfig::default(),
        )
        .unwrap();
        store.stall.store(true, Ordering::SeqCst);

        thread::scope(|scope| {
            // Its rebuild reads one path, then stalls
            scope.spawn(|| guide.create_feature(avenue()).unwrap());
            thread::sleep(Duration::from_millis(50));
            scope.spawn(|| {
                guide
                    .create_feature(FeatureDraft::line(
                        "Side lane",
                        vec![coord! { x: 0.01, y: 0.0 }, coord! { x: 0.01, y: 0.001 }],
                    ))
                    .unwrap()
            });
        });

        assert_eq!(store.all_features(Some(FeatureKind::Line)).len(), 2);
        assert_eq!(guide.graph().current().unwrap().edge_count(), 2);
    }

    #[test]
    fn debug_output_names_the_config() {
        let guide = Guide::with_memory_store(Vec::new(), GuidanceConfig::default()).unwrap();
        let rendered = format!("{guide:?}");
        assert!(rendered.starts_with("Guide"));
        assert!(rendered.contains("arrival_tolerance"));
    }
}
