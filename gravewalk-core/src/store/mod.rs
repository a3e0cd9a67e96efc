//! Feature persistence
//!
//! The guidance engine only needs the operations of [`FeatureStore`]; any
//! backend that can list, fetch and mutate features can serve it.

mod memory;

pub use memory::MemoryStore;

use crate::{
    Error,
    model::{FeatureDraft, FeatureId, FeatureKind, FeaturePatch, GeoFeature},
};

pub trait FeatureStore: Send + Sync {
    /// All features, optionally only those of one kind, in id order
    fn all_features(&self, kind: Option<FeatureKind>) -> Vec<GeoFeature>;

    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no feature has this id
    fn feature_by_id(&self, id: FeatureId) -> Result<GeoFeature, Error>;

    /// The feature changed last, if any
    fn most_recently_updated(&self) -> Option<GeoFeature>;

    /// Features whose name contains every whitespace separated term of
    /// `query`, ignoring case, in id order
    ///
    /// "galang mar" finds "Marites Galang". A blank query matches nothing.
    fn search_by_name(&self, query: &str, kind: Option<FeatureKind>) -> Vec<GeoFeature> {
        let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        if terms.is_empty() {
            return Vec::new();
        }
        self.all_features(kind)
            .into_iter()
            .filter(|feature| {
                let name = feature.name().to_lowercase();
                terms.iter().all(|term| name.contains(term.as_str()))
            })
            .collect()
    }

    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the draft is malformed
    fn create_feature(&self, draft: FeatureDraft) -> Result<GeoFeature, Error>;

    /// # Errors
    ///
    /// Returns [`Error::NotFound`] or [`Error::Validation`]
    fn update_feature(&self, id: FeatureId, patch: FeaturePatch) -> Result<GeoFeature, Error>;

    /// Removes the feature and returns it
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no feature has this id
    fn delete_feature(&self, id: FeatureId) -> Result<GeoFeature, Error>;
}
