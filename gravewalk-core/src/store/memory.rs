use std::{
    collections::BTreeMap,
    sync::{PoisonError, RwLock},
};

use chrono::{DateTime, Utc};
use log::debug;

use super::FeatureStore;
use crate::{
    Error,
    model::{FeatureDraft, FeatureId, FeatureKind, FeaturePatch, GeoFeature},
};

#[derive(Debug, Default)]
struct Inner {
    features: BTreeMap<FeatureId, Stored>,
    next_id: u64,
    revision: u64,
}

#[derive(Debug)]
struct Stored {
    feature: GeoFeature,
    revision: u64,
}

/// Thread-safe in-memory feature store
///
/// Ids are assigned in creation order starting at 1 and never reused.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding the given drafts
    ///
    /// # Errors
    ///
    /// Returns the validation error of the first malformed draft
    pub fn with_features(drafts: impl IntoIterator<Item = FeatureDraft>) -> Result<Self, Error> {
        let store = Self::new();
        for draft in drafts {
            store.create_feature(draft)?;
        }
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.read(|inner| inner.features.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read<T>(&self, f: impl FnOnce(&Inner) -> T) -> T {
        f(&self.inner.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> T {
        f(&mut self.inner.write().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Timestamps never go backwards within one feature, even if the clock does
fn touch(previous: DateTime<Utc>) -> DateTime<Utc> {
    Utc::now().max(previous)
}

impl FeatureStore for MemoryStore {
    fn all_features(&self, kind: Option<FeatureKind>) -> Vec<GeoFeature> {
        self.read(|inner| {
            inner
                .features
                .values()
                .map(|stored| &stored.feature)
                .filter(|feature| kind.is_none_or(|kind| feature.kind() == kind))
                .cloned()
                .collect()
        })
    }

    fn feature_by_id(&self, id: FeatureId) -> Result<GeoFeature, Error> {
        self.read(|inner| {
            inner
                .features
                .get(&id)
                .map(|stored| stored.feature.clone())
                .ok_or(Error::NotFound(id))
        })
    }

    fn most_recently_updated(&self) -> Option<GeoFeature> {
        self.read(|inner| {
            inner
                .features
                .values()
                .max_by_key(|stored| stored.revision)
                .map(|stored| stored.feature.clone())
        })
    }

    fn create_feature(&self, draft: FeatureDraft) -> Result<GeoFeature, Error> {
        draft.validate()?;
        self.write(|inner| {
            inner.next_id += 1;
            inner.revision += 1;
            let now = Utc::now();
            let feature = GeoFeature {
                id: FeatureId(inner.next_id),
                geometry: draft.geometry,
                properties: draft.properties,
                created_at: now,
                updated_at: now,
            };
            debug!("Created {:?} feature {}", feature.kind(), feature.id);
            inner.features.insert(
                feature.id,
                Stored {
                    feature: feature.clone(),
                    revision: inner.revision,
                },
            );
            Ok(feature)
        })
    }

    fn update_feature(&self, id: FeatureId, patch: FeaturePatch) -> Result<GeoFeature, Error> {
        if let Some(geometry) = &patch.geometry {
            geometry.validate()?;
        }
        self.write(|inner| {
            let revision = inner.revision + 1;
            let stored = inner.features.get_mut(&id).ok_or(Error::NotFound(id))?;

            let mut updated = stored.feature.clone();
            if let Some(geometry) = patch.geometry {
                updated.geometry = geometry;
            }
            if let Some(properties) = patch.properties {
                updated.properties = properties;
            }
            FeatureDraft::new(updated.geometry.clone(), updated.properties.clone()).validate()?;
            updated.updated_at = touch(stored.feature.updated_at);

            stored.feature = updated.clone();
            stored.revision = revision;
            inner.revision = revision;
            debug!("Updated feature {id}");
            Ok(updated)
        })
    }

    fn delete_feature(&self, id: FeatureId) -> Result<GeoFeature, Error> {
        self.write(|inner| {
            let stored = inner.features.remove(&id).ok_or(Error::NotFound(id))?;
            debug!("Deleted feature {id}");
            Ok(stored.feature)
        })
    }
}
