//! Port for locally entered POIs that bypass the external sources.

use std::sync::RwLock;

use async_trait::async_trait;
use thiserror::Error;

use crate::{Category, Poi};

/// Source name stamped on admin-entered POIs.
pub const ADMIN_SOURCE: &str = "admin";

/// Errors from an [`AdminPoiStore`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdminStoreError {
    /// The backing store could not be read.
    #[error("admin POI store unavailable: {message}")]
    Unavailable {
        /// Failure detail.
        message: String,
    },
}

/// Read access to admin-entered POIs.
#[async_trait]
pub trait AdminPoiStore: Send + Sync {
    /// Return every stored POI whose category is in `categories`.
    ///
    /// # Errors
    ///
    /// Returns [`AdminStoreError`] when the store cannot be read.
    async fn get_by_categories(&self, categories: &[Category]) -> Result<Vec<Poi>, AdminStoreError>;
}

/// In-memory admin store.
///
/// # Examples
/// ```
/// # let runtime = tokio::runtime::Builder::new_current_thread().build()?;
/// # runtime.block_on(async {
/// use fjellkart_core::{AdminPoiStore, Category, MemoryAdminStore};
///
/// let store = MemoryAdminStore::default();
/// let pois = store.get_by_categories(&[Category::Peak]).await.expect("readable");
/// assert!(pois.is_empty());
/// # });
/// # Ok::<(), std::io::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct MemoryAdminStore {
    pois: RwLock<Vec<Poi>>,
}

impl MemoryAdminStore {
    /// Create a store holding `pois`.
    #[must_use]
    pub fn with_pois<I>(pois: I) -> Self
    where
        I: IntoIterator<Item = Poi>,
    {
        Self {
            pois: RwLock::new(pois.into_iter().collect()),
        }
    }

    /// Insert or replace a POI by id.
    ///
    /// # Errors
    ///
    /// Returns [`AdminStoreError::Unavailable`] if the lock was poisoned.
    pub fn upsert(&self, poi: Poi) -> Result<(), AdminStoreError> {
        let mut pois = self.pois.write().map_err(|_| poisoned())?;
        if let Some(existing) = pois.iter_mut().find(|existing| existing.id == poi.id) {
            *existing = poi;
        } else {
            pois.push(poi);
        }
        Ok(())
    }
}

fn poisoned() -> AdminStoreError {
    AdminStoreError::Unavailable {
        message: "lock poisoned".to_owned(),
    }
}

#[async_trait]
impl AdminPoiStore for MemoryAdminStore {
    async fn get_by_categories(&self, categories: &[Category]) -> Result<Vec<Poi>, AdminStoreError> {
        let pois = self.pois.read().map_err(|_| poisoned())?;
        Ok(pois
            .iter()
            .filter(|poi| categories.contains(&poi.category))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_poi;
    use rstest::rstest;

    #[rstest]
    #[tokio::test]
    async fn filters_by_category() {
        let store = MemoryAdminStore::with_pois([
            sample_poi("admin:peak:1", Category::Peak, 61.0, 8.0),
            sample_poi("admin:beach:1", Category::Beach, 59.0, 10.0),
        ]);
        let pois = store
            .get_by_categories(&[Category::Beach])
            .await
            .expect("store readable");
        assert_eq!(pois.len(), 1);
        assert_eq!(pois.first().map(|p| p.category), Some(Category::Beach));
    }

    #[rstest]
    #[tokio::test]
    async fn upsert_replaces_by_id() {
        let store = MemoryAdminStore::default();
        store
            .upsert(sample_poi("admin:peak:1", Category::Peak, 61.0, 8.0))
            .expect("upsert");
        let mut renamed = sample_poi("admin:peak:1", Category::Peak, 61.0, 8.0);
        renamed.name = "Renamed".into();
        store.upsert(renamed).expect("upsert");
        let pois = store
            .get_by_categories(&[Category::Peak])
            .await
            .expect("store readable");
        assert_eq!(pois.len(), 1);
        assert_eq!(pois.first().map(|p| p.name.as_str()), Some("Renamed"));
    }
}
