//! In-memory pack repository.

use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock},
};

use packweave_core::{
    application::{ApplicationError, ports::PackRepository},
    domain::{DomainValidator as validator, PackDescriptor, PackId, VersionsCatalog},
    error::WeaveResult,
};

/// Thread-safe in-memory repository. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    packs: BTreeMap<PackId, PackDescriptor>,
    catalog: VersionsCatalog,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a repository from packs and a catalog in one step.
    pub fn with_packs(
        packs: impl IntoIterator<Item = PackDescriptor>,
        catalog: VersionsCatalog,
    ) -> WeaveResult<Self> {
        let repo = Self::new();
        for pack in packs {
            repo.insert(pack)?;
        }
        repo.set_catalog(catalog)?;
        Ok(repo)
    }

    /// Insert or replace a pack after validating it.
    pub fn insert(&self, pack: PackDescriptor) -> WeaveResult<()> {
        validator::validate_pack(&pack)?;
        let mut inner = self
            .inner
            .write()
            .map_err(|_| ApplicationError::StoreLockError)?;
        inner.packs.insert(pack.id.clone(), pack);
        Ok(())
    }

    pub fn remove(&self, id: &PackId) -> WeaveResult<Option<PackDescriptor>> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| ApplicationError::StoreLockError)?;
        Ok(inner.packs.remove(id))
    }

    pub fn set_catalog(&self, catalog: VersionsCatalog) -> WeaveResult<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| ApplicationError::StoreLockError)?;
        inner.catalog = catalog;
        Ok(())
    }

    /// Get the number of packs.
    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.packs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PackRepository for InMemoryRepository {
    fn ids(&self) -> WeaveResult<Vec<PackId>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| ApplicationError::StoreLockError)?;
        Ok(inner.packs.keys().cloned().collect())
    }

    fn get(&self, id: &PackId) -> WeaveResult<Option<PackDescriptor>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| ApplicationError::StoreLockError)?;
        Ok(inner.packs.get(id).cloned())
    }

    fn versions(&self) -> WeaveResult<VersionsCatalog> {
        let inner = self
            .inner
            .read()
            .map_err(|_| ApplicationError::StoreLockError)?;
        Ok(inner.catalog.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use packweave_core::domain::Source;

    fn pack(name: &str) -> PackDescriptor {
        PackDescriptor::builder(PackId::new("g", name))
            .source(Source::marker_file("a.txt", "{{x}}"))
            .build()
            .unwrap()
    }

    #[test]
    fn insert_get_remove() {
        let repo = InMemoryRepository::new();
        repo.insert(pack("a")).unwrap();
        repo.insert(pack("b")).unwrap();
        assert_eq!(repo.len(), 2);

        let id = PackId::new("g", "a");
        assert_eq!(repo.get(&id).unwrap().unwrap().id, id);
        assert!(repo.remove(&id).unwrap().is_some());
        assert!(repo.get(&id).unwrap().is_none());
        assert_eq!(repo.ids().unwrap(), [PackId::new("g", "b")]);
    }

    #[test]
    fn rejects_invalid_packs() {
        let mut bad = pack("a");
        bad.version.clear();
        assert!(InMemoryRepository::new().insert(bad).is_err());
    }

    #[test]
    fn clones_share_state() {
        let repo = InMemoryRepository::new();
        let clone = repo.clone();
        clone
            .set_catalog(VersionsCatalog::new().with_version("kotlin", "2.0.0"))
            .unwrap();
        assert_eq!(repo.versions().unwrap().versions["kotlin"], "2.0.0");
    }
}
