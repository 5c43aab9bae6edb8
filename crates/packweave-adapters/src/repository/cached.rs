//! Read-through cache over any repository.

use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock},
};

use tracing::{trace, warn};

use packweave_core::{
    application::{ApplicationError, ports::PackRepository},
    domain::{PackDescriptor, PackId, VersionsCatalog},
    error::WeaveResult,
};

/// Caches packs and the catalog of an inner repository.
///
/// Entries are only ever added; [`CachedRepository::clear`] is the one way to
/// drop them. Misses (`Ok(None)`) and errors are not cached.
#[derive(Debug)]
pub struct CachedRepository<R> {
    inner: R,
    cache: Arc<RwLock<Cache>>,
}

#[derive(Debug, Default)]
struct Cache {
    packs: BTreeMap<PackId, PackDescriptor>,
    catalog: Option<VersionsCatalog>,
}

impl<R: PackRepository> CachedRepository<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            cache: Arc::new(RwLock::new(Cache::default())),
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Number of cached packs.
    pub fn cached_len(&self) -> usize {
        self.cache.read().map(|c| c.packs.len()).unwrap_or(0)
    }

    /// Drop every cached entry.
    pub fn clear(&self) -> WeaveResult<()> {
        let mut cache = self
            .cache
            .write()
            .map_err(|_| ApplicationError::StoreLockError)?;
        *cache = Cache::default();
        Ok(())
    }

    /// Store a pack unless an entry for its id exists. A different version
    /// under the same id keeps the existing entry.
    fn remember(&self, pack: &PackDescriptor) -> WeaveResult<PackDescriptor> {
        let mut cache = self
            .cache
            .write()
            .map_err(|_| ApplicationError::StoreLockError)?;
        if let Some(existing) = cache.packs.get(&pack.id) {
            if existing.version != pack.version {
                warn!(
                    id = %pack.id,
                    cached = %existing.version,
                    fetched = %pack.version,
                    "pack version changed underneath the cache; keeping cached entry"
                );
            }
            return Ok(existing.clone());
        }
        cache.packs.insert(pack.id.clone(), pack.clone());
        Ok(pack.clone())
    }
}

impl<R: PackRepository> PackRepository for CachedRepository<R> {
    fn ids(&self) -> WeaveResult<Vec<PackId>> {
        self.inner.ids()
    }

    fn get(&self, id: &PackId) -> WeaveResult<Option<PackDescriptor>> {
        {
            let cache = self
                .cache
                .read()
                .map_err(|_| ApplicationError::StoreLockError)?;
            if let Some(pack) = cache.packs.get(id) {
                trace!(%id, "cache hit");
                return Ok(Some(pack.clone()));
            }
        }
        match self.inner.get(id)? {
            Some(pack) => self.remember(&pack).map(Some),
            None => Ok(None),
        }
    }

    fn versions(&self) -> WeaveResult<VersionsCatalog> {
        {
            let cache = self
                .cache
                .read()
                .map_err(|_| ApplicationError::StoreLockError)?;
            if let Some(catalog) = &cache.catalog {
                return Ok(catalog.clone());
            }
        }
        let catalog = self.inner.versions()?;
        let mut cache = self
            .cache
            .write()
            .map_err(|_| ApplicationError::StoreLockError)?;
        Ok(cache.catalog.get_or_insert(catalog).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRepository;

    fn pack(version: &str) -> PackDescriptor {
        PackDescriptor::builder(PackId::new("g", "a"))
            .version(version)
            .build()
            .unwrap()
    }

    #[test]
    fn hits_do_not_see_inner_changes_until_cleared() {
        let inner = InMemoryRepository::new();
        inner.insert(pack("1.0.0")).unwrap();
        let cached = CachedRepository::new(inner.clone());
        let id = PackId::new("g", "a");

        assert_eq!(cached.get(&id).unwrap().unwrap().version, "1.0.0");
        inner.insert(pack("2.0.0")).unwrap();
        assert_eq!(cached.get(&id).unwrap().unwrap().version, "1.0.0");
        assert_eq!(cached.cached_len(), 1);

        cached.clear().unwrap();
        assert_eq!(cached.get(&id).unwrap().unwrap().version, "2.0.0");
    }

    #[test]
    fn misses_are_not_cached() {
        let inner = InMemoryRepository::new();
        let cached = CachedRepository::new(inner.clone());
        let id = PackId::new("g", "a");

        assert!(cached.get(&id).unwrap().is_none());
        inner.insert(pack("1.0.0")).unwrap();
        assert!(cached.get(&id).unwrap().is_some());
    }

    #[test]
    fn catalog_is_cached() {
        let inner = InMemoryRepository::new();
        inner
            .set_catalog(VersionsCatalog::new().with_version("kotlin", "2.0.0"))
            .unwrap();
        let cached = CachedRepository::new(inner.clone());
        assert_eq!(cached.versions().unwrap().versions["kotlin"], "2.0.0");

        inner.set_catalog(VersionsCatalog::new()).unwrap();
        assert_eq!(cached.versions().unwrap().versions["kotlin"], "2.0.0");
    }
}
