//! Pack Service - repository queries.
//!
//! Read-only access to packs and the versions catalog, separated from
//! GenerateService for single responsibility.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::{
    application::ports::PackRepository,
    domain::{DomainError, PackDescriptor, PackId, VersionsCatalog},
    error::WeaveResult,
};

/// Every pack of a repository plus its catalog, as loaded at one moment.
#[derive(Debug, Clone, PartialEq)]
pub struct PackSnapshot {
    pub catalog: VersionsCatalog,
    /// Sorted by id.
    pub packs: Vec<PackDescriptor>,
}

/// Service for pack queries.
pub struct PackService {
    repository: Arc<dyn PackRepository>,
}

impl PackService {
    pub fn new(repository: Arc<dyn PackRepository>) -> Self {
        Self { repository }
    }

    /// Get a pack by id, failing when it does not exist.
    pub fn get(&self, id: &PackId) -> WeaveResult<PackDescriptor> {
        self.repository
            .get(id)?
            .ok_or_else(|| DomainError::PackNotFound { id: id.to_string() }.into())
    }

    /// All pack ids.
    pub fn list(&self) -> WeaveResult<Vec<PackId>> {
        let mut ids = self.repository.ids()?;
        ids.sort();
        Ok(ids)
    }

    pub fn versions(&self) -> WeaveResult<VersionsCatalog> {
        self.repository.versions()
    }

    /// Load everything, e.g. to write an archive.
    #[instrument(skip_all)]
    pub fn snapshot(&self) -> WeaveResult<PackSnapshot> {
        let catalog = self.repository.versions()?;
        let packs = self
            .list()?
            .iter()
            .map(|id| self.get(id))
            .collect::<WeaveResult<Vec<_>>>()?;
        info!(packs = packs.len(), "Repository snapshot taken");
        Ok(PackSnapshot { catalog, packs })
    }
}
