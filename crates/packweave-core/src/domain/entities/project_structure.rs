use std::collections::HashMap;
use std::path::Path;

use crate::domain::{
    entities::{common::RelativePath, pack::PackId},
    error::DomainError,
};

/// Rendered project ready for export.
///
/// Files appear in generation order: module order, then source order within
/// each module. It contains no business logic, only data.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GeneratedProject {
    pub name: String,
    pub files: Vec<GeneratedFile>,
}

impl GeneratedProject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            files: Vec::new(),
        }
    }

    pub fn add_file(&mut self, file: GeneratedFile) {
        self.files.push(file);
    }

    pub fn with_file(mut self, file: GeneratedFile) -> Self {
        self.add_file(file);
        self
    }

    /// Every output path must be produced by exactly one source.
    pub fn validate(&self) -> Result<(), DomainError> {
        let mut seen: HashMap<&Path, &PackId> = HashMap::new();
        for file in &self.files {
            if let Some(first) = seen.insert(file.path.as_path(), &file.owner) {
                return Err(DomainError::TargetPathConflict {
                    path: file.path.to_string(),
                    first: first.to_string(),
                    second: file.owner.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn file(&self, path: &str) -> Option<&GeneratedFile> {
        self.files.iter().find(|f| f.path.as_path() == Path::new(path))
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn total_bytes(&self) -> usize {
        self.files.iter().map(GeneratedFile::size).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: RelativePath,
    pub bytes: Vec<u8>,
    pub executable: bool,
    /// Pack whose source produced this file.
    pub owner: PackId,
}

impl GeneratedFile {
    pub fn new(path: RelativePath, bytes: impl Into<Vec<u8>>, owner: PackId) -> Self {
        Self {
            path,
            bytes: bytes.into(),
            executable: false,
            owner,
        }
    }

    /// Content as UTF-8, if it is text.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}
