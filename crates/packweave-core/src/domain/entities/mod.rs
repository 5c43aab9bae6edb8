pub mod catalog;
pub mod common;
pub mod dependency;
pub mod module;
pub mod pack;
pub mod project;
pub mod project_structure;
pub mod source;

pub use crate::domain::DomainError;
pub use catalog::VersionsCatalog;
pub use pack::{PackDescriptor, PackId};
pub use project::{Project, ProjectDescriptor};
pub use project_structure::GeneratedProject;
