//! packweave-core: pack resolution and template composition.
//!
//! This crate holds the domain and application layers of the packweave
//! scaffolding tool, following hexagonal (ports and adapters) architecture.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          packweave-cli (CLI)            │
//! └──────────────────┬──────────────────────┘
//!                    │ calls
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │         Application Services            │
//! │    (GenerateService, PackService)       │
//! └──────────────────┬──────────────────────┘
//!                    │ uses
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │       Application Ports (Traits)        │
//! │      (PackRepository, Filesystem)       │
//! └──────────────────┬──────────────────────┘
//!                    │ implemented by
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │   packweave-adapters (Infrastructure)   │
//! │ (DirectoryRepository, LocalFilesystem)  │
//! └─────────────────────────────────────────┘
//!
//!   Domain (pure): graph resolver, slot binder,
//!   template parsers, renderer, path transform
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use packweave_core::prelude::*;
//!
//! let descriptor = ProjectDescriptor::new("demo", "org.example")
//!     .with_pack(PackId::parse("org.packweave:kotlin-jvm")?)
//!     .with_property("kotlin.version", "2.0.0");
//!
//! let service = GenerateService::new(Arc::new(repository), Box::new(filesystem));
//! let generated = service.generate(&descriptor)?;
//! service.export(&generated, "./demo".as_ref(), false)?;
//! ```

pub mod domain;

pub mod application;

pub mod error;

// Public API - what external crates should use
pub mod prelude {
    pub use crate::application::{
        GenerateService, PackInfo, PackService, PackSnapshot,
        ports::{Filesystem, PackRepository},
    };
    pub use crate::domain::{
        EngineKind, GeneratedFile, GeneratedProject, PackDescriptor, PackId, Project,
        ProjectDescriptor, Source, SourcePathTransform, VersionsCatalog,
    };
    pub use crate::error::{WeaveError, WeaveResult};
}

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
