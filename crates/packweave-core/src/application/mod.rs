//! Application layer for packweave.
//!
//! This layer contains:
//! - **Services**: Use case orchestration (GenerateService, PackService)
//! - **Ports**: Interface definitions (traits) for external dependencies
//! - **Errors**: Application-specific error types
//!
//! The application layer coordinates the domain layer but contains no
//! business logic itself. All resolution and rendering rules live in
//! `crate::domain`.

pub mod error;
pub mod ports;
pub mod services;

pub use services::{GenerateService, PackInfo, PackService, PackSnapshot};

pub use ports::{Filesystem, PackRepository};

pub use error::ApplicationError;
