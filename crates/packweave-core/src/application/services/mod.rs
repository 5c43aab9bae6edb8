//! Application services - orchestrate use cases.
//!
//! Services coordinate the domain layer and ports to accomplish
//! high-level use cases like "generate a project" or "snapshot packs".

pub mod generate_service;
pub mod pack_service;

pub use generate_service::{GenerateService, PackInfo};
pub use pack_service::{PackService, PackSnapshot};
