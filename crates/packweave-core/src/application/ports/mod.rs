//! Application ports (traits) for external dependencies.
//!
//! Ports define what the application needs from the outside world.
//! Adapters in `packweave-adapters` implement them.
//!
//! ## Port Types
//!
//! - **Driven (Output) Ports**: Called by application, implemented by infrastructure
//!   - `PackRepository`: pack descriptors and the versions catalog
//!   - `Filesystem`: writing a generated project
//!
//! - **Driving (Input) Ports**: Called by external world, implemented by application
//!   - (Defined in CLI layer, implemented by services)

pub mod output;

pub use output::{Filesystem, PackRepository};

#[cfg(test)]
pub use output::{MockFilesystem, MockPackRepository};
