//! Configuration loading and validation.
//!
//! The bridge reads one file at startup through [`FileSource`]; there is
//! no hot reload. [`ConfigVersion`] identifies the loaded content so the
//! health endpoint can report which revision is running. Submodules
//! provide the data model, validation logic, and the file loader.

pub mod model;
pub mod sources;
pub mod validation;

pub use sources::file_source::FileSource;

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigVersion {
    Hash(String),
}
