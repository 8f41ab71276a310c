//! Async file loader with SHA-256 version tracking.
//!
//! [`FileSource`] reads the file via Tokio, parses it according to its
//! extension, validates the result, and hashes the raw content.

use std::path::{Path, PathBuf};

use super::{extension, parse_config_str, sha256_hex};
use crate::config::model::Config;
use crate::config::validation::validate;
use crate::config::ConfigVersion;
use crate::error::BridgeError;

#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Format label derived from the extension, e.g. `yaml`.
    #[must_use]
    pub fn name(&self) -> &str {
        match extension(&self.path) {
            "yml" => "yaml",
            other => other,
        }
    }

    async fn read_content(&self) -> Result<String, BridgeError> {
        tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BridgeError::ConfigFileNotFound {
                    path: self.path.clone(),
                }
            } else {
                BridgeError::Io(e)
            }
        })
    }

    pub async fn load(&self) -> Result<(Config, ConfigVersion), BridgeError> {
        let content = self.read_content().await?;

        let config = parse_config_str(
            extension(&self.path),
            &content,
            &self.path.display().to_string(),
        )?;

        if let Err(errors) = validate(&config) {
            return Err(BridgeError::ConfigValidation { errors });
        }

        let hash = sha256_hex(content.as_bytes());
        Ok((config, ConfigVersion::Hash(hash)))
    }
}
