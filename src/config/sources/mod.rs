//! File-based config loading.
//!
//! YAML, JSON and TOML are each gated by a feature flag.
//! [`parse_config_str`] dispatches on the file extension and
//! [`find_config_file`] looks for a default config in the working
//! directory.

pub mod file_source;

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::config::model::Config;
use crate::error::BridgeError;

const CANDIDATES: [&str; 4] = [
    "matchbridge.yaml",
    "matchbridge.yml",
    "matchbridge.json",
    "matchbridge.toml",
];

/// Parse a config string based on file extension.
pub fn parse_config_str(
    ext: &str,
    content: &str,
    path_display: &str,
) -> Result<Config, BridgeError> {
    match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => serde_yml::from_str(content).map_err(|e| BridgeError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        #[cfg(feature = "json")]
        "json" => serde_json::from_str(content).map_err(|e| BridgeError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        #[cfg(feature = "toml")]
        "toml" => toml::from_str(content).map_err(|e| BridgeError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        other => Err(BridgeError::UnsupportedFormat(other.to_string())),
    }
}

/// Compute a lowercase hex-encoded SHA-256 digest.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Extension of `path`, or an empty string.
#[must_use]
pub fn extension(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or("")
}

/// First `matchbridge.{yaml,yml,json,toml}` present in `dir`.
pub async fn find_config_file(dir: &Path) -> Option<PathBuf> {
    for name in CANDIDATES {
        let path = dir.join(name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Some(path);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_is_lowercase_hex() {
        let hash = sha256_hex(b"routes: []");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = parse_config_str("ini", "", "bridge.ini").unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedFormat(ext) if ext == "ini"));
    }

    #[tokio::test]
    async fn finds_yaml_before_json() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_config_file(dir.path()).await.is_none());

        std::fs::write(dir.path().join("matchbridge.json"), "{}").unwrap();
        std::fs::write(dir.path().join("matchbridge.yaml"), "").unwrap();
        let found = find_config_file(dir.path()).await.unwrap();
        assert!(found.ends_with("matchbridge.yaml"));
    }
}
