//! Unified error types for matchbridge.
//!
//! Defines [`BridgeError`] (the main crate error enum) and
//! [`ValidationError`] for config validation failures. Domain errors
//! live next to the code that raises them ([`FieldError`] and
//! [`MatchError`] in the engine, [`TransportError`] in the transport
//! layer, [`SnapshotError`] in the store) and convert into
//! [`BridgeError`] where they cross into process startup.
//!
//! [`FieldError`]: crate::engine::FieldError
//! [`MatchError`]: crate::engine::MatchError
//! [`SnapshotError`]: crate::store::snapshot::SnapshotError

use std::path::PathBuf;

use crate::transport::TransportError;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub route: String,
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl ValidationError {
    pub(crate) fn new(route: impl Into<String>, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            field: field.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    #[must_use]
    pub(crate) fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "  {}: {}: {}", self.route, self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({suggestion})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

fn format_errors(errors: &[ValidationError]) -> String {
    use std::fmt::Write;
    let mut buf = String::new();
    for (i, e) in errors.iter().enumerate() {
        if i > 0 {
            buf.push('\n');
        }
        // write! to String is infallible (only fails on OOM which is unrecoverable)
        let _ = write!(buf, "{e}");
    }
    buf
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BridgeError {
    #[error("No config source found.\n\n  {hint}")]
    NoConfigSource { hint: String },

    #[error("Config file not found: {}", path.display())]
    ConfigFileNotFound { path: PathBuf },

    #[error("Config parse error in {path}:\n  {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Config validation failed:\n{}", format_errors(.errors))]
    ConfigValidation { errors: Vec<ValidationError> },

    #[error("Unsupported config format: '{0}'")]
    UnsupportedFormat(String),

    #[error("Invalid address: {0}")]
    AddressParse(#[from] std::net::AddrParseError),

    #[error("Invalid URI: {source}")]
    UriParse {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("HTTP request failed: {source}")]
    HttpRequest {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Health check failed with status {0}")]
    HealthCheckFailed(hyper::StatusCode),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Route {route}: {message}")]
    Route { route: String, message: String },

    #[error("No message transport compiled in (rebuild with the `{feature}` feature)")]
    TransportUnavailable { feature: &'static str },
}
