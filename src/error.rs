//! Error handling for the flight-control core
//!
//! Two tiers exist. Build-time problems (`BuildError`, `PathError`,
//! configuration loading) are fatal and surface through `FlightError`.
//! Per-tick updates never fail; they guard numeric edge cases instead.

use thiserror::Error;

/// Malformed state-bus address.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("empty path segment in '{0}'")]
    EmptySegment(String),

    #[error("bad index in segment '{segment}' of '{path}'")]
    BadIndex { path: String, segment: String },

    #[error("'{0}' does not name an attribute (expected /node/path/attr)")]
    NoAttribute(String),
}

/// Fatal problems found while building the control pipeline or the
/// fusion orchestrator from configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("unknown autopilot module '{module}' in {section}")]
    UnknownModule { section: String, module: String },

    #[error("{section} has no module attribute")]
    MissingModule { section: String },

    #[error("unknown navigation backend '{module}' in {section}")]
    UnknownBackend { section: String, module: String },

    #[error("component '{component}' input cannot be resolved: '{path}'")]
    UnresolvedInput { component: String, path: String },

    #[error("component '{component}' has no usable outputs")]
    NoOutputs { component: String },

    #[error("component '{component}' reference is invalid: {reason}")]
    InvalidReference { component: String, reason: String },

    #[error("component '{component}' has unknown filter type '{kind}'")]
    UnknownFilterType { component: String, kind: String },
}

/// Main error type for flightcore operations
#[derive(Error, Debug)]
pub enum FlightError {
    /// Errors related to configuration loading
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pipeline or orchestrator build failures
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// Malformed bus paths
    #[error("Path error: {0}")]
    Path(#[from] PathError),

    /// A navigation backend refused to initialize
    #[error("Backend '{name}' error: {message}")]
    Backend { name: String, message: String },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<FlightError>,
    },
}

impl FlightError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        FlightError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// True when the root cause is a build failure.
    pub fn is_build_error(&self) -> bool {
        match self {
            FlightError::Build(_) => true,
            FlightError::WithContext { source, .. } => source.is_build_error(),
            _ => false,
        }
    }
}

/// Result type alias for flightcore operations
pub type Result<T> = std::result::Result<T, FlightError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<FlightError>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }
}
