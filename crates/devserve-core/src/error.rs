use crate::plugin::BoxError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Core error type for devserve configuration and setup.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Config file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Project root {path} is not a directory")]
    InvalidRoot { path: PathBuf },
}

/// The plugin hook that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    ResolveId,
    Load,
    Transform,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ResolveId => "resolveId",
            Self::Load => "load",
            Self::Transform => "transform",
        })
    }
}

/// A plugin hook raised an error; the whole pipeline for the module is aborted.
#[derive(Error, Debug)]
#[error("[{plugin}] {hook} failed for {module_id}: {cause}")]
pub struct TransformError {
    /// Name of the plugin whose hook failed.
    pub plugin: String,
    /// Which hook failed.
    pub hook: Hook,
    /// The module being processed.
    pub module_id: String,
    #[source]
    pub cause: BoxError,
}

/// Failure of a resolve → load → transform run.
///
/// "Unresolved" is not an error: it is `Ok(None)` from the pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Module not found: {id}")]
    NotFound { id: String },

    #[error("Failed to read {id}: {source}")]
    Io {
        id: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Transform(#[from] TransformError),
}

impl PipelineError {
    /// Whether this error should surface as a 404-equivalent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
