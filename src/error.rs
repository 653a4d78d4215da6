//! Error types for the extension host

use std::path::PathBuf;

use thiserror::Error;

use crate::plugins::Phase;

/// Result type alias for extension host operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while discovering, registering or initializing extensions
///
/// Every variant that concerns a single extension carries its id or directory so an
/// operator can locate the misbehaving plugin from the message alone.
#[derive(Debug, Error)]
pub enum Error {
    /// An extension root could not be listed
    #[error("failed to list extension directory {}: {source}", path.display())]
    ListDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A manifest or fragment file could not be read
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A manifest or package descriptor is not valid JSON
    #[error("malformed manifest {}: {source}", path.display())]
    Manifest {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// A manifest was found but no id could be derived for it
    #[error("extension in {} declares no id and has no package name", dir.display())]
    MissingId { dir: PathBuf },

    /// The declared type is not one of the known categories
    #[error("extension `{id}` in {} has unknown type `{kind}`", dir.display())]
    UnknownCategory {
        id: String,
        kind: String,
        dir: PathBuf,
    },

    /// Two extensions normalize to the same id
    #[error(
        "duplicate extension id `{id}`: {} conflicts with {}",
        dir.display(),
        existing.display()
    )]
    DuplicateId {
        id: String,
        dir: PathBuf,
        existing: PathBuf,
    },

    /// The id collides with a name the host reserves for itself
    #[error("extension id `{id}` in {} is reserved by the host", dir.display())]
    ReservedId { id: String, dir: PathBuf },

    /// The id contains a character that can't appear in a route path segment
    #[error(
        "extension id `{id}` in {} contains {character:?}, which is not allowed in route paths",
        dir.display()
    )]
    InvalidId {
        id: String,
        character: char,
        dir: PathBuf,
    },

    /// A path-valued capability failed to load
    #[error("failed to load {phase} entry {} for extension `{id}`: {source:#}", path.display())]
    Resolve {
        id: String,
        phase: Phase,
        path: PathBuf,
        source: anyhow::Error,
    },

    /// A category hook reported failure
    #[error("extension `{id}` ({}) failed during {phase} setup: {source:#}", dir.display())]
    Dispatch {
        id: String,
        phase: Phase,
        dir: PathBuf,
        source: anyhow::Error,
    },

    /// A fragment the extension explicitly declared does not exist
    #[error("extension `{id}` declares missing fragment {}: {source}", path.display())]
    MissingFragment {
        id: String,
        path: PathBuf,
        source: std::io::Error,
    },

    /// A declared fragment or template exists but could not be read
    #[error("failed to read {} for extension `{id}`: {source}", path.display())]
    Fragment {
        id: String,
        path: PathBuf,
        source: std::io::Error,
    },

    /// Static files could not be mounted for an extension
    #[error("failed to mount {path} for extension `{id}`: {source:#}")]
    Mount {
        id: String,
        path: String,
        source: anyhow::Error,
    },

    /// Stylesheet preprocessing failed
    #[error("stylesheet compilation failed for extension `{id}` ({}): {message}", path.display())]
    Stylesheet {
        id: String,
        path: PathBuf,
        message: String,
    },

    /// A generated bundle could not be written
    #[error("failed to write bundle {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Extension id the error concerns, when there is one
    #[must_use]
    pub fn extension_id(&self) -> Option<&str> {
        match self {
            Self::UnknownCategory { id, .. }
            | Self::DuplicateId { id, .. }
            | Self::ReservedId { id, .. }
            | Self::InvalidId { id, .. }
            | Self::Resolve { id, .. }
            | Self::Dispatch { id, .. }
            | Self::MissingFragment { id, .. }
            | Self::Fragment { id, .. }
            | Self::Mount { id, .. }
            | Self::Stylesheet { id, .. } => Some(id),
            _ => None,
        }
    }
}
