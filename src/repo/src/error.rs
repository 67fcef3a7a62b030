//! Error types for the repository module

use cretoai_crypto::CryptoError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RepoError>;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("repository at {path} is locked by another process{}", holder_suffix(.holder))]
    Locked { path: PathBuf, holder: Option<u32> },

    #[error("no repository found at {0} (run `cretoai-node init` first)")]
    NotInitialized(PathBuf),

    #[error("repository already initialized at {0}")]
    AlreadyInitialized(PathBuf),

    #[error("repository version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: String, expected: u32 },

    #[error("failed to {op} {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("cannot resolve repository path: set {0} or HOME")]
    NoRepoPath(&'static str),

    #[error(transparent)]
    Keystore(#[from] KeystoreError),
}

fn holder_suffix(holder: &Option<u32>) -> String {
    holder.map(|pid| format!(" (pid {})", pid)).unwrap_or_default()
}

impl RepoError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RepoError::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum KeystoreError {
    #[error("invalid key name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("key named {0:?} already exists in keystore")]
    NameCollision(String),

    #[error("no key named {0:?} in keystore")]
    NotFound(String),

    #[error("keystore write failed for {name:?}: {source}")]
    Store {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("keystore read failed for {name:?}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("keystore entry {name:?} is corrupt: {source}")]
    Decode {
        name: String,
        #[source]
        source: CryptoError,
    },

    #[error("cannot encode key for keystore: {0}")]
    Encode(#[source] CryptoError),

    #[error("keystore unavailable: {0}")]
    Unavailable(String),
}
