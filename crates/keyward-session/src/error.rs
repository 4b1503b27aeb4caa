//! Error types for session storage.

use std::path::PathBuf;

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading or mutating the session.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The session medium could not be written.
    #[error("session storage unavailable at '{}': {source}", path.display())]
    StorageUnavailable {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The persisted session could not be decoded.
    #[error("session storage is corrupt: {0}")]
    Corrupt(String),

    /// An identity was offered while no credential is held.
    #[error("cannot cache an identity without a credential")]
    IdentityWithoutCredential,

    /// The credential an identity was resolved with is no longer held.
    #[error("credential changed while the identity was being resolved")]
    CredentialChanged,
}

impl Error {
    /// Whether this error means the medium itself refused the operation.
    pub fn is_storage_unavailable(&self) -> bool {
        matches!(self, Error::StorageUnavailable { .. })
    }
}
