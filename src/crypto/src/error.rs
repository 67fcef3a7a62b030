//! Error types for the cryptography module

use thiserror::Error;

/// Result type alias for cryptographic operations
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors that can occur during key generation and key encoding
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Algorithm name not recognized
    #[error("Unsupported key algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Key generation failed
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// Invalid key format
    #[error("Invalid key format: {0}")]
    InvalidKey(String),

    /// Invalid public key
    #[error("Invalid public key")]
    InvalidPublicKey,

    /// Invalid secret key
    #[error("Invalid secret key")]
    InvalidSecretKey,

    /// Peer identifier could not be parsed
    #[error("Invalid peer id: {0}")]
    InvalidPeerId(String),

    /// Stored peer id does not belong to the stored private key
    #[error("Peer id mismatch: config says {expected}, private key derives {actual}")]
    PeerIdMismatch { expected: String, actual: String },

    /// Key deserialization failed
    #[error("Key deserialization failed: {0}")]
    Deserialization(String),

    /// Key serialization failed
    #[error("Key serialization failed: {0}")]
    Serialization(String),

    /// Writing to the progress sink failed
    #[error("Progress output failed: {0}")]
    Output(#[from] std::io::Error),
}
