//! # CretoAI Identity Cryptography
//!
//! Key material for node identities.
//!
//! ## Features
//!
//! - **Tagged Keys**: Ed25519 and RSA behind one `PrivateKey` / `PublicKey` variant
//! - **Peer IDs**: BLAKE3-derived public identifiers
//! - **Identity Generation**: fresh, independent keypairs with progress output
//! - **Encoding**: stable `tag || body` binary form and its base64 config form
//!
//! ## Module Structure
//!
//! ```text
//! crypto/
//! ├── hash        - BLAKE3 hashing
//! └── keys/       - Algorithms, key variants, peer ids, generation
//! ```

pub mod error;
pub mod hash;
pub mod keys;

pub use error::{CryptoError, Result};
pub use keys::{Identity, KeyAlgorithm, PeerId, PrivateKey, PublicKey};
