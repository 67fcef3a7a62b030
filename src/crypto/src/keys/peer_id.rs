use crate::error::{CryptoError, Result};
use crate::hash::BLAKE3Hash;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use std::fmt;
use std::str::FromStr;

/// Length of the textual form (base64url of a 32-byte digest)
pub const PEER_ID_LEN: usize = 43;

/// Public identifier of a node, derived from its public key
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId([u8; 32]);

impl PeerId {
    /// BLAKE3 of the tagged public key encoding
    pub fn from_encoded_public_key(encoded: &[u8]) -> Self {
        PeerId(*BLAKE3Hash::hash(encoded).as_bytes())
    }

    pub fn to_base64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self)
    }
}

impl FromStr for PeerId {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != PEER_ID_LEN {
            return Err(CryptoError::InvalidPeerId(format!(
                "expected {} characters, got {}",
                PEER_ID_LEN,
                s.len()
            )));
        }
        let bytes = URL_SAFE_NO_PAD
            .decode(s)
            .map_err(|e| CryptoError::InvalidPeerId(e.to_string()))?;
        let digest: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidPeerId("digest must be 32 bytes".to_string()))?;
        Ok(PeerId(digest))
    }
}
