//! Tagged key variants
//!
//! Every supported algorithm shares one capability set: encode, decode and
//! derive the public identifier. Callers never branch on the concrete key
//! type; they hold a [`PrivateKey`] or [`PublicKey`] and ask it.
//!
//! Wire format (both private and public keys):
//!
//! ```text
//! +-----+---------------------------------------------+
//! | tag | body                                        |
//! +-----+---------------------------------------------+
//!  0x01   Ed25519: 32-byte seed / 32-byte point
//!  0x02   RSA:     PKCS#8 DER private key / SPKI DER public key
//! ```

use crate::error::{CryptoError, Result};
use crate::keys::algorithm::KeyAlgorithm;
use crate::keys::peer_id::PeerId;
use ed25519_dalek::{SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::fmt;

/// Private half of a node identity
#[derive(Clone, PartialEq, Eq)]
pub enum PrivateKey {
    Ed25519(SigningKey),
    Rsa(RsaPrivateKey),
}

/// Public half of a node identity
#[derive(Clone, PartialEq, Eq)]
pub enum PublicKey {
    Ed25519(VerifyingKey),
    Rsa(RsaPublicKey),
}

impl PrivateKey {
    /// Algorithm of this key
    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            PrivateKey::Ed25519(_) => KeyAlgorithm::Ed25519,
            PrivateKey::Rsa(_) => KeyAlgorithm::Rsa,
        }
    }

    /// Derive the matching public key
    pub fn public_key(&self) -> PublicKey {
        match self {
            PrivateKey::Ed25519(key) => PublicKey::Ed25519(key.verifying_key()),
            PrivateKey::Rsa(key) => PublicKey::Rsa(key.to_public_key()),
        }
    }

    /// Public identifier of the identity this key belongs to
    pub fn peer_id(&self) -> Result<PeerId> {
        self.public_key().peer_id()
    }

    /// Encode as `tag || body`
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = vec![self.algorithm().tag()];
        match self {
            PrivateKey::Ed25519(key) => out.extend_from_slice(&key.to_bytes()),
            PrivateKey::Rsa(key) => {
                let der = key
                    .to_pkcs8_der()
                    .map_err(|e| CryptoError::Serialization(format!("RSA PKCS#8: {}", e)))?;
                out.extend_from_slice(der.as_bytes());
            }
        }
        Ok(out)
    }

    /// Decode bytes produced by [`PrivateKey::encode`]
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (tag, body) = bytes
            .split_first()
            .ok_or_else(|| CryptoError::Deserialization("empty private key".to_string()))?;

        match KeyAlgorithm::from_tag(*tag)? {
            KeyAlgorithm::Ed25519 => {
                let seed: [u8; 32] = body.try_into().map_err(|_| {
                    CryptoError::Deserialization(format!(
                        "ed25519 private key must be 32 bytes, got {}",
                        body.len()
                    ))
                })?;
                Ok(PrivateKey::Ed25519(SigningKey::from_bytes(&seed)))
            }
            KeyAlgorithm::Rsa => RsaPrivateKey::from_pkcs8_der(body)
                .map(PrivateKey::Rsa)
                .map_err(|_| CryptoError::InvalidSecretKey),
        }
    }
}

impl PublicKey {
    /// Algorithm of this key
    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            PublicKey::Ed25519(_) => KeyAlgorithm::Ed25519,
            PublicKey::Rsa(_) => KeyAlgorithm::Rsa,
        }
    }

    /// Key size in bits (256 for Ed25519)
    pub fn bits(&self) -> usize {
        match self {
            PublicKey::Ed25519(_) => 256,
            PublicKey::Rsa(key) => key.size() * 8,
        }
    }

    /// Encode as `tag || body`
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = vec![self.algorithm().tag()];
        match self {
            PublicKey::Ed25519(key) => out.extend_from_slice(key.as_bytes()),
            PublicKey::Rsa(key) => {
                let der = key
                    .to_public_key_der()
                    .map_err(|e| CryptoError::Serialization(format!("RSA SPKI: {}", e)))?;
                out.extend_from_slice(der.as_bytes());
            }
        }
        Ok(out)
    }

    /// Decode bytes produced by [`PublicKey::encode`]
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (tag, body) = bytes
            .split_first()
            .ok_or_else(|| CryptoError::Deserialization("empty public key".to_string()))?;

        match KeyAlgorithm::from_tag(*tag)? {
            KeyAlgorithm::Ed25519 => {
                let point: [u8; 32] = body.try_into().map_err(|_| CryptoError::InvalidPublicKey)?;
                VerifyingKey::from_bytes(&point)
                    .map(PublicKey::Ed25519)
                    .map_err(|_| CryptoError::InvalidPublicKey)
            }
            KeyAlgorithm::Rsa => RsaPublicKey::from_public_key_der(body)
                .map(PublicKey::Rsa)
                .map_err(|_| CryptoError::InvalidPublicKey),
        }
    }

    /// Public identifier derived from this key
    pub fn peer_id(&self) -> Result<PeerId> {
        Ok(PeerId::from_encoded_public_key(&self.encode()?))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("algorithm", &self.algorithm())
            .field("bytes", &"<redacted>")
            .finish()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("algorithm", &self.algorithm())
            .field("bits", &self.bits())
            .finish()
    }
}
