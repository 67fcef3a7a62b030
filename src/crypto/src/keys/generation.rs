use crate::error::{CryptoError, Result};
use crate::keys::algorithm::{KeyAlgorithm, MIN_RSA_BITS};
use crate::keys::keypair::PrivateKey;
use crate::keys::peer_id::PeerId;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use ed25519_dalek::SigningKey;
use rand::RngCore;
use rsa::RsaPrivateKey;
use std::io::Write;

/// Node identity: a private key and the peer id derived from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub peer_id: PeerId,
    pub private_key: PrivateKey,
}

impl Identity {
    /// Wrap an existing private key, deriving its peer id
    pub fn from_private_key(private_key: PrivateKey) -> Result<Self> {
        let peer_id = private_key.peer_id()?;
        Ok(Identity {
            peer_id,
            private_key,
        })
    }

    /// Generate a fresh identity, writing progress lines to `out`.
    ///
    /// `bits` only matters for variable-size algorithms.
    pub fn generate(algorithm: &str, bits: usize, out: &mut dyn Write) -> Result<Self> {
        let algorithm: KeyAlgorithm = algorithm.parse()?;

        if algorithm.has_variable_size() {
            write!(out, "generating {}-bit {} keypair...", bits, algorithm.as_str().to_uppercase())?;
        } else {
            write!(out, "generating {} keypair...", algorithm.as_str().to_uppercase())?;
        }
        out.flush()?;

        let private_key = generate_private_key(algorithm, bits)?;
        writeln!(out, "done")?;

        let identity = Identity::from_private_key(private_key)?;
        writeln!(out, "peer identity: {}", identity.peer_id)?;
        Ok(identity)
    }

    /// Base64 form stored in the node config
    pub fn encode_private_key(&self) -> Result<String> {
        encode_private_key(&self.private_key)
    }
}

/// Reject key sizes `generate_private_key` would refuse, without generating
pub fn check_key_size(algorithm: KeyAlgorithm, bits: usize) -> Result<()> {
    if algorithm.has_variable_size() && bits < MIN_RSA_BITS {
        return Err(CryptoError::KeyGeneration(format!(
            "rsa keys must be >= {} bits to be useful, got {}",
            MIN_RSA_BITS, bits
        )));
    }
    Ok(())
}

/// Generate a private key of the given algorithm
pub fn generate_private_key(algorithm: KeyAlgorithm, bits: usize) -> Result<PrivateKey> {
    match algorithm {
        KeyAlgorithm::Ed25519 => {
            let mut csprng = rand::rngs::OsRng;
            let mut seed = [0u8; 32];
            csprng
                .try_fill_bytes(&mut seed)
                .map_err(|e| CryptoError::KeyGeneration(format!("entropy source failed: {}", e)))?;
            Ok(PrivateKey::Ed25519(SigningKey::from_bytes(&seed)))
        }
        KeyAlgorithm::Rsa => {
            check_key_size(algorithm, bits)?;
            let mut rng = rand::rngs::OsRng;
            let key = RsaPrivateKey::new(&mut rng, bits)
                .map_err(|e| CryptoError::KeyGeneration(format!("RSA-{}: {}", bits, e)))?;
            Ok(PrivateKey::Rsa(key))
        }
    }
}

/// Base64 (standard alphabet) of the tagged private key encoding
pub fn encode_private_key(key: &PrivateKey) -> Result<String> {
    Ok(STANDARD.encode(key.encode()?))
}

/// Inverse of [`encode_private_key`]
pub fn decode_private_key(encoded: &str) -> Result<PrivateKey> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| CryptoError::Deserialization(format!("private key is not base64: {}", e)))?;
    PrivateKey::decode(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ed25519_generation_reports_progress() {
        let mut out = Vec::new();
        let identity = Identity::generate("ed25519", 2048, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("generating ED25519 keypair...done\n"));
        assert!(text.contains(&format!("peer identity: {}", identity.peer_id)));
        assert_eq!(identity.private_key.algorithm(), KeyAlgorithm::Ed25519);
    }

    #[test]
    fn test_generated_keys_are_independent() {
        let a = generate_private_key(KeyAlgorithm::Ed25519, 0).unwrap();
        let b = generate_private_key(KeyAlgorithm::Ed25519, 0).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_rsa_rejects_small_keys() {
        let err = generate_private_key(KeyAlgorithm::Rsa, 1024).unwrap_err();
        assert!(matches!(err, CryptoError::KeyGeneration(ref m) if m.contains(">= 2048")));
    }

    #[test]
    fn test_unsupported_algorithm_writes_nothing() {
        let mut out = Vec::new();
        let err = Identity::generate("dsa", 2048, &mut out).unwrap_err();
        assert!(matches!(err, CryptoError::UnsupportedAlgorithm(_)));
        assert!(out.is_empty());
    }

    #[test]
    fn test_private_key_base64_round_trip() {
        let identity = Identity::generate("ed25519", 0, &mut std::io::sink()).unwrap();
        let encoded = identity.encode_private_key().unwrap();
        assert_eq!(decode_private_key(&encoded).unwrap(), identity.private_key);
        assert!(decode_private_key("not base64 !!").is_err());
    }
}
