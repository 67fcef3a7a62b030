use crate::error::{CryptoError, Result};
use std::fmt;
use std::str::FromStr;

/// Key size used when the caller does not pick one (RSA only)
pub const DEFAULT_RSA_BITS: usize = 2048;

/// Smallest RSA modulus accepted for a node identity
pub const MIN_RSA_BITS: usize = 2048;

/// Signature algorithms a node identity can use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyAlgorithm {
    #[default]
    Ed25519,
    Rsa,
}

impl KeyAlgorithm {
    /// All supported algorithms
    pub const ALL: [KeyAlgorithm; 2] = [KeyAlgorithm::Ed25519, KeyAlgorithm::Rsa];

    /// Leading byte of every encoded key of this algorithm
    pub fn tag(self) -> u8 {
        match self {
            KeyAlgorithm::Ed25519 => 0x01,
            KeyAlgorithm::Rsa => 0x02,
        }
    }

    /// Inverse of [`KeyAlgorithm::tag`]
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0x01 => Ok(KeyAlgorithm::Ed25519),
            0x02 => Ok(KeyAlgorithm::Rsa),
            other => Err(CryptoError::InvalidKey(format!(
                "unknown algorithm tag 0x{:02x}",
                other
            ))),
        }
    }

    /// Lowercase name used on the command line and in config files
    pub fn as_str(self) -> &'static str {
        match self {
            KeyAlgorithm::Ed25519 => "ed25519",
            KeyAlgorithm::Rsa => "rsa",
        }
    }

    /// Whether `bits` has any effect for this algorithm
    pub fn has_variable_size(self) -> bool {
        matches!(self, KeyAlgorithm::Rsa)
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyAlgorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ed25519" => Ok(KeyAlgorithm::Ed25519),
            "rsa" => Ok(KeyAlgorithm::Rsa),
            _ => Err(CryptoError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("Ed25519".parse::<KeyAlgorithm>().unwrap(), KeyAlgorithm::Ed25519);
        assert_eq!("RSA".parse::<KeyAlgorithm>().unwrap(), KeyAlgorithm::Rsa);
    }

    #[test]
    fn test_unknown_algorithm() {
        let err = "secp256k1".parse::<KeyAlgorithm>().unwrap_err();
        assert!(matches!(err, CryptoError::UnsupportedAlgorithm(ref a) if a == "secp256k1"));
    }

    #[test]
    fn test_tag_round_trip() {
        for algorithm in KeyAlgorithm::ALL {
            assert_eq!(KeyAlgorithm::from_tag(algorithm.tag()).unwrap(), algorithm);
        }
        assert!(KeyAlgorithm::from_tag(0xff).is_err());
    }
}
