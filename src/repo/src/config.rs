//! Node configuration stored in `<repo>/config.toml`
//!
//! The config is always read and written as a whole document. Sections this
//! crate does not know about are kept in [`Config::extra`] so a
//! read-modify-write never drops settings owned by other subsystems.

use crate::error::{RepoError, Result};
use cretoai_crypto::keys::{decode_private_key, Identity, PeerId, PrivateKey};
use cretoai_crypto::CryptoError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete node configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Config {
    pub identity: IdentitySection,

    #[serde(default)]
    pub node: NodeSection,

    #[serde(default)]
    pub network: NetworkSection,

    /// Sections owned by other subsystems, preserved verbatim
    #[serde(flatten)]
    pub extra: toml::Table,
}

/// Active node identity
#[derive(Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct IdentitySection {
    pub peer_id: String,
    pub priv_key: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct NodeSection {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_true")]
    pub colored_logs: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct NetworkSection {
    #[serde(default = "default_listen_addrs")]
    pub listen_addrs: Vec<String>,
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
    #[serde(default = "default_max_peers")]
    pub max_peers: usize,
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_ms: u64,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            colored_logs: true,
        }
    }
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            listen_addrs: default_listen_addrs(),
            bootstrap_peers: Vec::new(),
            max_peers: default_max_peers(),
            connection_timeout_ms: default_connection_timeout(),
        }
    }
}

// Default value functions
fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_listen_addrs() -> Vec<String> { vec!["/ip4/0.0.0.0/tcp/4001".to_string()] }
fn default_max_peers() -> usize { 50 }
fn default_connection_timeout() -> u64 { 30000 }

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl IdentitySection {
    /// Config form of a freshly generated identity
    pub fn from_identity(identity: &Identity) -> std::result::Result<Self, CryptoError> {
        Ok(Self {
            peer_id: identity.peer_id.to_string(),
            priv_key: identity.encode_private_key()?,
        })
    }

    pub fn peer_id(&self) -> std::result::Result<PeerId, CryptoError> {
        self.peer_id.parse()
    }

    /// Decode the stored private key without checking it against `peer_id`
    pub fn decode_private_key(&self) -> std::result::Result<PrivateKey, CryptoError> {
        decode_private_key(&self.priv_key)
    }

    /// Decode the stored key and confirm it derives the stored peer id
    pub fn to_identity(&self) -> std::result::Result<Identity, CryptoError> {
        let expected = self.peer_id()?;
        let identity = Identity::from_private_key(self.decode_private_key()?)?;
        if identity.peer_id != expected {
            return Err(CryptoError::PeerIdMismatch {
                expected: self.peer_id.clone(),
                actual: identity.peer_id.to_string(),
            });
        }
        Ok(identity)
    }
}

impl std::fmt::Debug for IdentitySection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentitySection")
            .field("peer_id", &self.peer_id)
            .field("priv_key", &"<redacted>")
            .finish()
    }
}

impl Config {
    /// Default configuration around an identity
    pub fn new(identity: IdentitySection) -> Self {
        Self {
            identity,
            node: NodeSection::default(),
            network: NetworkSection::default(),
            extra: toml::Table::new(),
        }
    }

    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RepoError::io("read config", path, e))?;
        toml::from_str(&contents).map_err(|source| RepoError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.identity.priv_key.trim().is_empty() {
            return Err(RepoError::InvalidConfig("identity.priv_key is empty".to_string()));
        }

        self.identity
            .peer_id()
            .map_err(|e| RepoError::InvalidConfig(format!("identity.peer_id: {}", e)))?;

        if !LOG_LEVELS.contains(&self.node.log_level.as_str()) {
            return Err(RepoError::InvalidConfig(format!(
                "node.log_level must be one of {:?}",
                LOG_LEVELS
            )));
        }

        if self.network.max_peers == 0 {
            return Err(RepoError::InvalidConfig("network.max_peers must be > 0".to_string()));
        }

        if self.network.listen_addrs.is_empty() {
            return Err(RepoError::InvalidConfig(
                "network.listen_addrs must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
