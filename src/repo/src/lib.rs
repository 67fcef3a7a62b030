//! # CretoAI Node Repository
//!
//! On-disk home of a node: its config (including the active identity), the
//! keystore of retired keys, and the lock that keeps a second process from
//! writing either while the node is running.
//!
//! ## Module Structure
//!
//! ```text
//! repo/
//! ├── config    - config.toml model and validation
//! ├── fsrepo    - repository layout, open/init, atomic config writes
//! ├── keystore  - Keystore trait, file-backed and in-memory stores
//! └── lock      - repo.lock advisory locking
//! ```

pub mod config;
pub mod error;
pub mod fsrepo;
pub mod keystore;
pub mod lock;

pub use config::{Config, IdentitySection};
pub use error::{KeystoreError, RepoError, Result};
pub use fsrepo::{resolve_repo_path, FsRepo, ENV_REPO_PATH};
pub use keystore::{FsKeystore, Keystore, MemoryKeystore};
pub use lock::locked_by_other_process;

/// Whole-document access to a node's config and keystore
pub trait Repo {
    type Keystore: Keystore;

    /// Read the current config
    fn config(&self) -> Result<Config>;

    /// Durably replace the config in one atomic write
    fn set_config(&mut self, config: &Config) -> Result<()>;

    /// Keystore holding retired keys
    fn keystore(&self) -> &Self::Keystore;
}
