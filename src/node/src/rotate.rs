//! Node identity rotation
//!
//! Replaces the active identity in `config.toml` with a freshly generated one
//! after archiving the old private key in the keystore:
//!
//! ```text
//! Idle -> LockChecked -> ConfigLoaded -> OldKeyArchived -> NewKeyGenerated -> ConfigPersisted
//! ```
//!
//! Any state can fail. The archive write and the config write are two
//! separate durable operations; a failure after archiving leaves the archived
//! entry in place and the config untouched.

use crate::archive::{self, ArchiveError, DEFAULT_LABEL};
use chrono::{DateTime, Utc};
use cretoai_crypto::keys::{check_key_size, Identity, KeyAlgorithm, PeerId, DEFAULT_RSA_BITS};
use cretoai_crypto::CryptoError;
use cretoai_repo::{locked_by_other_process, FsRepo, IdentitySection, KeystoreError, Repo, RepoError};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_ALGORITHM: &str = "ed25519";
pub const DEFAULT_BITS: usize = DEFAULT_RSA_BITS;

/// Rotation state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Idle,
    LockChecked,
    ConfigLoaded,
    OldKeyArchived,
    NewKeyGenerated,
    ConfigPersisted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "Idle",
            Stage::LockChecked => "LockChecked",
            Stage::ConfigLoaded => "ConfigLoaded",
            Stage::OldKeyArchived => "OldKeyArchived",
            Stage::NewKeyGenerated => "NewKeyGenerated",
            Stage::ConfigPersisted => "ConfigPersisted",
        };
        f.write_str(name)
    }
}

/// Repository step an I/O failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoStep {
    LockCheck,
    Open,
    ReadConfig,
}

impl fmt::Display for IoStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoStep::LockCheck => write!(f, "check repository lock"),
            IoStep::Open => write!(f, "open repository"),
            IoStep::ReadConfig => write!(f, "read config"),
        }
    }
}

/// A failed rotation: the last state reached plus what went wrong
#[derive(Debug, Error)]
#[error("identity rotation failed after reaching {stage}")]
pub struct RotateError {
    pub stage: Stage,
    #[source]
    pub kind: RotateErrorKind,
}

#[derive(Debug, Error)]
pub enum RotateErrorKind {
    #[error("node is running: repository {0} is locked by another process; please stop it to run this command")]
    Precondition(PathBuf),

    #[error("failed to {step}")]
    Io {
        step: IoStep,
        #[source]
        source: RepoError,
    },

    #[error("active identity in config cannot be decoded; nothing was changed")]
    Decode(#[source] CryptoError),

    #[error("unsupported key algorithm; the old key is archived and config is unchanged")]
    UnsupportedAlgorithm(#[source] CryptoError),

    #[error("key generation failed; the old key is archived and config is unchanged")]
    Generation(#[source] CryptoError),

    #[error("keystore already holds an entry named {0:?}; config is unchanged")]
    NameCollision(String),

    #[error("failed to archive the active key; config is unchanged")]
    Store(#[source] KeystoreError),

    #[error(
        "config write failed: the old key of {old_peer_id} is archived as {archived_as:?} \
         but config still names it as active, and the generated identity {new_peer_id} \
         was discarded. Rerun rotation once the write problem is fixed; if config.toml \
         is damaged, restore the old key from the keystore entry"
    )]
    Persist {
        old_peer_id: PeerId,
        new_peer_id: PeerId,
        archived_as: String,
        #[source]
        source: RepoError,
    },
}

impl RotateError {
    /// Failure category name, stable for scripts and tests
    pub fn category(&self) -> &'static str {
        match self.kind {
            RotateErrorKind::Precondition(_) => "PreconditionError",
            RotateErrorKind::Io { .. } => "IOFailure",
            RotateErrorKind::Decode(_) => "DecodeFailure",
            RotateErrorKind::UnsupportedAlgorithm(_) => "UnsupportedAlgorithm",
            RotateErrorKind::Generation(_) => "GenerationFailure",
            RotateErrorKind::NameCollision(_) => "NameCollision",
            RotateErrorKind::Store(_) => "StoreFailure",
            RotateErrorKind::Persist { .. } => "PersistFailure",
        }
    }

    /// Whether the old key reached the keystore before the failure
    pub fn old_key_archived(&self) -> bool {
        self.stage >= Stage::OldKeyArchived
    }
}

/// Parameters for a rotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotateOptions {
    /// Key algorithm name, e.g. `ed25519` or `rsa`
    pub algorithm: String,
    /// Key size, only used by variable-size algorithms
    pub bits: usize,
    /// Prefix of the archived key's keystore name
    pub label: String,
}

impl Default for RotateOptions {
    fn default() -> Self {
        Self {
            algorithm: DEFAULT_ALGORITHM.to_string(),
            bits: DEFAULT_BITS,
            label: DEFAULT_LABEL.to_string(),
        }
    }
}

impl RotateOptions {
    /// Check the key parameters before anything is archived.
    ///
    /// `Rotation` itself only sees bad parameters after the archive step,
    /// which leaves an extra keystore entry behind; callers taking user input
    /// check first.
    pub fn validate(&self) -> Result<KeyAlgorithm, CryptoError> {
        let algorithm: KeyAlgorithm = self.algorithm.parse()?;
        check_key_size(algorithm, self.bits)?;
        Ok(algorithm)
    }
}

/// Result of a completed rotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationOutcome {
    pub old_peer_id: PeerId,
    pub new_peer_id: PeerId,
    pub algorithm: KeyAlgorithm,
    /// Keystore name of the archived old key
    pub archived_as: String,
}

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// One run of the rotation state machine
pub struct Rotation {
    options: RotateOptions,
    clock: Clock,
    stage: Stage,
}

impl Rotation {
    pub fn new(options: RotateOptions) -> Self {
        Self {
            options,
            clock: Box::new(Utc::now),
            stage: Stage::Idle,
        }
    }

    /// Replace the clock used to timestamp the archive entry
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Box::new(clock);
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Rotate the identity of the repository at `repo_root`.
    ///
    /// Progress from key generation goes to `out`.
    pub fn run(mut self, repo_root: &Path, out: &mut dyn Write) -> Result<RotationOutcome, RotateError> {
        info!("rotating identity of repository {:?}", repo_root);

        match locked_by_other_process(repo_root) {
            Ok(false) => {}
            Ok(true) => {
                return Err(self.fail(RotateErrorKind::Precondition(repo_root.to_path_buf())));
            }
            Err(source) => {
                return Err(self.fail(RotateErrorKind::Io {
                    step: IoStep::LockCheck,
                    source,
                }));
            }
        }
        self.advance(Stage::LockChecked);

        // The node can still grab the lock between the check and here
        let mut repo = FsRepo::open(repo_root).map_err(|e| match e {
            RepoError::Locked { path, .. } => self.fail(RotateErrorKind::Precondition(path)),
            source => self.fail(RotateErrorKind::Io {
                step: IoStep::Open,
                source,
            }),
        })?;

        let result = self.run_on(&mut repo, out);
        repo.close();
        result
    }

    /// Rotate the identity of an already opened repository.
    ///
    /// The caller must hold the repository exclusively; no lock check is done.
    pub fn run_on<R: Repo>(&mut self, repo: &mut R, out: &mut dyn Write) -> Result<RotationOutcome, RotateError> {
        if self.stage == Stage::Idle {
            self.advance(Stage::LockChecked);
        }

        let mut config = repo.config().map_err(|source| {
            self.fail(RotateErrorKind::Io {
                step: IoStep::ReadConfig,
                source,
            })
        })?;
        self.advance(Stage::ConfigLoaded);

        // Archive before generating so the old key is safe whatever happens next
        let archived = archive::archive(repo.keystore(), &config.identity, &self.options.label, (self.clock)())
            .map_err(|e| {
                self.fail(match e {
                    ArchiveError::Decode(e) => RotateErrorKind::Decode(e),
                    ArchiveError::NameCollision(name) => RotateErrorKind::NameCollision(name),
                    ArchiveError::Store(e) => RotateErrorKind::Store(e),
                })
            })?;
        self.advance(Stage::OldKeyArchived);

        debug!(algorithm = %self.options.algorithm, bits = self.options.bits, "generating new identity");
        let identity = Identity::generate(&self.options.algorithm, self.options.bits, out)
            .map_err(|e| self.fail(generation_error(e)))?;
        let section = IdentitySection::from_identity(&identity).map_err(|e| self.fail(generation_error(e)))?;
        self.advance(Stage::NewKeyGenerated);

        config.identity = section;
        if let Err(source) = repo.set_config(&config) {
            warn!(
                archived_as = %archived.name,
                "config write failed after archiving; old identity remains active"
            );
            return Err(self.fail(RotateErrorKind::Persist {
                old_peer_id: archived.peer_id,
                new_peer_id: identity.peer_id,
                archived_as: archived.name,
                source,
            }));
        }
        self.advance(Stage::ConfigPersisted);

        info!(
            old_peer_id = %archived.peer_id,
            new_peer_id = %identity.peer_id,
            "identity rotated"
        );
        Ok(RotationOutcome {
            old_peer_id: archived.peer_id,
            new_peer_id: identity.peer_id,
            algorithm: identity.private_key.algorithm(),
            archived_as: archived.name,
        })
    }

    fn advance(&mut self, to: Stage) {
        debug!(from = %self.stage, to = %to, "rotation state");
        self.stage = to;
    }

    fn fail(&self, kind: RotateErrorKind) -> RotateError {
        RotateError {
            stage: self.stage,
            kind,
        }
    }
}

impl fmt::Debug for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rotation")
            .field("options", &self.options)
            .field("stage", &self.stage)
            .finish_non_exhaustive()
    }
}

fn generation_error(e: CryptoError) -> RotateErrorKind {
    match e {
        CryptoError::UnsupportedAlgorithm(_) => RotateErrorKind::UnsupportedAlgorithm(e),
        other => RotateErrorKind::Generation(other),
    }
}

/// Rotate the identity of the repository at `repo_root` with the default label
pub fn rotate(
    repo_root: &Path,
    algorithm: &str,
    bits: usize,
    out: &mut dyn Write,
) -> Result<RotationOutcome, RotateError> {
    let options = RotateOptions {
        algorithm: algorithm.to_string(),
        bits,
        ..RotateOptions::default()
    };
    Rotation::new(options).run(repo_root, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cretoai_repo::{Config, Keystore, MemoryKeystore};

    /// In-memory repository for exercising the state machine without a disk
    struct MemoryRepo {
        config: Option<Config>,
        keystore: MemoryKeystore,
    }

    impl MemoryRepo {
        fn new() -> Self {
            let identity = Identity::generate("ed25519", 0, &mut std::io::sink()).unwrap();
            Self {
                config: Some(Config::new(IdentitySection::from_identity(&identity).unwrap())),
                keystore: MemoryKeystore::new(),
            }
        }
    }

    impl Repo for MemoryRepo {
        type Keystore = MemoryKeystore;

        fn config(&self) -> cretoai_repo::Result<Config> {
            self.config
                .clone()
                .ok_or_else(|| RepoError::InvalidConfig("no config".to_string()))
        }

        fn set_config(&mut self, config: &Config) -> cretoai_repo::Result<()> {
            self.config = Some(config.clone());
            Ok(())
        }

        fn keystore(&self) -> &MemoryKeystore {
            &self.keystore
        }
    }

    #[test]
    fn test_stage_order_matches_state_machine() {
        assert!(Stage::Idle < Stage::LockChecked);
        assert!(Stage::ConfigLoaded < Stage::OldKeyArchived);
        assert!(Stage::NewKeyGenerated < Stage::ConfigPersisted);
        assert_eq!(Stage::OldKeyArchived.to_string(), "OldKeyArchived");
    }

    #[test]
    fn test_run_on_memory_repo() {
        let mut repo = MemoryRepo::new();
        let before = repo.config().unwrap();
        let mut rotation = Rotation::new(RotateOptions::default());
        let mut progress = Vec::new();

        let outcome = rotation.run_on(&mut repo, &mut progress).unwrap();

        assert_eq!(rotation.stage(), Stage::ConfigPersisted);
        assert_eq!(outcome.old_peer_id.to_string(), before.identity.peer_id);
        assert_eq!(repo.config().unwrap().identity.peer_id, outcome.new_peer_id.to_string());
        assert_ne!(outcome.old_peer_id, outcome.new_peer_id);
        assert_eq!(repo.keystore.list().unwrap(), vec![outcome.archived_as.clone()]);

        let progress = String::from_utf8(progress).unwrap();
        assert!(progress.starts_with("generating ED25519 keypair...done"));
        assert!(progress.contains(&outcome.new_peer_id.to_string()));
    }

    #[test]
    fn test_missing_config_is_io_failure_before_archive() {
        let mut repo = MemoryRepo::new();
        repo.config = None;

        let err = Rotation::new(RotateOptions::default())
            .run_on(&mut repo, &mut std::io::sink())
            .unwrap_err();

        assert_eq!(err.category(), "IOFailure");
        assert_eq!(err.stage, Stage::LockChecked);
        assert!(!err.old_key_archived());
        assert!(repo.keystore.is_empty());
    }

    #[test]
    fn test_rsa_below_minimum_is_generation_failure() {
        let mut repo = MemoryRepo::new();
        let before = repo.config().unwrap();
        let options = RotateOptions {
            algorithm: "rsa".to_string(),
            bits: 1024,
            ..RotateOptions::default()
        };

        let err = Rotation::new(options).run_on(&mut repo, &mut std::io::sink()).unwrap_err();

        assert_eq!(err.category(), "GenerationFailure");
        assert_eq!(err.stage, Stage::OldKeyArchived);
        assert!(err.old_key_archived());
        assert_eq!(repo.config().unwrap(), before);
        assert_eq!(repo.keystore.len(), 1);
    }

    #[test]
    fn test_validate_rejects_bad_parameters_up_front() {
        let default = RotateOptions::default();
        assert_eq!(default.validate().unwrap(), KeyAlgorithm::Ed25519);

        let rsa = RotateOptions {
            algorithm: "RSA".to_string(),
            bits: 4096,
            ..RotateOptions::default()
        };
        assert_eq!(rsa.validate().unwrap(), KeyAlgorithm::Rsa);

        let small = RotateOptions {
            algorithm: "rsa".to_string(),
            bits: 512,
            ..RotateOptions::default()
        };
        assert!(matches!(small.validate(), Err(CryptoError::KeyGeneration(_))));

        let unknown = RotateOptions {
            algorithm: "dsa".to_string(),
            ..RotateOptions::default()
        };
        assert!(matches!(unknown.validate(), Err(CryptoError::UnsupportedAlgorithm(_))));

        // Ed25519 ignores the size
        let ed = RotateOptions {
            bits: 1,
            ..RotateOptions::default()
        };
        assert!(ed.validate().is_ok());
    }

    #[test]
    fn test_categories_cover_taxonomy() {
        let err = RotateError {
            stage: Stage::Idle,
            kind: RotateErrorKind::Precondition(PathBuf::from("/tmp/repo")),
        };
        assert_eq!(err.category(), "PreconditionError");
        assert!(err.kind.to_string().contains("please stop it to run this command"));
    }
}
