//! Filesystem repository
//!
//! ```text
//! <root>/
//! ├── config.toml   - node config, including the active identity
//! ├── keystore/     - archived private keys, one file each
//! ├── repo.lock     - held while a process has the repo open
//! └── version       - repository format version
//! ```

use crate::config::Config;
use crate::error::{RepoError, Result};
use crate::keystore::FsKeystore;
use crate::lock::{self, RepoLock};
use crate::Repo;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

pub const CONFIG_FILE: &str = "config.toml";
pub const KEYSTORE_DIR: &str = "keystore";
pub const VERSION_FILE: &str = "version";
pub const REPO_VERSION: u32 = 1;

/// Environment variable overriding the repository location
pub const ENV_REPO_PATH: &str = "CRETOAI_PATH";

/// Repository directory under `$HOME` when nothing else is configured
pub const DEFAULT_REPO_DIR: &str = ".cretoai";

/// Pick the repository root: explicit path, then `$CRETOAI_PATH`, then `~/.cretoai`
pub fn resolve_repo_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(ENV_REPO_PATH).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(|home| PathBuf::from(home).join(DEFAULT_REPO_DIR))
        .ok_or(RepoError::NoRepoPath(ENV_REPO_PATH))
}

/// An open repository; holds the repo lock until closed or dropped
#[derive(Debug)]
pub struct FsRepo {
    root: PathBuf,
    keystore: FsKeystore,
    lock: Option<RepoLock>,
}

impl FsRepo {
    /// Whether `root` holds a repository config
    pub fn is_initialized<P: AsRef<Path>>(root: P) -> bool {
        root.as_ref().join(CONFIG_FILE).is_file()
    }

    /// Create a new repository at `root` with the given config
    pub fn init<P: AsRef<Path>>(root: P, config: &Config) -> Result<()> {
        let root = root.as_ref();
        config.validate()?;

        fs::create_dir_all(root).map_err(|e| RepoError::io("create repository", root, e))?;
        let _lock = lock::lock(root)?;

        if Self::is_initialized(root) {
            return Err(RepoError::AlreadyInitialized(root.to_path_buf()));
        }

        write_atomic(&root.join(VERSION_FILE), format!("{}\n", REPO_VERSION).as_bytes(), 0o644)?;
        FsKeystore::open(root.join(KEYSTORE_DIR))
            .map_err(|e| RepoError::io("create keystore", root.join(KEYSTORE_DIR), e))?;
        write_atomic(&root.join(CONFIG_FILE), config.to_toml_string()?.as_bytes(), 0o600)?;

        info!("initialized repository at {:?} (peer {})", root, config.identity.peer_id);
        Ok(())
    }

    /// Open an existing repository, taking its lock
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !Self::is_initialized(&root) {
            return Err(RepoError::NotInitialized(root));
        }

        let lock = lock::lock(&root)?;
        check_version(&root)?;

        let keystore_dir = root.join(KEYSTORE_DIR);
        let keystore = FsKeystore::open(&keystore_dir)
            .map_err(|e| RepoError::io("open keystore", &keystore_dir, e))?;

        debug!("opened repository at {:?}", root);
        Ok(Self {
            root,
            keystore,
            lock: Some(lock),
        })
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    /// Release the repository lock
    pub fn close(mut self) {
        self.lock.take();
        debug!("closed repository at {:?}", self.root);
    }
}

impl Repo for FsRepo {
    type Keystore = FsKeystore;

    fn config(&self) -> Result<Config> {
        Config::load(self.config_path())
    }

    fn set_config(&mut self, config: &Config) -> Result<()> {
        let contents = config.to_toml_string()?;
        write_atomic(&self.config_path(), contents.as_bytes(), 0o600)?;
        debug!("wrote {:?}", self.config_path());
        Ok(())
    }

    fn keystore(&self) -> &FsKeystore {
        &self.keystore
    }
}

fn check_version(root: &Path) -> Result<()> {
    let path = root.join(VERSION_FILE);
    let found = fs::read_to_string(&path).map_err(|e| RepoError::io("read version", &path, e))?;
    let found = found.trim();
    if found != REPO_VERSION.to_string() {
        return Err(RepoError::UnsupportedVersion {
            found: found.to_string(),
            expected: REPO_VERSION,
        });
    }
    Ok(())
}

/// Replace `path` with `contents` so readers see either the old or the new file
fn write_atomic(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| RepoError::io("create temp file in", dir, e))?;
    tmp.write_all(contents)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| RepoError::io("write temp file for", path, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(tmp.path(), fs::Permissions::from_mode(mode))
            .map_err(|e| RepoError::io("set permissions on", tmp.path(), e))?;
    }
    #[cfg(not(unix))]
    {
        let _ = mode;
    }

    tmp.persist(path).map_err(|e| RepoError::io("replace", path, e.error))?;

    #[cfg(unix)]
    {
        fs::File::open(dir)
            .and_then(|d| d.sync_all())
            .map_err(|e| RepoError::io("sync directory", dir, e))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IdentitySection;
    use crate::keystore::Keystore;
    use cretoai_crypto::keys::Identity;
    use tempfile::TempDir;

    fn config() -> Config {
        let identity = Identity::generate("ed25519", 0, &mut std::io::sink()).unwrap();
        Config::new(IdentitySection::from_identity(&identity).unwrap())
    }

    #[test]
    fn test_init_creates_layout() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("repo");
        FsRepo::init(&root, &config()).unwrap();

        assert!(root.join(CONFIG_FILE).is_file());
        assert!(root.join(KEYSTORE_DIR).is_dir());
        assert_eq!(fs::read_to_string(root.join(VERSION_FILE)).unwrap().trim(), "1");
        assert!(matches!(
            FsRepo::init(&root, &config()),
            Err(RepoError::AlreadyInitialized(_))
        ));
    }

    #[test]
    fn test_open_requires_init() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(FsRepo::open(dir.path()), Err(RepoError::NotInitialized(_))));
    }

    #[test]
    fn test_open_holds_lock_until_close() {
        let dir = TempDir::new().unwrap();
        FsRepo::init(dir.path(), &config()).unwrap();

        let repo = FsRepo::open(dir.path()).unwrap();
        assert!(lock::locked_by_other_process(dir.path()).unwrap());
        assert!(matches!(FsRepo::open(dir.path()), Err(RepoError::Locked { .. })));

        repo.close();
        assert!(!lock::locked_by_other_process(dir.path()).unwrap());
    }

    #[test]
    fn test_set_config_replaces_whole_document() {
        let dir = TempDir::new().unwrap();
        let original = config();
        FsRepo::init(dir.path(), &original).unwrap();

        let mut repo = FsRepo::open(dir.path()).unwrap();
        assert_eq!(repo.config().unwrap(), original);

        let mut updated = original.clone();
        updated.network.max_peers = 7;
        repo.set_config(&updated).unwrap();
        assert_eq!(repo.config().unwrap(), updated);

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_rejects_unknown_version() {
        let dir = TempDir::new().unwrap();
        FsRepo::init(dir.path(), &config()).unwrap();
        fs::write(dir.path().join(VERSION_FILE), "99\n").unwrap();

        assert!(matches!(
            FsRepo::open(dir.path()),
            Err(RepoError::UnsupportedVersion { .. })
        ));
        // A failed open must not leave the repo locked
        assert!(!lock::locked_by_other_process(dir.path()).unwrap());
    }

    #[test]
    fn test_keystore_lives_in_repo() {
        let dir = TempDir::new().unwrap();
        FsRepo::init(dir.path(), &config()).unwrap();
        let repo = FsRepo::open(dir.path()).unwrap();
        assert_eq!(repo.keystore().dir(), dir.path().join(KEYSTORE_DIR));
        assert!(repo.keystore().list().unwrap().is_empty());
    }

    #[test]
    fn test_resolve_prefers_explicit_path() {
        let explicit = Path::new("/tmp/explicit-repo");
        assert_eq!(resolve_repo_path(Some(explicit)).unwrap(), explicit);
    }
}
