//! Named store for private keys that are no longer active
//!
//! Entries are insert-only from the point of view of identity rotation: a
//! `put` under an existing name fails instead of replacing the stored key.

use crate::error::KeystoreError;
use cretoai_crypto::keys::PrivateKey;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tempfile::NamedTempFile;
use tracing::debug;

pub type Result<T> = std::result::Result<T, KeystoreError>;

/// Key storage operations used by identity rotation
pub trait Keystore {
    /// Whether an entry with this name exists
    fn has(&self, name: &str) -> Result<bool>;

    /// Insert a key; fails with `NameCollision` if the name is taken
    fn put(&self, name: &str, key: &PrivateKey) -> Result<()>;

    /// Fetch and decode a key
    fn get(&self, name: &str) -> Result<PrivateKey>;

    /// Remove a key
    fn delete(&self, name: &str) -> Result<()>;

    /// All entry names, sorted
    fn list(&self) -> Result<Vec<String>>;
}

/// Reject names that could escape the keystore directory or hide as dotfiles
pub fn validate_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "name is empty"
    } else if name.contains('/') || name.contains('\\') {
        "name contains a path separator"
    } else if name.starts_with('.') {
        "name starts with '.'"
    } else if name.chars().any(char::is_control) {
        "name contains control characters"
    } else {
        return Ok(());
    };

    Err(KeystoreError::InvalidName {
        name: name.to_string(),
        reason,
    })
}

/// One file per key under `<repo>/keystore`
#[derive(Debug, Clone)]
pub struct FsKeystore {
    dir: PathBuf,
}

impl FsKeystore {
    /// Open (creating if needed) a keystore directory
    pub fn open<P: AsRef<Path>>(dir: P) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&dir, fs::Permissions::from_mode(0o700))?;
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.dir.join(name))
    }
}

impl Keystore for FsKeystore {
    fn has(&self, name: &str) -> Result<bool> {
        let path = self.entry_path(name)?;
        path.try_exists().map_err(|source| KeystoreError::Read {
            name: name.to_string(),
            source,
        })
    }

    fn put(&self, name: &str, key: &PrivateKey) -> Result<()> {
        let path = self.entry_path(name)?;
        if self.has(name)? {
            return Err(KeystoreError::NameCollision(name.to_string()));
        }

        let encoded = key.encode().map_err(KeystoreError::Encode)?;
        let store_err = |source: io::Error| KeystoreError::Store {
            name: name.to_string(),
            source,
        };

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(store_err)?;
        tmp.write_all(&encoded).map_err(store_err)?;
        tmp.as_file().sync_all().map_err(store_err)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o400)).map_err(store_err)?;
        }

        // Link into place only if the name is still free
        match tmp.persist_noclobber(&path) {
            Ok(_) => {}
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                return Err(KeystoreError::NameCollision(name.to_string()));
            }
            Err(e) => return Err(store_err(e.error)),
        }
        sync_dir(&self.dir).map_err(store_err)?;

        debug!(key_name = name, algorithm = %key.algorithm(), "stored key");
        Ok(())
    }

    fn get(&self, name: &str) -> Result<PrivateKey> {
        let path = self.entry_path(name)?;
        let bytes = fs::read(&path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                KeystoreError::NotFound(name.to_string())
            } else {
                KeystoreError::Read {
                    name: name.to_string(),
                    source,
                }
            }
        })?;
        PrivateKey::decode(&bytes).map_err(|source| KeystoreError::Decode {
            name: name.to_string(),
            source,
        })
    }

    fn delete(&self, name: &str) -> Result<()> {
        let path = self.entry_path(name)?;
        fs::remove_file(&path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                KeystoreError::NotFound(name.to_string())
            } else {
                KeystoreError::Store {
                    name: name.to_string(),
                    source,
                }
            }
        })?;
        sync_dir(&self.dir).map_err(|source| KeystoreError::Store {
            name: name.to_string(),
            source,
        })?;
        debug!(key_name = name, "deleted key");
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>> {
        let read_err = |source: io::Error| KeystoreError::Read {
            name: String::new(),
            source,
        };

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(read_err)? {
            let entry = entry.map_err(read_err)?;
            if !entry.file_type().map_err(read_err)?.is_file() {
                continue;
            }
            // Skips in-flight temp files, which are dotfiles
            if let Some(name) = entry.file_name().to_str() {
                if validate_name(name).is_ok() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

/// In-memory key storage (for tests and dry runs)
#[derive(Debug, Clone, Default)]
pub struct MemoryKeystore {
    keys: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryKeystore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.read().map(|keys| keys.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Keystore for MemoryKeystore {
    fn has(&self, name: &str) -> Result<bool> {
        validate_name(name)?;
        let keys = self.keys.read().map_err(|_| poisoned())?;
        Ok(keys.contains_key(name))
    }

    fn put(&self, name: &str, key: &PrivateKey) -> Result<()> {
        validate_name(name)?;
        let encoded = key.encode().map_err(KeystoreError::Encode)?;
        let mut keys = self.keys.write().map_err(|_| poisoned())?;
        if keys.contains_key(name) {
            return Err(KeystoreError::NameCollision(name.to_string()));
        }
        keys.insert(name.to_string(), encoded);
        Ok(())
    }

    fn get(&self, name: &str) -> Result<PrivateKey> {
        validate_name(name)?;
        let keys = self.keys.read().map_err(|_| poisoned())?;
        let bytes = keys
            .get(name)
            .ok_or_else(|| KeystoreError::NotFound(name.to_string()))?;
        PrivateKey::decode(bytes).map_err(|source| KeystoreError::Decode {
            name: name.to_string(),
            source,
        })
    }

    fn delete(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        let mut keys = self.keys.write().map_err(|_| poisoned())?;
        keys.remove(name)
            .map(|_| ())
            .ok_or_else(|| KeystoreError::NotFound(name.to_string()))
    }

    fn list(&self) -> Result<Vec<String>> {
        let keys = self.keys.read().map_err(|_| poisoned())?;
        Ok(keys.keys().cloned().collect())
    }
}

fn poisoned() -> KeystoreError {
    KeystoreError::Unavailable("keystore lock poisoned".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cretoai_crypto::keys::{generate_private_key, KeyAlgorithm};
    use tempfile::TempDir;

    fn key() -> PrivateKey {
        generate_private_key(KeyAlgorithm::Ed25519, 0).unwrap()
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("IdentityRotation-abc").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("../escape").is_err());
        assert!(validate_name(".hidden").is_err());
        assert!(validate_name("tab\there").is_err());
    }

    #[test]
    fn test_fs_put_get() {
        let dir = TempDir::new().unwrap();
        let store = FsKeystore::open(dir.path().join("keystore")).unwrap();
        let key = key();

        store.put("old-key", &key).unwrap();
        assert!(store.has("old-key").unwrap());
        assert_eq!(store.get("old-key").unwrap(), key);
        assert_eq!(store.list().unwrap(), vec!["old-key".to_string()]);
    }

    #[test]
    fn test_fs_put_never_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = FsKeystore::open(dir.path()).unwrap();
        let first = key();

        store.put("taken", &first).unwrap();
        let err = store.put("taken", &key()).unwrap_err();

        assert!(matches!(err, KeystoreError::NameCollision(ref n) if n == "taken"));
        assert_eq!(store.get("taken").unwrap(), first);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_fs_get_missing_and_delete() {
        let dir = TempDir::new().unwrap();
        let store = FsKeystore::open(dir.path()).unwrap();

        assert!(matches!(store.get("absent"), Err(KeystoreError::NotFound(_))));
        assert!(matches!(store.delete("absent"), Err(KeystoreError::NotFound(_))));

        store.put("present", &key()).unwrap();
        store.delete("present").unwrap();
        assert!(!store.has("present").unwrap());
    }

    #[test]
    fn test_fs_corrupt_entry_reports_decode_error() {
        let dir = TempDir::new().unwrap();
        let store = FsKeystore::open(dir.path()).unwrap();
        fs::write(dir.path().join("broken"), b"\x01short").unwrap();

        assert!(matches!(store.get("broken"), Err(KeystoreError::Decode { .. })));
    }

    #[test]
    fn test_fs_list_skips_dotfiles_and_dirs() {
        let dir = TempDir::new().unwrap();
        let store = FsKeystore::open(dir.path()).unwrap();
        fs::write(dir.path().join(".tmpXYZ"), b"partial").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        store.put("b", &key()).unwrap();
        store.put("a", &key()).unwrap();

        assert_eq!(store.list().unwrap(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_memory_keystore_matches_fs_semantics() {
        let store = MemoryKeystore::new();
        let key = key();

        store.put("k", &key).unwrap();
        assert!(matches!(store.put("k", &key), Err(KeystoreError::NameCollision(_))));
        assert_eq!(store.get("k").unwrap(), key);
        assert_eq!(store.len(), 1);

        store.delete("k").unwrap();
        assert!(store.is_empty());
        assert!(matches!(store.put("a/b", &key), Err(KeystoreError::InvalidName { .. })));
    }
}
