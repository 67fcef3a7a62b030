//! Repository lock file
//!
//! A running node holds an exclusive advisory lock on `<repo>/repo.lock` for
//! as long as it has the repository open. The lock is tied to the open file
//! description, so it disappears when the holder exits, even on a crash; the
//! file itself is left in place and only records the last holder's pid.

use crate::error::{RepoError, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const LOCK_FILE: &str = "repo.lock";

/// Lock file handle holding the exclusive lock; unlocks on drop
#[cfg(unix)]
type LockedFile = nix::fcntl::Flock<File>;

#[cfg(not(unix))]
type LockedFile = File;

/// Exclusive hold on a repository, released on drop
pub struct RepoLock {
    // Dropping the handle releases the lock
    _file: LockedFile,
    path: PathBuf,
}

impl std::fmt::Debug for RepoLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoLock").field("path", &self.path).finish()
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        debug!("releasing {:?}", self.path);
    }
}

/// Take the repository lock, failing immediately if someone else holds it
pub fn lock(repo_root: &Path) -> Result<RepoLock> {
    let path = repo_root.join(LOCK_FILE);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .map_err(|e| RepoError::io("open lock file", &path, e))?;

    let mut locked = match try_lock_exclusive(file).map_err(|e| RepoError::io("lock", &path, e))? {
        Ok(locked) => locked,
        Err(mut file) => {
            return Err(RepoError::Locked {
                path: repo_root.to_path_buf(),
                holder: read_pid(&mut file),
            });
        }
    };

    // Best effort: the pid only feeds error messages
    if let Err(e) = write_pid(&mut locked) {
        debug!("could not record pid in {:?}: {}", path, e);
    }

    debug!("acquired {:?}", path);
    Ok(RepoLock { _file: locked, path })
}

/// Whether another process currently holds the repository.
///
/// Tests the lock without creating the lock file; a repository that has
/// never been opened is not locked.
pub fn locked_by_other_process(repo_root: &Path) -> Result<bool> {
    let path = repo_root.join(LOCK_FILE);
    let file = match OpenOptions::new().read(true).write(true).open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(RepoError::io("open lock file", &path, e)),
    };

    // A successful check is released as soon as its handle drops
    match try_lock_exclusive(file).map_err(|e| RepoError::io("check lock", &path, e))? {
        Ok(_locked) => Ok(false),
        Err(_) => Ok(true),
    }
}

fn read_pid(file: &mut File) -> Option<u32> {
    let mut contents = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}

fn write_pid(file: &mut File) -> io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    writeln!(file, "{}", std::process::id())?;
    file.sync_data()
}

/// `Ok(Ok(locked))` on success, `Ok(Err(file))` if another holder has it
#[cfg(unix)]
fn try_lock_exclusive(file: File) -> io::Result<std::result::Result<LockedFile, File>> {
    use nix::errno::Errno;
    use nix::fcntl::{Flock, FlockArg};

    let mut file = file;
    loop {
        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(locked) => return Ok(Ok(locked)),
            Err((retry, Errno::EINTR)) => file = retry,
            Err((file, Errno::EWOULDBLOCK)) => return Ok(Err(file)),
            Err((_, errno)) => return Err(io::Error::from(errno)),
        }
    }
}

#[cfg(not(unix))]
fn try_lock_exclusive(file: File) -> io::Result<std::result::Result<LockedFile, File>> {
    match file.try_lock() {
        Ok(()) => Ok(Ok(file)),
        Err(std::fs::TryLockError::WouldBlock) => Ok(Err(file)),
        Err(std::fs::TryLockError::Error(e)) => Err(e),
    }
}
