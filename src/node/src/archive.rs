//! Keystore archiving of the outgoing node identity
//!
//! Entries are named `<label>-<peer id>-<algorithm>-at-<UTC timestamp>`, so
//! every archived copy of an identity can be found by listing the keystore
//! and filtering on `<label>-<peer id>-`.

use chrono::{DateTime, Utc};
use cretoai_crypto::keys::{KeyAlgorithm, PeerId};
use cretoai_crypto::CryptoError;
use cretoai_repo::{IdentitySection, Keystore, KeystoreError};
use thiserror::Error;
use tracing::{debug, info};

/// Label used for keys retired by identity rotation
pub const DEFAULT_LABEL: &str = "IdentityRotation";

/// Nanosecond-precision UTC timestamp used in archive names
pub const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.9fZ";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("cannot decode the active private key: {0}")]
    Decode(#[source] CryptoError),

    #[error("keystore already holds an entry named {0:?}; refusing to overwrite an archived key")]
    NameCollision(String),

    #[error("failed to store archived key: {0}")]
    Store(#[source] KeystoreError),
}

/// An identity that now lives in the keystore
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedKey {
    pub name: String,
    pub peer_id: PeerId,
    pub algorithm: KeyAlgorithm,
}

/// Name under which `peer_id` is archived at `at`
pub fn archive_name(label: &str, peer_id: &PeerId, algorithm: KeyAlgorithm, at: DateTime<Utc>) -> String {
    format!(
        "{}-{}-{}-at-{}",
        label,
        peer_id,
        algorithm,
        at.format(TIMESTAMP_FORMAT)
    )
}

/// Decode the identity recorded in config and insert it into `keystore`.
///
/// Nothing is written unless the key decodes and matches its recorded peer
/// id. An existing entry under the computed name is never replaced.
pub fn archive<K: Keystore + ?Sized>(
    keystore: &K,
    identity: &IdentitySection,
    label: &str,
    at: DateTime<Utc>,
) -> Result<ArchivedKey, ArchiveError> {
    let identity = identity.to_identity().map_err(ArchiveError::Decode)?;
    let algorithm = identity.private_key.algorithm();
    let name = archive_name(label, &identity.peer_id, algorithm, at);

    match keystore.has(&name) {
        Ok(true) => return Err(ArchiveError::NameCollision(name)),
        Ok(false) => {}
        Err(e) => return Err(ArchiveError::Store(e)),
    }

    keystore.put(&name, &identity.private_key).map_err(|e| match e {
        KeystoreError::NameCollision(name) => ArchiveError::NameCollision(name),
        other => ArchiveError::Store(other),
    })?;

    info!(key_name = %name, peer_id = %identity.peer_id, "archived outgoing identity");
    Ok(ArchivedKey {
        name,
        peer_id: identity.peer_id,
        algorithm,
    })
}

/// Names of every archived copy of `peer_id` under `label`, oldest first
pub fn find_archived<K: Keystore + ?Sized>(
    keystore: &K,
    label: &str,
    peer_id: &PeerId,
) -> Result<Vec<String>, KeystoreError> {
    let prefix = format!("{}-{}-", label, peer_id);
    let names: Vec<String> = keystore
        .list()?
        .into_iter()
        .filter(|name| name.starts_with(&prefix))
        .collect();
    debug!(%peer_id, count = names.len(), "looked up archived keys");
    Ok(names)
}
