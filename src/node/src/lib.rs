//! CretoAI Node Library
//!
//! Identity management for a node repository: archiving retired keys and
//! rotating the active identity.
//!
//! ## Module Structure
//!
//! ```text
//! node/
//! ├── archive   - keystore naming and archival of the outgoing key
//! └── rotate    - rotation state machine and its error taxonomy
//! ```

pub mod archive;
pub mod rotate;

pub use archive::{archive_name, ArchiveError, ArchivedKey, DEFAULT_LABEL};
pub use rotate::{rotate, RotateError, RotateErrorKind, RotateOptions, Rotation, RotationOutcome, Stage};
