//! Media lifecycle and the run/artifact serialization contract.
//!
//! Every media object moves through the same states:
//!
//! ```text
//! constructed ──materialize──► materialized ──┬─ bind_to_run ──────► run-bound
//!                                             └─ bind_to_artifact ─► artifact-bound
//! ```
//!
//! Materialization writes the backing file at most once. Both bindings may
//! happen any number of times afterwards and always reuse that file.

mod sequence;

pub use sequence::{MediaSequence, SequenceItem, VideoSequence};

use crate::artifact::Artifact;
use crate::path_slot::PathSlot;
use crate::result::{MediaError, MediaResult};
use crate::run::{MediaPlacement, Run};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;
use tracing::debug;

/// JSON object produced by bindings and `to_json`
pub type Descriptor = Map<String, Value>;

/// Digest prefix length used in artifact entry names
const ENTRY_DIGEST_LEN: usize = 20;

/// Something that can be attached to a run or described inside an artifact
pub trait Media: fmt::Debug {
    /// Class tag used where run files embed a placeholder for nested media
    fn class_name(&self) -> &'static str;

    /// Materialize if needed, then file the backing bytes with `run`
    fn bind_to_run(
        &mut self,
        run: &mut dyn Run,
        namespace: &[&str],
        name: Option<&str>,
    ) -> MediaResult<()>;

    /// Describe this object for content-addressed storage in `artifact`
    fn bind_to_artifact(&mut self, artifact: &mut dyn Artifact) -> MediaResult<Descriptor>;

    /// Descriptor transmitted for a bound object
    fn to_json(&self) -> MediaResult<Descriptor>;
}

/// Type tags and run directory of one media kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaKind {
    /// `_type` used in run descriptors
    pub obj_type: &'static str,
    /// `_type` used in artifact descriptors
    pub artifact_type: &'static str,
    /// Directory inside the run's media tree
    pub relative_path: &'static str,
}

/// Relation to the artifact a media object was last bound to.
///
/// Holds identifiers only; the artifact's lifetime is its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    /// Artifact identifier
    pub id: String,
    /// Artifact reference string
    pub path: String,
}

impl ArtifactRef {
    /// Capture the identity of `artifact`
    #[must_use]
    pub fn of(artifact: &dyn Artifact) -> Self {
        Self {
            id: artifact.id().to_string(),
            path: artifact.artifact_path(),
        }
    }
}

/// State shared by every file-backed media kind
#[derive(Debug)]
pub struct MediaCore {
    kind: MediaKind,
    format: Option<String>,
    slot: PathSlot,
    digest: Option<String>,
    size: Option<u64>,
    run_path: Option<String>,
    artifact: Option<ArtifactRef>,
}

impl MediaCore {
    /// Unmaterialized core staging under the system temp directory
    #[must_use]
    pub fn new(kind: MediaKind) -> Self {
        Self::with_slot(kind, PathSlot::new())
    }

    /// Unmaterialized core using `slot`
    #[must_use]
    pub fn with_slot(kind: MediaKind, slot: PathSlot) -> Self {
        Self {
            kind,
            format: None,
            slot,
            digest: None,
            size: None,
            run_path: None,
            artifact: None,
        }
    }

    /// Swap in a different slot; only allowed before any save
    pub fn replace_slot(&mut self, slot: PathSlot) -> MediaResult<()> {
        if self.slot.is_finalized() {
            return Err(MediaError::invalid_state(
                "cannot replace the path slot of materialized media",
            ));
        }
        self.slot = slot;
        Ok(())
    }

    /// Kind tags
    #[must_use]
    pub const fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Lowercase format, set at materialization
    #[must_use]
    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    /// Managed backing file
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.slot.path()
    }

    /// Hex SHA-256 of the backing file
    #[must_use]
    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// Size of the backing file in bytes
    #[must_use]
    pub const fn size(&self) -> Option<u64> {
        self.size
    }

    /// Run-relative path from the latest run binding
    #[must_use]
    pub fn run_path(&self) -> Option<&str> {
        self.run_path.as_deref()
    }

    /// Artifact from the latest artifact binding
    #[must_use]
    pub const fn artifact(&self) -> Option<&ArtifactRef> {
        self.artifact.as_ref()
    }

    /// Whether the backing file has been written
    #[must_use]
    pub fn is_materialized(&self) -> bool {
        self.format.is_some() && self.slot.path().is_some()
    }

    /// Copy an existing file in as the backing file
    pub fn materialize_from(&mut self, source: &Path, format: &str) -> MediaResult<()> {
        if self.is_materialized() {
            return Ok(());
        }
        self.check_not_failed()?;
        self.slot.save_from(source)?;
        self.record(format)
    }

    /// Write the backing file through `write`, once.
    ///
    /// Later calls on materialized media are no-ops; calls after a failed
    /// write report a state error.
    pub fn materialize_with<F>(&mut self, format: &str, write: F) -> MediaResult<()>
    where
        F: FnOnce(&Path) -> MediaResult<()>,
    {
        if self.is_materialized() {
            return Ok(());
        }
        self.check_not_failed()?;
        self.slot.save_with(&format!(".{format}"), write)?;
        self.record(format)
    }

    fn check_not_failed(&self) -> MediaResult<()> {
        if self.slot.is_finalized() {
            return Err(MediaError::invalid_state(
                "media materialization previously failed",
            ));
        }
        Ok(())
    }

    fn record(&mut self, format: &str) -> MediaResult<()> {
        let path = self.require_path()?;
        let (digest, size) = file_digest(path)?;
        debug!(
            kind = self.kind.obj_type,
            format,
            size,
            path = %path.display(),
            "materialized media"
        );
        self.digest = Some(digest);
        self.size = Some(size);
        self.format = Some(format.to_lowercase());
        Ok(())
    }

    fn require_path(&self) -> MediaResult<&Path> {
        self.slot
            .path()
            .ok_or_else(|| MediaError::invalid_state("media has not been materialized"))
    }

    fn require_materialized(&self) -> MediaResult<(&Path, &str, &str)> {
        match (self.slot.path(), self.format.as_deref(), self.digest.as_deref()) {
            (Some(path), Some(format), Some(digest)) => Ok((path, format, digest)),
            _ => Err(MediaError::invalid_state("media has not been materialized")),
        }
    }

    /// File the backing bytes with `run` and remember the run path
    pub fn register_with_run(
        &mut self,
        run: &mut dyn Run,
        namespace: &[&str],
        name: Option<&str>,
    ) -> MediaResult<&str> {
        let (path, format, digest) = self.require_materialized()?;
        let suffix = format!(".{format}");
        let placement = MediaPlacement {
            relative_path: self.kind.relative_path,
            namespace,
            name,
            digest,
            suffix: &suffix,
        };
        let relative = run.register_media(path, &placement)?;
        Ok(self.run_path.insert(relative).as_str())
    }

    /// Base artifact descriptor: `_type`, plus `path`/`sha256`/`size` once
    /// the backing file exists (the file is added to `artifact`).
    pub fn artifact_descriptor(&mut self, artifact: &mut dyn Artifact) -> MediaResult<Descriptor> {
        self.artifact = Some(ArtifactRef::of(artifact));

        let mut descriptor = Descriptor::new();
        descriptor.insert("_type".into(), self.kind.artifact_type.into());

        if self.is_materialized() {
            let (path, format, digest) = self.require_materialized()?;
            let entry = format!(
                "{}/{}.{format}",
                self.kind.relative_path,
                &digest[..digest.len().min(ENTRY_DIGEST_LEN)]
            );
            let reference = artifact.add_file(path, &entry)?;
            descriptor.insert("path".into(), reference.into());
            self.insert_content_fields(&mut descriptor);
        }
        Ok(descriptor)
    }

    /// Base transmission descriptor for a bound object
    pub fn to_json(&self) -> MediaResult<Descriptor> {
        let mut descriptor = Descriptor::new();
        descriptor.insert("_type".into(), self.kind.obj_type.into());

        if let Some(run_path) = &self.run_path {
            descriptor.insert("path".into(), run_path.clone().into());
        } else if let Some(artifact) = &self.artifact {
            descriptor.insert("artifact_path".into(), artifact.path.clone().into());
        } else {
            return Err(unbound_error());
        }
        self.insert_content_fields(&mut descriptor);
        Ok(descriptor)
    }

    fn insert_content_fields(&self, descriptor: &mut Descriptor) {
        if let (Some(digest), Some(size)) = (&self.digest, self.size) {
            descriptor.insert("sha256".into(), digest.clone().into());
            descriptor.insert("size".into(), size.into());
        }
    }
}

/// Error for serializing media that was never bound
pub(crate) fn unbound_error() -> MediaError {
    MediaError::invalid_state("cannot serialize unbound media object")
}

/// Hex SHA-256 and size of a file
pub fn file_digest(path: &Path) -> MediaResult<(String, u64)> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let size = io::copy(&mut file, &mut hasher)?;
    Ok((format!("{:x}", hasher.finalize()), size))
}

/// Hex SHA-256 of a byte slice
#[must_use]
pub fn bytes_digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
