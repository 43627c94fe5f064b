//! Artifact collaborator: an immutable bundle that stores files and hands
//! back stable reference strings.

use crate::result::{MediaError, MediaResult};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Storage sink for artifact-bound media
pub trait Artifact {
    /// Stable identifier of this artifact
    fn id(&self) -> &str;

    /// Reference string for the artifact as a whole
    fn artifact_path(&self) -> String;

    /// Store a copy of `source` under `entry`; returns the entry reference
    fn add_file(&mut self, source: &Path, entry: &str) -> MediaResult<String>;

    /// Store `bytes` under `entry`; returns the entry reference
    fn add_bytes(&mut self, entry: &str, bytes: &[u8]) -> MediaResult<String>;
}

/// Artifact backed by a local directory
#[derive(Debug)]
pub struct DirArtifact {
    id: String,
    name: String,
    root: PathBuf,
    entries: BTreeMap<String, u64>,
}

impl DirArtifact {
    /// Create an artifact named `name` whose entries live under `root`
    #[must_use]
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            root: root.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Artifact name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stored entry names, sorted
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Whether `entry` has been stored
    #[must_use]
    pub fn contains(&self, entry: &str) -> bool {
        self.entries.contains_key(entry)
    }

    /// On-disk location of `entry`
    #[must_use]
    pub fn entry_path(&self, entry: &str) -> PathBuf {
        self.root.join(entry)
    }

    fn prepare(&self, entry: &str) -> MediaResult<PathBuf> {
        let relative = Path::new(entry);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if entry.is_empty() || escapes {
            return Err(MediaError::unsupported_input(format!(
                "invalid artifact entry name: {entry:?}"
            )));
        }

        let dest = self.root.join(relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(dest)
    }
}

impl Artifact for DirArtifact {
    fn id(&self) -> &str {
        &self.id
    }

    fn artifact_path(&self) -> String {
        format!("artifact://{}", self.name)
    }

    fn add_file(&mut self, source: &Path, entry: &str) -> MediaResult<String> {
        let dest = self.prepare(entry)?;
        let size = fs::copy(source, &dest)?;
        debug!(artifact = %self.name, entry, size, "added file to artifact");
        self.entries.insert(entry.to_string(), size);
        Ok(entry.to_string())
    }

    fn add_bytes(&mut self, entry: &str, bytes: &[u8]) -> MediaResult<String> {
        let dest = self.prepare(entry)?;
        fs::write(&dest, bytes)?;
        debug!(artifact = %self.name, entry, size = bytes.len(), "added bytes to artifact");
        self.entries.insert(entry.to_string(), bytes.len() as u64);
        Ok(entry.to_string())
    }
}
