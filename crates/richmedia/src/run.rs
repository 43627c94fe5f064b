//! Run collaborator: the mutable experiment stream media files are filed into.

use crate::result::{MediaError, MediaResult};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Length of the digest prefix used in generated file names
const DIGEST_PREFIX_LEN: usize = 20;

/// Where a materialized media file should land inside a run
#[derive(Debug, Clone, Copy)]
pub struct MediaPlacement<'a> {
    /// Kind-specific directory, e.g. `media/videos`
    pub relative_path: &'a str,
    /// Caller-chosen namespace components
    pub namespace: &'a [&'a str],
    /// Optional explicit name
    pub name: Option<&'a str>,
    /// Hex SHA-256 of the file contents
    pub digest: &'a str,
    /// File suffix including the leading dot
    pub suffix: &'a str,
}

impl MediaPlacement<'_> {
    /// File name: `<name>_<digest20><suffix>` or `<digest20><suffix>`
    #[must_use]
    pub fn file_name(&self) -> String {
        let short = &self.digest[..self.digest.len().min(DIGEST_PREFIX_LEN)];
        match self.name {
            Some(name) => format!("{}_{short}{}", sanitize(name), self.suffix),
            None => format!("{short}{}", self.suffix),
        }
    }

    /// Run-relative path using `/` separators
    #[must_use]
    pub fn relative_file(&self) -> String {
        let mut parts: Vec<String> = vec![self.relative_path.to_string()];
        parts.extend(self.namespace.iter().map(|ns| sanitize(ns)));
        parts.push(self.file_name());
        parts.join("/")
    }
}

/// One safe path component. Dot-only or empty parts are replaced with underscores.
fn sanitize(component: &str) -> String {
    let cleaned = component.replace(['/', '\\', ':'], "_");
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "_".repeat(cleaned.len().max(1))
    } else {
        cleaned
    }
}

/// A run that accepts materialized media files
pub trait Run {
    /// File `source` under the placement and return its run-relative path
    fn register_media(&mut self, source: &Path, placement: &MediaPlacement<'_>)
        -> MediaResult<String>;
}

/// Run backed by a local directory
#[derive(Debug)]
pub struct DirRun {
    root: PathBuf,
    registered: Vec<String>,
}

impl DirRun {
    /// Create a run rooted at `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            registered: Vec::new(),
        }
    }

    /// Run directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every run-relative path registered so far, in order
    #[must_use]
    pub fn registered(&self) -> &[String] {
        &self.registered
    }
}

impl Run for DirRun {
    fn register_media(
        &mut self,
        source: &Path,
        placement: &MediaPlacement<'_>,
    ) -> MediaResult<String> {
        let relative = placement.relative_file();
        let escapes = Path::new(&relative)
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(MediaError::unsupported_input(format!(
                "media path escapes the run directory: {relative:?}"
            )));
        }
        let dest = self.root.join(&relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(source, &dest)?;
        debug!(path = %relative, "registered media with run");

        self.registered.push(relative.clone());
        Ok(relative)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const DIGEST: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_file_name_with_and_without_name() {
        let mut placement = MediaPlacement {
            relative_path: "media/videos",
            namespace: &[],
            name: None,
            digest: DIGEST,
            suffix: ".gif",
        };
        assert_eq!(placement.file_name(), "0123456789abcdef0123.gif");

        placement.name = Some("rollout");
        assert_eq!(placement.file_name(), "rollout_0123456789abcdef0123.gif");
    }

    #[test]
    fn test_relative_file_sanitizes_namespace() {
        let placement = MediaPlacement {
            relative_path: "media/table",
            namespace: &["eval", "a/b"],
            name: Some("x:y"),
            digest: "abc",
            suffix: ".table.json",
        };
        assert_eq!(
            placement.relative_file(),
            "media/table/eval/a_b/x_y_abc.table.json"
        );
    }

    #[test]
    fn test_dir_run_copies_file() {
        let src = tempfile::tempdir().unwrap();
        let source = src.path().join("f.gif");
        fs::write(&source, b"GIF89a").unwrap();

        let root = tempfile::tempdir().unwrap();
        let mut run = DirRun::new(root.path());
        let placement = MediaPlacement {
            relative_path: "media/videos",
            namespace: &["train"],
            name: None,
            digest: DIGEST,
            suffix: ".gif",
        };
        let rel = run.register_media(&source, &placement).unwrap();

        assert_eq!(rel, "media/videos/train/0123456789abcdef0123.gif");
        assert_eq!(fs::read(root.path().join(&rel)).unwrap(), b"GIF89a");
        assert_eq!(run.registered(), &[rel]);
    }

    #[test]
    fn test_relative_file_neutralizes_dot_components() {
        let placement = MediaPlacement {
            relative_path: "media/videos",
            namespace: &["..", ".", "", "ok"],
            name: Some(".."),
            digest: "abc",
            suffix: ".gif",
        };
        assert_eq!(
            placement.relative_file(),
            "media/videos/__/_/_/ok/___abc.gif"
        );
    }

    #[test]
    fn test_dir_run_stays_inside_root() {
        let src = tempfile::tempdir().unwrap();
        let source = src.path().join("f.gif");
        fs::write(&source, b"GIF89a").unwrap();

        let outer = tempfile::tempdir().unwrap();
        let root = outer.path().join("a/b/c/d");
        let mut run = DirRun::new(&root);
        let placement = MediaPlacement {
            relative_path: "media/videos",
            namespace: &["..", "..", "..", ".."],
            name: Some("x"),
            digest: DIGEST,
            suffix: ".gif",
        };
        let rel = run.register_media(&source, &placement).unwrap();

        let landed = root.join(&rel);
        assert!(landed.starts_with(&root));
        assert!(landed.is_file());
        assert!(!outer.path().join("a/x_0123456789abcdef0123.gif").exists());
    }

    #[test]
    fn test_dir_run_rejects_escaping_relative_path() {
        let src = tempfile::tempdir().unwrap();
        let source = src.path().join("f.gif");
        fs::write(&source, b"GIF89a").unwrap();

        let root = tempfile::tempdir().unwrap();
        let mut run = DirRun::new(root.path().join("run"));
        let placement = MediaPlacement {
            relative_path: "../outside",
            namespace: &[],
            name: None,
            digest: DIGEST,
            suffix: ".gif",
        };
        let err = run.register_media(&source, &placement).unwrap_err();
        assert!(matches!(err, MediaError::UnsupportedInput { .. }));
        assert!(run.registered().is_empty());
    }
}
