//! Write-once managed file location for a media object's backing bytes.
//!
//! A slot is spent by its first `save_*` call, whether or not the write
//! succeeds. The managed directory is owned by the slot and removed when
//! the slot is dropped.

use crate::result::{MediaError, MediaResult};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Single on-disk materialization of a media object
#[derive(Debug, Default)]
pub struct PathSlot {
    staging_root: Option<PathBuf>,
    dir: Option<TempDir>,
    path: Option<PathBuf>,
    finalized: bool,
}

impl PathSlot {
    /// Create a slot that stages under the system temp directory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a slot that stages under `root`
    #[must_use]
    pub fn in_dir(root: impl Into<PathBuf>) -> Self {
        Self {
            staging_root: Some(root.into()),
            ..Self::default()
        }
    }

    /// Managed file path, once a save has succeeded
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether a save has been attempted
    #[must_use]
    pub const fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Copy an existing file into the managed location.
    ///
    /// The managed file keeps the source's extension.
    pub fn save_from(&mut self, source: &Path) -> MediaResult<&Path> {
        if !source.is_file() {
            return Err(MediaError::unsupported_input(format!(
                "{} is not a readable file",
                source.display()
            )));
        }
        let suffix = source
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        let dir = self.claim()?;
        let managed = dir.path().join(format!("media{suffix}"));
        fs::copy(source, &managed)?;
        debug!(source = %source.display(), managed = %managed.display(), "copied media into slot");

        Ok(self.install(dir, managed))
    }

    /// Hand `write` a fresh temporary path ending in `suffix`, then move the
    /// written file into the managed location.
    ///
    /// If `write` fails the temporary is removed and the slot stays spent.
    pub fn save_with<F>(&mut self, suffix: &str, write: F) -> MediaResult<&Path>
    where
        F: FnOnce(&Path) -> MediaResult<()>,
    {
        let suffix = normalize_suffix(suffix);
        let dir = self.claim()?;
        let staged = dir.path().join(format!("staged{suffix}"));

        if let Err(err) = write(&staged) {
            debug!(staged = %staged.display(), error = %err, "media write failed, discarding staged file");
            return Err(err);
        }

        let managed = dir.path().join(format!("media{suffix}"));
        fs::rename(&staged, &managed)?;
        debug!(managed = %managed.display(), "finalized media slot");

        Ok(self.install(dir, managed))
    }

    fn claim(&mut self) -> MediaResult<TempDir> {
        if self.finalized {
            return Err(MediaError::invalid_state(
                "path slot has already been saved",
            ));
        }
        self.finalized = true;

        let mut builder = tempfile::Builder::new();
        builder.prefix("media-");
        let dir = match &self.staging_root {
            Some(root) => {
                fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        Ok(dir)
    }

    fn install(&mut self, dir: TempDir, managed: PathBuf) -> &Path {
        self.dir = Some(dir);
        self.path.insert(managed).as_path()
    }
}

fn normalize_suffix(suffix: &str) -> String {
    if suffix.is_empty() || suffix.starts_with('.') {
        suffix.to_string()
    } else {
        format!(".{suffix}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod save_with_tests {
        use super::*;

        #[test]
        fn test_save_with_moves_into_managed_location() {
            let mut slot = PathSlot::new();
            let managed = slot
                .save_with(".txt", |p| {
                    fs::write(p, b"hello")?;
                    Ok(())
                })
                .unwrap()
                .to_path_buf();

            assert!(slot.is_finalized());
            assert_eq!(slot.path(), Some(managed.as_path()));
            assert_eq!(fs::read(&managed).unwrap(), b"hello");
            assert!(managed.to_string_lossy().ends_with(".txt"));
        }

        #[test]
        fn test_suffix_without_dot_is_normalized() {
            let mut slot = PathSlot::new();
            let managed = slot
                .save_with("table.json", |p| {
                    fs::write(p, b"{}")?;
                    Ok(())
                })
                .unwrap();
            assert!(managed.to_string_lossy().ends_with("media.table.json"));
        }

        #[test]
        fn test_second_save_fails_and_first_file_survives() {
            let mut slot = PathSlot::new();
            let first = slot
                .save_with(".bin", |p| {
                    fs::write(p, [1u8, 2, 3])?;
                    Ok(())
                })
                .unwrap()
                .to_path_buf();

            let err = slot
                .save_with(".bin", |p| {
                    fs::write(p, [9u8])?;
                    Ok(())
                })
                .unwrap_err();

            assert!(err.is_state_error());
            assert_eq!(fs::read(&first).unwrap(), vec![1, 2, 3]);
            assert_eq!(slot.path(), Some(first.as_path()));
        }

        #[test]
        fn test_failed_write_spends_slot_without_leaking() {
            let root = tempfile::tempdir().unwrap();
            let mut slot = PathSlot::in_dir(root.path());

            let result = slot.save_with(".gif", |p| {
                fs::write(p, b"partial")?;
                Err(MediaError::encoding("boom"))
            });

            assert!(matches!(result, Err(MediaError::Encoding { .. })));
            assert!(slot.is_finalized());
            assert!(slot.path().is_none());
            assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);

            let retry = slot.save_with(".gif", |_| Ok(()));
            assert!(retry.unwrap_err().is_state_error());
        }

        #[test]
        fn test_in_dir_stages_under_root() {
            let root = tempfile::tempdir().unwrap();
            let mut slot = PathSlot::in_dir(root.path().join("nested"));
            let managed = slot
                .save_with(".txt", |p| {
                    fs::write(p, b"x")?;
                    Ok(())
                })
                .unwrap();
            assert!(managed.starts_with(root.path().join("nested")));
        }
    }

    mod save_from_tests {
        use super::*;

        #[test]
        fn test_save_from_copies_and_keeps_extension() {
            let src_dir = tempfile::tempdir().unwrap();
            let source = src_dir.path().join("clip.mp4");
            fs::write(&source, b"not really a video").unwrap();

            let mut slot = PathSlot::new();
            let managed = slot.save_from(&source).unwrap().to_path_buf();

            assert_eq!(managed.extension().unwrap(), "mp4");
            assert_eq!(fs::read(&managed).unwrap(), b"not really a video");
            assert!(source.exists());
        }

        #[test]
        fn test_save_from_missing_source_leaves_slot_open() {
            let mut slot = PathSlot::new();
            let err = slot.save_from(Path::new("/definitely/missing.gif")).unwrap_err();
            assert!(matches!(err, MediaError::UnsupportedInput { .. }));
            assert!(!slot.is_finalized());
        }
    }

    #[test]
    fn test_drop_removes_managed_file() {
        let mut slot = PathSlot::new();
        let managed = slot
            .save_with(".txt", |p| {
                fs::write(p, b"x")?;
                Ok(())
            })
            .unwrap()
            .to_path_buf();
        drop(slot);
        assert!(!managed.exists());
    }
}
