//! Media settings
//!
//! Settings are plain serde structs with defaults, so a partial YAML
//! document only overrides the keys it names.

use crate::result::{MediaError, MediaResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Video encoding defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    /// Frames per second for array-backed videos (1-60)
    pub fps: u8,
    /// Format used when the caller does not name one
    pub format: String,
    /// JPEG quality for MP4 frames (1-100)
    pub jpeg_quality: u8,
    /// External encoder binary used as the last fallback
    pub ffmpeg_binary: String,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            fps: 4,
            format: "gif".to_string(),
            jpeg_quality: 85,
            ffmpeg_binary: "ffmpeg".to_string(),
        }
    }
}

impl VideoSettings {
    /// Set frames per second (clamped to 1-60)
    #[must_use]
    pub fn with_fps(mut self, fps: u8) -> Self {
        self.fps = fps.clamp(1, 60);
        self
    }

    /// Set the default format
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    /// Set JPEG quality (clamped to 1-100)
    #[must_use]
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Set the ffmpeg binary name or path
    #[must_use]
    pub fn with_ffmpeg_binary(mut self, binary: impl Into<String>) -> Self {
        self.ffmpeg_binary = binary.into();
        self
    }
}

/// Top-level media settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaSettings {
    /// Directory for managed media files (system temp dir when unset)
    pub staging_dir: Option<PathBuf>,
    /// Video defaults
    pub video: VideoSettings,
}

impl MediaSettings {
    /// Create default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the staging directory
    #[must_use]
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    /// Replace the video defaults
    #[must_use]
    pub fn with_video(mut self, video: VideoSettings) -> Self {
        self.video = video;
        self
    }

    /// Parse settings from a YAML document
    pub fn from_yaml_str(yaml: &str) -> MediaResult<Self> {
        let mut settings: Self = serde_yaml_ng::from_str(yaml)
            .map_err(|e| MediaError::config(format!("Failed to parse media settings: {e}")))?;
        settings.video.fps = settings.video.fps.clamp(1, 60);
        settings.video.jpeg_quality = settings.video.jpeg_quality.clamp(1, 100);
        Ok(settings)
    }

    /// Load settings from a YAML file
    pub fn load(path: &Path) -> MediaResult<Self> {
        let yaml = fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = MediaSettings::default();
        assert!(settings.staging_dir.is_none());
        assert_eq!(settings.video.fps, 4);
        assert_eq!(settings.video.format, "gif");
        assert_eq!(settings.video.jpeg_quality, 85);
        assert_eq!(settings.video.ffmpeg_binary, "ffmpeg");
    }

    #[test]
    fn test_builders_clamp() {
        let video = VideoSettings::default()
            .with_fps(0)
            .with_jpeg_quality(200)
            .with_format("mp4");
        assert_eq!(video.fps, 1);
        assert_eq!(video.jpeg_quality, 100);
        assert_eq!(video.format, "mp4");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let settings = MediaSettings::from_yaml_str("video:\n  fps: 12\n").unwrap();
        assert_eq!(settings.video.fps, 12);
        assert_eq!(settings.video.format, "gif");
        assert!(settings.staging_dir.is_none());
    }

    #[test]
    fn test_yaml_clamps_out_of_range() {
        let settings = MediaSettings::from_yaml_str("video:\n  fps: 200\n").unwrap();
        assert_eq!(settings.video.fps, 60);
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let err = MediaSettings::from_yaml_str("video: [").unwrap_err();
        assert!(matches!(err, MediaError::Config { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("media.yaml");
        fs::write(&path, "staging_dir: /tmp/media\nvideo:\n  format: mp4\n").unwrap();

        let settings = MediaSettings::load(&path).unwrap();
        assert_eq!(settings.staging_dir, Some(PathBuf::from("/tmp/media")));
        assert_eq!(settings.video.format, "mp4");
    }
}
