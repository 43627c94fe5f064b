//! Video media.
//!
//! Videos come from a file, an encoded byte buffer, or a numeric array of
//! frames. Array input is tiled into mosaic frames when the video is built
//! and encoded the first time it is bound.

mod encoder;
mod tiling;

pub use encoder::{EncoderChain, FfmpegEncoder, FrameEncoder, FrameGeometry, GifEncoder, Mp4Encoder};
pub use tiling::{grid_shape, padded_batch, prepare_data};

use crate::artifact::Artifact;
use crate::config::MediaSettings;
use crate::media::{Descriptor, Media, MediaCore, MediaKind, SequenceItem};
use crate::path_slot::PathSlot;
use crate::result::{MediaError, MediaResult};
use crate::run::Run;
use crate::source::{NumericArray, TensorLike};
use ndarray::Array4;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const VIDEO_KIND: MediaKind = MediaKind {
    obj_type: "video-file",
    artifact_type: "video-file",
    relative_path: "media/videos",
};

/// Container formats a video may be stored as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoFormat {
    /// MPEG-4
    Mp4,
    /// WebM
    Webm,
    /// Animated GIF
    Gif,
    /// Ogg
    Ogg,
}

impl VideoFormat {
    /// Every supported format
    pub const ALL: [Self; 4] = [Self::Mp4, Self::Webm, Self::Gif, Self::Ogg];

    /// Lowercase extension without the dot
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Webm => "webm",
            Self::Gif => "gif",
            Self::Ogg => "ogg",
        }
    }

    /// Format named by the extension of `path`
    pub fn from_path(path: &Path) -> MediaResult<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| MediaError::unsupported_format(path.display().to_string()))?;
        extension.parse()
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoFormat {
    type Err = MediaError;

    fn from_str(s: &str) -> MediaResult<Self> {
        let name = s.trim_start_matches('.').to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == name)
            .ok_or_else(|| MediaError::unsupported_format(s))
    }
}

/// Where a video's data comes from
#[derive(Debug, Clone)]
pub enum VideoSource {
    /// Existing video file; its extension selects the format
    Path(PathBuf),
    /// Already-encoded bytes
    Buffer(Vec<u8>),
    /// Frames as `(batch, time, channel, height, width)` or
    /// `(time, channel, height, width)`
    Array(NumericArray),
}

impl VideoSource {
    /// Array source from anything tensor-like
    pub fn from_tensor(tensor: &dyn TensorLike) -> MediaResult<Self> {
        Ok(Self::Array(tensor.to_numeric()?))
    }
}

impl From<PathBuf> for VideoSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for VideoSource {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<Vec<u8>> for VideoSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Buffer(bytes)
    }
}

impl From<NumericArray> for VideoSource {
    fn from(array: NumericArray) -> Self {
        Self::Array(array)
    }
}

/// Optional video parameters
#[derive(Debug, Clone, Default)]
pub struct VideoOptions {
    /// Display caption
    pub caption: Option<String>,
    /// Frames per second for array input; the settings default when unset
    pub fps: Option<u8>,
    /// Format for buffer and array input; the settings default when unset
    pub format: Option<String>,
    /// Staging and encoder settings
    pub settings: MediaSettings,
}

impl VideoOptions {
    /// Set the caption
    #[must_use]
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    /// Set frames per second
    #[must_use]
    pub fn with_fps(mut self, fps: u8) -> Self {
        self.fps = Some(fps);
        self
    }

    /// Set the output format
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Replace the settings
    #[must_use]
    pub fn with_settings(mut self, settings: MediaSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// Data waiting to be written on first binding
#[derive(Debug)]
enum Pending {
    None,
    Bytes(Vec<u8>),
    Frames(Array4<u8>),
}

/// A video file attached to a run or artifact
#[derive(Debug)]
pub struct Video {
    core: MediaCore,
    format: VideoFormat,
    caption: Option<String>,
    fps: u8,
    width: Option<u32>,
    height: Option<u32>,
    pending: Pending,
    encoders: EncoderChain,
}

impl Video {
    /// Build a video, validating the source and format up front.
    ///
    /// Path input is copied into a managed file immediately. Array input
    /// is tiled now and encoded when first bound.
    pub fn new(source: VideoSource, options: VideoOptions) -> MediaResult<Self> {
        let VideoOptions {
            caption,
            fps,
            format,
            settings,
        } = options;

        let slot = settings
            .staging_dir
            .as_deref()
            .map_or_else(PathSlot::new, PathSlot::in_dir);
        let mut core = MediaCore::with_slot(VIDEO_KIND, slot);

        let (format, pending) = match source {
            VideoSource::Path(path) => {
                let format = VideoFormat::from_path(&path)?;
                core.materialize_from(&path, format.as_str())?;
                (format, Pending::None)
            }
            VideoSource::Buffer(bytes) => {
                (resolve_format(format.as_deref(), &settings)?, Pending::Bytes(bytes))
            }
            VideoSource::Array(array) => {
                let format = resolve_format(format.as_deref(), &settings)?;
                let frames = prepare_data(&array)?;
                FrameGeometry::of(&frames)?;
                (format, Pending::Frames(frames))
            }
        };

        Ok(Self {
            core,
            format,
            caption,
            fps: fps.unwrap_or(settings.video.fps).clamp(1, 60),
            width: None,
            height: None,
            pending,
            encoders: EncoderChain::from_settings(&settings.video),
        })
    }

    /// Video from an existing file
    pub fn from_path(path: impl Into<PathBuf>) -> MediaResult<Self> {
        Self::new(VideoSource::Path(path.into()), VideoOptions::default())
    }

    /// Video from encoded bytes; `format` defaults to the settings default
    pub fn from_buffer(bytes: Vec<u8>, format: Option<&str>) -> MediaResult<Self> {
        let options = VideoOptions {
            format: format.map(str::to_string),
            ..VideoOptions::default()
        };
        Self::new(VideoSource::Buffer(bytes), options)
    }

    /// Video from a frame array
    pub fn from_array(array: impl Into<NumericArray>, options: VideoOptions) -> MediaResult<Self> {
        Self::new(VideoSource::Array(array.into()), options)
    }

    /// Video from a tensor-like frame source
    pub fn from_tensor(tensor: &dyn TensorLike, options: VideoOptions) -> MediaResult<Self> {
        Self::new(VideoSource::from_tensor(tensor)?, options)
    }

    /// Replace the encoder chain used for array input
    #[must_use]
    pub fn with_encoders(mut self, encoders: EncoderChain) -> Self {
        self.encoders = encoders;
        self
    }

    /// Output format
    #[must_use]
    pub const fn format(&self) -> VideoFormat {
        self.format
    }

    /// Caption, if any
    #[must_use]
    pub fn caption(&self) -> Option<&str> {
        self.caption.as_deref()
    }

    /// Frames per second used when encoding array input
    #[must_use]
    pub const fn fps(&self) -> u8 {
        self.fps
    }

    /// Width in pixels; not currently detected
    #[must_use]
    pub const fn width(&self) -> Option<u32> {
        self.width
    }

    /// Height in pixels; not currently detected
    #[must_use]
    pub const fn height(&self) -> Option<u32> {
        self.height
    }

    /// Shared media state
    #[must_use]
    pub const fn core(&self) -> &MediaCore {
        &self.core
    }

    /// Write the backing file if that has not happened yet
    pub fn ensure_materialized(&mut self) -> MediaResult<()> {
        let format = self.format;
        match std::mem::replace(&mut self.pending, Pending::None) {
            Pending::None if self.core.is_materialized() => Ok(()),
            Pending::None => Err(MediaError::invalid_state(
                "media materialization previously failed",
            )),
            Pending::Bytes(bytes) => self.core.materialize_with(format.as_str(), |path| {
                fs::write(path, &bytes)?;
                Ok(())
            }),
            Pending::Frames(frames) => {
                let encoders = &self.encoders;
                let fps = self.fps;
                self.core.materialize_with(format.as_str(), |path| {
                    encoders.encode(&frames, fps, format, path)
                })
            }
        }
    }
}

fn resolve_format(requested: Option<&str>, settings: &MediaSettings) -> MediaResult<VideoFormat> {
    requested.unwrap_or(&settings.video.format).parse()
}

impl Media for Video {
    fn class_name(&self) -> &'static str {
        "Video"
    }

    fn bind_to_run(
        &mut self,
        run: &mut dyn Run,
        namespace: &[&str],
        name: Option<&str>,
    ) -> MediaResult<()> {
        self.ensure_materialized()?;
        self.core.register_with_run(run, namespace, name)?;
        Ok(())
    }

    fn bind_to_artifact(&mut self, artifact: &mut dyn Artifact) -> MediaResult<Descriptor> {
        self.ensure_materialized()?;
        let mut descriptor = self.core.artifact_descriptor(artifact)?;
        if let Some(width) = self.width {
            descriptor.insert("width".into(), width.into());
        }
        if let Some(height) = self.height {
            descriptor.insert("height".into(), height.into());
        }
        if let Some(caption) = self.caption.as_deref().filter(|c| !c.is_empty()) {
            descriptor.insert("caption".into(), caption.into());
        }
        Ok(descriptor)
    }

    fn to_json(&self) -> MediaResult<Descriptor> {
        let mut descriptor = self.core.to_json()?;
        descriptor.insert("caption".into(), Value::from(self.caption.clone()));
        Ok(descriptor)
    }
}

impl SequenceItem for Video {
    const SEQUENCE_CLASS: &'static str = "VideoSequence";
    const SEQUENCE_TYPE: &'static str = "videos";
    const ITEMS_KEY: &'static str = "videos";
}
