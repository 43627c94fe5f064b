//! Richmedia: rich media objects for experiment runs
//!
//! Tables, videos and ordered media sequences that can be attached to a
//! mutable run stream or described inside an immutable artifact.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   materialize   ┌──────────────┐   bind_to_run       ┌─────────┐
//! │ Table/Video  │────────────────►│  PathSlot    │────────────────────►│  Run    │
//! │ (constructed)│   (write once)  │ (managed     │   bind_to_artifact  ├─────────┤
//! └──────────────┘                 │  file)       │────────────────────►│Artifact │
//!                                  └──────────────┘                     └─────────┘
//! ```
//!
//! Every media object writes its backing file at most once. Run binding
//! files it into the run's media tree; artifact binding stores it under a
//! content-addressed entry and returns a JSON descriptor.

#![warn(missing_docs)]

pub mod artifact;
pub mod config;
pub mod logging;
pub mod media;
pub mod path_slot;
pub mod result;
pub mod run;
pub mod source;
pub mod table;
pub mod video;

pub use artifact::{Artifact, DirArtifact};
pub use config::{MediaSettings, VideoSettings};
pub use logging::init_tracing;
pub use media::{
    bytes_digest, file_digest, ArtifactRef, Descriptor, Media, MediaCore, MediaKind,
    MediaSequence, SequenceItem, VideoSequence,
};
pub use path_slot::PathSlot;
pub use result::{MediaError, MediaResult};
pub use run::{DirRun, MediaPlacement, Run};
pub use source::{ArraySource, ColumnFrame, FrameSource, NumericArray, NumericElement, TensorLike};
pub use table::{Cell, Column, JoinKeys, JoinedTable, SharedTable, Table, TableInput, DEFAULT_COLUMNS};
pub use video::{
    prepare_data, EncoderChain, FfmpegEncoder, FrameEncoder, FrameGeometry, GifEncoder,
    Mp4Encoder, Video, VideoFormat, VideoOptions, VideoSource,
};

/// Common imports
pub mod prelude {
    pub use crate::artifact::{Artifact, DirArtifact};
    pub use crate::config::{MediaSettings, VideoSettings};
    pub use crate::media::{Media, MediaSequence, VideoSequence};
    pub use crate::result::{MediaError, MediaResult};
    pub use crate::run::{DirRun, Run};
    pub use crate::source::{ColumnFrame, NumericArray};
    pub use crate::table::{Cell, Column, JoinedTable, Table, TableInput};
    pub use crate::video::{Video, VideoFormat, VideoOptions, VideoSource};
}
