//! Frame encoders.
//!
//! Tiled frames `(time, height, width, channel)` are written to disk by an
//! ordered chain of strategies. Each strategy states which formats it can
//! write; the chain tries the capable ones in order and stops at the first
//! success.

use super::VideoFormat;
use crate::config::VideoSettings;
use crate::result::{MediaError, MediaResult};
use gif::{Encoder, Frame, Repeat};
use ndarray::{Array4, ArrayView3};
use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use tracing::{debug, warn};

/// Validated dimensions of a frame stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    /// Number of frames
    pub frames: usize,
    /// Frame height in pixels
    pub height: u16,
    /// Frame width in pixels
    pub width: u16,
    /// Channels per pixel: 1 (gray), 3 (RGB) or 4 (RGBA)
    pub channels: usize,
}

impl FrameGeometry {
    /// Check that `frames` can be encoded
    pub fn of(frames: &Array4<u8>) -> MediaResult<Self> {
        let &[count, height, width, channels] = frames.shape() else {
            return Err(MediaError::unsupported_input("frames must be 4-dimensional"));
        };
        if count == 0 || height == 0 || width == 0 {
            return Err(MediaError::unsupported_input(format!(
                "cannot encode {count} frames of {width}x{height}"
            )));
        }
        if !matches!(channels, 1 | 3 | 4) {
            return Err(MediaError::unsupported_input(format!(
                "frames must have 1, 3 or 4 channels, got {channels}"
            )));
        }
        let dimension = |n: usize| {
            u16::try_from(n).map_err(|_| {
                MediaError::unsupported_input(format!("frame dimension {n} exceeds 65535"))
            })
        };
        Ok(Self {
            frames: count,
            height: dimension(height)?,
            width: dimension(width)?,
            channels,
        })
    }
}

/// One way of turning frames into a video file
pub trait FrameEncoder: fmt::Debug {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Whether this strategy can produce `format`
    fn supports(&self, format: VideoFormat) -> bool;

    /// Write `frames` at `fps` to `output`
    fn encode(&self, frames: &Array4<u8>, fps: u8, output: &Path) -> MediaResult<()>;
}

/// Ordered list of encoder strategies
#[derive(Debug)]
pub struct EncoderChain {
    strategies: Vec<Box<dyn FrameEncoder>>,
}

impl EncoderChain {
    /// Chain over `strategies`, tried in the given order
    #[must_use]
    pub fn new(strategies: Vec<Box<dyn FrameEncoder>>) -> Self {
        Self { strategies }
    }

    /// Built-in chain: GIF, then MP4, then ffmpeg
    #[must_use]
    pub fn from_settings(settings: &VideoSettings) -> Self {
        Self::new(vec![
            Box::new(GifEncoder),
            Box::new(Mp4Encoder::new(settings.jpeg_quality)),
            Box::new(FfmpegEncoder::new(settings.ffmpeg_binary.clone())),
        ])
    }

    /// Strategy names in order
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Encode with the first capable strategy that succeeds.
    ///
    /// Failures of earlier strategies are logged; if all fail, the last
    /// failure is returned.
    pub fn encode(
        &self,
        frames: &Array4<u8>,
        fps: u8,
        format: VideoFormat,
        output: &Path,
    ) -> MediaResult<()> {
        FrameGeometry::of(frames)?;

        let mut last_error = None;
        for strategy in self.strategies.iter().filter(|s| s.supports(format)) {
            match strategy.encode(frames, fps, output) {
                Ok(()) => {
                    debug!(encoder = strategy.name(), %format, "encoded video");
                    return Ok(());
                }
                Err(err) => {
                    warn!(encoder = strategy.name(), %format, error = %err, "encoder failed");
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            MediaError::encoding(format!("no encoder supports {format}"))
        }))
    }
}

impl Default for EncoderChain {
    fn default() -> Self {
        Self::from_settings(&VideoSettings::default())
    }
}

/// Frame delay in centiseconds, at least 1
fn gif_delay(fps: u8) -> u16 {
    (100 / u16::from(fps.max(1))).max(1)
}

/// Fixed 256-entry palette: grays for 1 channel, a 3-3-2 RGB cube otherwise
fn gif_palette(channels: usize) -> Vec<u8> {
    (0..=255u8)
        .flat_map(|i| {
            if channels == 1 {
                [i, i, i]
            } else {
                let scale = |level: u8, max: u16| (u16::from(level) * 255 / max) as u8;
                [scale(i >> 5, 7), scale((i >> 2) & 0x07, 7), scale(i & 0x03, 3)]
            }
        })
        .collect()
}

/// Palette indices for one `(height, width, channel)` frame
fn gif_indices(frame: ArrayView3<'_, u8>, channels: usize) -> Vec<u8> {
    let mut indices = Vec::with_capacity(frame.shape()[0] * frame.shape()[1]);
    for row in frame.outer_iter() {
        for pixel in row.outer_iter() {
            let index = if channels == 1 {
                pixel[0]
            } else {
                (pixel[0] & 0xE0) | ((pixel[1] & 0xE0) >> 3) | (pixel[2] >> 6)
            };
            indices.push(index);
        }
    }
    indices
}

/// Animated GIF with a fixed global palette, looping forever
#[derive(Debug, Clone, Copy, Default)]
pub struct GifEncoder;

impl FrameEncoder for GifEncoder {
    fn name(&self) -> &'static str {
        "gif"
    }

    fn supports(&self, format: VideoFormat) -> bool {
        format == VideoFormat::Gif
    }

    fn encode(&self, frames: &Array4<u8>, fps: u8, output: &Path) -> MediaResult<()> {
        let geometry = FrameGeometry::of(frames)?;
        let palette = gif_palette(geometry.channels);
        let delay = gif_delay(fps);
        let mut data = Vec::new();

        {
            let mut encoder = Encoder::new(&mut data, geometry.width, geometry.height, &palette)
                .map_err(|e| MediaError::encoding(format!("Failed to create GIF encoder: {e}")))?;
            encoder
                .set_repeat(Repeat::Infinite)
                .map_err(|e| MediaError::encoding(format!("Failed to set GIF repeat: {e}")))?;

            for frame in frames.outer_iter() {
                let mut gif_frame = Frame::default();
                gif_frame.width = geometry.width;
                gif_frame.height = geometry.height;
                gif_frame.delay = delay;
                gif_frame.buffer = Cow::Owned(gif_indices(frame, geometry.channels));
                encoder
                    .write_frame(&gif_frame)
                    .map_err(|e| MediaError::encoding(format!("Failed to write GIF frame: {e}")))?;
            }
        }

        fs::write(output, data)?;
        Ok(())
    }
}

/// MP4 container of JPEG frames
#[derive(Debug, Clone, Copy)]
pub struct Mp4Encoder {
    quality: u8,
}

impl Mp4Encoder {
    /// Encoder writing JPEG frames at `quality` (1-100)
    #[must_use]
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    fn jpeg(&self, frame: ArrayView3<'_, u8>, geometry: FrameGeometry) -> MediaResult<Vec<u8>> {
        let (pixels, color) = if geometry.channels == 1 {
            (frame.iter().copied().collect(), image::ExtendedColorType::L8)
        } else {
            let rgb: Vec<u8> = frame
                .outer_iter()
                .flat_map(|row| {
                    row.outer_iter()
                        .flat_map(|px| [px[0], px[1], px[2]])
                        .collect::<Vec<_>>()
                })
                .collect();
            (rgb, image::ExtendedColorType::Rgb8)
        };

        let mut buffer = Cursor::new(Vec::new());
        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, self.quality);
        encoder
            .encode(
                &pixels,
                u32::from(geometry.width),
                u32::from(geometry.height),
                color,
            )
            .map_err(|e| MediaError::encoding(format!("JPEG encoding failed: {e}")))?;
        Ok(buffer.into_inner())
    }
}

impl Default for Mp4Encoder {
    fn default() -> Self {
        Self::new(VideoSettings::default().jpeg_quality)
    }
}

impl FrameEncoder for Mp4Encoder {
    fn name(&self) -> &'static str {
        "mp4-jpeg"
    }

    fn supports(&self, format: VideoFormat) -> bool {
        format == VideoFormat::Mp4
    }

    fn encode(&self, frames: &Array4<u8>, fps: u8, output: &Path) -> MediaResult<()> {
        let geometry = FrameGeometry::of(frames)?;
        let samples = frames
            .outer_iter()
            .map(|frame| self.jpeg(frame, geometry))
            .collect::<MediaResult<Vec<_>>>()?;
        fs::write(output, mp4_container(&samples, geometry, fps.max(1)))?;
        Ok(())
    }
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Append a box: 32-bit size, tag, then whatever `body` writes
fn write_box(out: &mut Vec<u8>, tag: &[u8; 4], body: impl FnOnce(&mut Vec<u8>)) {
    let mut content = Vec::new();
    body(&mut content);
    put_u32(out, (content.len() + 8) as u32);
    out.extend_from_slice(tag);
    out.extend_from_slice(&content);
}

/// Full-box version and flags
fn version_flags(out: &mut Vec<u8>, flags: u8) {
    out.extend_from_slice(&[0, 0, 0, flags]);
}

const IDENTITY_MATRIX: [u32; 9] = [0x0001_0000, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000];

/// ftyp + mdat + moov with one video track; all samples in one chunk
fn mp4_container(samples: &[Vec<u8>], geometry: FrameGeometry, fps: u8) -> Vec<u8> {
    let timescale = u32::from(fps) * 100;
    let delta = 100u32;
    let count = samples.len() as u32;
    let duration = delta * count;

    let mut out = Vec::new();
    write_box(&mut out, b"ftyp", |b| {
        b.extend_from_slice(b"isom");
        put_u32(b, 512);
        for brand in [b"isom", b"iso2", b"mp41"] {
            b.extend_from_slice(brand);
        }
    });
    let chunk_offset = out.len() as u32 + 8;
    write_box(&mut out, b"mdat", |b| {
        for sample in samples {
            b.extend_from_slice(sample);
        }
    });

    write_box(&mut out, b"moov", |moov| {
        write_box(moov, b"mvhd", |b| {
            version_flags(b, 0);
            put_u32(b, 0);
            put_u32(b, 0);
            put_u32(b, timescale);
            put_u32(b, duration);
            put_u32(b, 0x0001_0000);
            put_u16(b, 0x0100);
            b.extend_from_slice(&[0; 10]);
            IDENTITY_MATRIX.iter().for_each(|&v| put_u32(b, v));
            b.extend_from_slice(&[0; 24]);
            put_u32(b, 2);
        });
        write_box(moov, b"trak", |trak| {
            write_box(trak, b"tkhd", |b| {
                version_flags(b, 3);
                put_u32(b, 0);
                put_u32(b, 0);
                put_u32(b, 1);
                put_u32(b, 0);
                put_u32(b, duration);
                b.extend_from_slice(&[0; 8]);
                put_u16(b, 0);
                put_u16(b, 0);
                put_u16(b, 0);
                put_u16(b, 0);
                IDENTITY_MATRIX.iter().for_each(|&v| put_u32(b, v));
                put_u32(b, u32::from(geometry.width) << 16);
                put_u32(b, u32::from(geometry.height) << 16);
            });
            write_box(trak, b"mdia", |mdia| {
                write_box(mdia, b"mdhd", |b| {
                    version_flags(b, 0);
                    put_u32(b, 0);
                    put_u32(b, 0);
                    put_u32(b, timescale);
                    put_u32(b, duration);
                    put_u16(b, 0x55c4);
                    put_u16(b, 0);
                });
                write_box(mdia, b"hdlr", |b| {
                    version_flags(b, 0);
                    put_u32(b, 0);
                    b.extend_from_slice(b"vide");
                    b.extend_from_slice(&[0; 12]);
                    b.extend_from_slice(b"VideoHandler\0");
                });
                write_box(mdia, b"minf", |minf| {
                    write_box(minf, b"vmhd", |b| {
                        version_flags(b, 1);
                        b.extend_from_slice(&[0; 8]);
                    });
                    write_box(minf, b"dinf", |dinf| {
                        write_box(dinf, b"dref", |b| {
                            version_flags(b, 0);
                            put_u32(b, 1);
                            write_box(b, b"url ", |u| version_flags(u, 1));
                        });
                    });
                    write_box(minf, b"stbl", |stbl| {
                        write_box(stbl, b"stsd", |b| {
                            version_flags(b, 0);
                            put_u32(b, 1);
                            write_box(b, b"jpeg", |e| sample_entry(e, geometry));
                        });
                        write_box(stbl, b"stts", |b| {
                            version_flags(b, 0);
                            put_u32(b, 1);
                            put_u32(b, count);
                            put_u32(b, delta);
                        });
                        write_box(stbl, b"stsc", |b| {
                            version_flags(b, 0);
                            put_u32(b, 1);
                            put_u32(b, 1);
                            put_u32(b, count);
                            put_u32(b, 1);
                        });
                        write_box(stbl, b"stsz", |b| {
                            version_flags(b, 0);
                            put_u32(b, 0);
                            put_u32(b, count);
                            samples.iter().for_each(|s| put_u32(b, s.len() as u32));
                        });
                        write_box(stbl, b"stco", |b| {
                            version_flags(b, 0);
                            put_u32(b, 1);
                            put_u32(b, chunk_offset);
                        });
                    });
                });
            });
        });
    });
    out
}

/// Visual sample entry body
fn sample_entry(out: &mut Vec<u8>, geometry: FrameGeometry) {
    out.extend_from_slice(&[0; 6]);
    put_u16(out, 1);
    put_u16(out, 0);
    put_u16(out, 0);
    out.extend_from_slice(&[0; 12]);
    put_u16(out, geometry.width);
    put_u16(out, geometry.height);
    put_u32(out, 0x0048_0000);
    put_u32(out, 0x0048_0000);
    put_u32(out, 0);
    put_u16(out, 1);

    let name = b"Photo - JPEG";
    let mut compressor = [0u8; 32];
    compressor[0] = name.len() as u8;
    compressor[1..=name.len()].copy_from_slice(name);
    out.extend_from_slice(&compressor);

    put_u16(out, 24);
    out.extend_from_slice(&(-1i16).to_be_bytes());
}

/// External `ffmpeg` fed raw frames on stdin
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    binary: String,
}

impl FfmpegEncoder {
    /// Encoder invoking `binary`
    #[must_use]
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Binary name or path
    #[must_use]
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Whether the binary can be executed
    #[must_use]
    pub fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|status| status.success())
    }

    /// Command-line arguments for one encode
    #[must_use]
    pub fn args(&self, geometry: FrameGeometry, fps: u8, output: &Path) -> Vec<String> {
        let pix_fmt = match geometry.channels {
            1 => "gray",
            3 => "rgb24",
            _ => "rgba",
        };
        let size = format!("{}x{}", geometry.width, geometry.height);
        let rate = fps.max(1).to_string();
        [
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            pix_fmt,
            "-s",
            size.as_str(),
            "-r",
            rate.as_str(),
            "-i",
            "-",
        ]
        .iter()
        .map(|s| (*s).to_string())
        .chain(std::iter::once(output.display().to_string()))
        .collect()
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new(VideoSettings::default().ffmpeg_binary)
    }
}

impl FrameEncoder for FfmpegEncoder {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    fn supports(&self, _format: VideoFormat) -> bool {
        true
    }

    fn encode(&self, frames: &Array4<u8>, fps: u8, output: &Path) -> MediaResult<()> {
        let geometry = FrameGeometry::of(frames)?;
        if !self.is_available() {
            return Err(MediaError::encoding(format!(
                "{} is not available",
                self.binary
            )));
        }

        let mut child = Command::new(&self.binary)
            .args(self.args(geometry, fps, output))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        // stderr is drained while stdin is written
        let stderr_reader = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf);
                buf
            })
        });

        let written = match child.stdin.take() {
            Some(mut stdin) => {
                let raw: Cow<'_, [u8]> = match frames.as_slice() {
                    Some(slice) => Cow::Borrowed(slice),
                    None => Cow::Owned(frames.iter().copied().collect()),
                };
                stdin.write_all(&raw)
            }
            None => Ok(()),
        };

        let status = child.wait()?;
        let stderr = stderr_reader
            .and_then(|reader| reader.join().ok())
            .unwrap_or_default();
        if !status.success() {
            return Err(MediaError::encoding(format!(
                "{} exited with {}: {}",
                self.binary,
                status,
                String::from_utf8_lossy(&stderr).trim()
            )));
        }
        written?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::fs::File;
    use std::rc::Rc;

    fn gray_frames(count: usize, height: usize, width: usize) -> Array4<u8> {
        Array4::from_shape_fn((count, height, width, 1), |(t, y, x, _)| {
            (t * 40 + y * 10 + x) as u8
        })
    }

    mod geometry_tests {
        use super::*;

        #[test]
        fn test_accepts_supported_channels() {
            for channels in [1, 3, 4] {
                let frames = Array4::<u8>::zeros((2, 3, 5, channels));
                let geometry = FrameGeometry::of(&frames).unwrap();
                assert_eq!(geometry.width, 5);
                assert_eq!(geometry.height, 3);
            }
        }

        #[test]
        fn test_rejects_two_channels() {
            let frames = Array4::<u8>::zeros((1, 2, 2, 2));
            assert!(matches!(
                FrameGeometry::of(&frames),
                Err(MediaError::UnsupportedInput { .. })
            ));
        }

        #[test]
        fn test_rejects_empty() {
            let frames = Array4::<u8>::zeros((0, 2, 2, 1));
            assert!(FrameGeometry::of(&frames).is_err());
        }
    }

    mod gif_tests {
        use super::*;

        #[test]
        fn test_delay_from_fps() {
            assert_eq!(gif_delay(4), 25);
            assert_eq!(gif_delay(60), 1);
            assert_eq!(gif_delay(0), 100);
        }

        #[test]
        fn test_palette_is_256_entries() {
            assert_eq!(gif_palette(1).len(), 768);
            let rgb = gif_palette(3);
            assert_eq!(rgb.len(), 768);
            assert_eq!(&rgb[..3], &[0, 0, 0]);
            assert_eq!(&rgb[765..], &[255, 255, 255]);
        }

        #[test]
        fn test_rgb_quantization_round_trips_corners() {
            let frame = Array4::from_shape_vec((1, 1, 2, 3), vec![255, 255, 255, 255, 0, 0])
                .unwrap();
            let indices = gif_indices(frame.index_axis(ndarray::Axis(0), 0), 3);
            assert_eq!(indices, vec![255, 0xE0]);
        }

        #[test]
        fn test_writes_looping_gif() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("out.gif");
            GifEncoder.encode(&gray_frames(3, 4, 6), 4, &path).unwrap();

            let bytes = fs::read(&path).unwrap();
            assert_eq!(&bytes[..6], b"GIF89a");

            let mut options = gif::DecodeOptions::new();
            options.set_color_output(gif::ColorOutput::Indexed);
            let mut decoder = options.read_info(File::open(&path).unwrap()).unwrap();
            assert_eq!(decoder.width(), 6);
            assert_eq!(decoder.height(), 4);
            assert_eq!(decoder.global_palette().unwrap().len(), 768);

            let mut count = 0;
            while let Some(frame) = decoder.read_next_frame().unwrap() {
                assert_eq!(frame.delay, 25);
                count += 1;
            }
            assert_eq!(count, 3);
        }
    }

    mod mp4_tests {
        use super::*;

        fn box_at(data: &[u8], offset: usize) -> (usize, &[u8]) {
            let size = u32::from_be_bytes(data[offset..offset + 4].try_into().unwrap()) as usize;
            (size, &data[offset + 4..offset + 8])
        }

        #[test]
        fn test_top_level_boxes() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("out.mp4");
            let frames = Array4::from_elem((2, 8, 8, 3), 128u8);
            Mp4Encoder::default().encode(&frames, 10, &path).unwrap();

            let data = fs::read(&path).unwrap();
            let (ftyp_size, ftyp) = box_at(&data, 0);
            assert_eq!((ftyp_size, ftyp), (28, &b"ftyp"[..]));

            let (mdat_size, mdat) = box_at(&data, ftyp_size);
            assert_eq!(mdat, b"mdat");
            // first sample is a JPEG
            assert_eq!(&data[36..38], &[0xFF, 0xD8]);

            let (moov_size, moov) = box_at(&data, ftyp_size + mdat_size);
            assert_eq!(moov, b"moov");
            assert_eq!(ftyp_size + mdat_size + moov_size, data.len());
        }

        #[test]
        fn test_gray_frames_encode() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("gray.mp4");
            Mp4Encoder::new(50)
                .encode(&gray_frames(1, 8, 8), 4, &path)
                .unwrap();
            assert!(fs::metadata(&path).unwrap().len() > 36);
        }
    }

    mod ffmpeg_tests {
        use super::*;

        #[test]
        fn test_args() {
            let encoder = FfmpegEncoder::default();
            let geometry = FrameGeometry {
                frames: 2,
                height: 4,
                width: 6,
                channels: 3,
            };
            let args = encoder.args(geometry, 8, Path::new("/tmp/out.webm"));
            assert_eq!(
                args,
                vec![
                    "-y", "-loglevel", "error", "-f", "rawvideo", "-pix_fmt", "rgb24", "-s",
                    "6x4", "-r", "8", "-i", "-", "/tmp/out.webm"
                ]
            );
        }

        #[test]
        fn test_missing_binary_fails() {
            let encoder = FfmpegEncoder::new("richmedia-no-such-ffmpeg");
            assert!(!encoder.is_available());
            let dir = tempfile::tempdir().unwrap();
            let err = encoder
                .encode(&gray_frames(1, 2, 2), 4, &dir.path().join("x.ogg"))
                .unwrap_err();
            assert!(matches!(err, MediaError::Encoding { .. }));
        }

        #[cfg(unix)]
        #[test]
        fn test_early_exit_reports_stderr() {
            use std::os::unix::fs::PermissionsExt;

            let dir = tempfile::tempdir().unwrap();
            let script = dir.path().join("fake-ffmpeg");
            fs::write(
                &script,
                "#!/bin/sh\n[ \"$1\" = \"-version\" ] && exit 0\necho 'unsupported pixel format' >&2\nexit 3\n",
            )
            .unwrap();
            fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

            let encoder = FfmpegEncoder::new(script.display().to_string());
            let frames = Array4::<u8>::zeros((8, 256, 256, 3));
            let err = encoder
                .encode(&frames, 4, &dir.path().join("x.webm"))
                .unwrap_err();

            match err {
                MediaError::Encoding { message } => {
                    assert!(message.contains("unsupported pixel format"), "{message}");
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    mod chain_tests {
        use super::*;

        #[derive(Debug)]
        struct Scripted {
            name: &'static str,
            succeed: bool,
            calls: Rc<RefCell<Vec<&'static str>>>,
        }

        impl FrameEncoder for Scripted {
            fn name(&self) -> &'static str {
                self.name
            }

            fn supports(&self, format: VideoFormat) -> bool {
                format != VideoFormat::Ogg
            }

            fn encode(&self, _frames: &Array4<u8>, _fps: u8, output: &Path) -> MediaResult<()> {
                self.calls.borrow_mut().push(self.name);
                if self.succeed {
                    fs::write(output, self.name)?;
                    Ok(())
                } else {
                    Err(MediaError::encoding(format!("{} failed", self.name)))
                }
            }
        }

        fn chain(script: &[(&'static str, bool)]) -> (EncoderChain, Rc<RefCell<Vec<&'static str>>>) {
            let calls = Rc::new(RefCell::new(Vec::new()));
            let strategies = script
                .iter()
                .map(|&(name, succeed)| {
                    Box::new(Scripted {
                        name,
                        succeed,
                        calls: Rc::clone(&calls),
                    }) as Box<dyn FrameEncoder>
                })
                .collect();
            (EncoderChain::new(strategies), calls)
        }

        #[test]
        fn test_falls_back_until_success() {
            let (chain, calls) = chain(&[("a", false), ("b", true), ("c", true)]);
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("out.gif");

            chain
                .encode(&gray_frames(1, 2, 2), 4, VideoFormat::Gif, &path)
                .unwrap();
            assert_eq!(*calls.borrow(), vec!["a", "b"]);
            assert_eq!(fs::read(&path).unwrap(), b"b");
        }

        #[test]
        fn test_returns_last_failure() {
            let (chain, calls) = chain(&[("a", false), ("b", false)]);
            let dir = tempfile::tempdir().unwrap();
            let err = chain
                .encode(&gray_frames(1, 2, 2), 4, VideoFormat::Mp4, &dir.path().join("o.mp4"))
                .unwrap_err();
            assert_eq!(calls.borrow().len(), 2);
            assert!(err.to_string().contains("b failed"));
        }

        #[test]
        fn test_skips_unsupported_strategies() {
            let (chain, calls) = chain(&[("a", true)]);
            let dir = tempfile::tempdir().unwrap();
            let err = chain
                .encode(&gray_frames(1, 2, 2), 4, VideoFormat::Ogg, &dir.path().join("o.ogg"))
                .unwrap_err();
            assert!(calls.borrow().is_empty());
            assert!(matches!(err, MediaError::Encoding { .. }));
        }

        #[test]
        fn test_default_chain_order() {
            assert_eq!(EncoderChain::default().names(), vec!["gif", "mp4-jpeg", "ffmpeg"]);
        }
    }
}
