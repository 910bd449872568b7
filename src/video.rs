//! Frame extraction via a pluggable decoder (FFmpeg by default)

use crate::ffmpeg::{FfmpegCommand, FfmpegError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// File name prefix every decoder must use for frame images
pub const FRAME_PREFIX: &str = "frame-";

/// ffmpeg output pattern: fixed-width numeral, 1-based
pub const FFMPEG_FRAME_PATTERN: &str = "frame-%06d.jpg";

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Frame decode failed: {0}")]
    Decoder(String),

    #[error("Cannot prepare frame directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<FfmpegError> for ExtractionError {
    fn from(err: FfmpegError) -> Self {
        match err {
            FfmpegError::ExecutionFailed { stderr, .. } => ExtractionError::Decoder(stderr),
            other => ExtractionError::Decoder(other.to_string()),
        }
    }
}

/// Capability: decode a video into numbered still images.
///
/// Implementations write `frame-<number>.<ext>` files into `output_dir`,
/// numbered in decode order. `stride` of 0 or 1 means every frame, `n > 1`
/// keeps only frames whose index is a multiple of `n`.
pub trait FrameDecoder: Send + Sync {
    fn decode(&self, video: &Path, output_dir: &Path, stride: u32) -> Result<(), ExtractionError>;
}

/// Subprocess decoder shelling out to the system `ffmpeg`
#[derive(Debug, Default, Clone)]
pub struct FfmpegDecoder;

impl FfmpegDecoder {
    pub fn new() -> Self {
        Self
    }

    pub(crate) fn command(video: &Path, output_dir: &Path, stride: u32) -> FfmpegCommand {
        let pattern = output_dir.join(FFMPEG_FRAME_PATTERN);
        let cmd = FfmpegCommand::new().overwrite().input(video);

        if stride > 1 {
            let select = format!("select=not(mod(n\\,{}))", stride);
            cmd.args(&["-vf", &select, "-vsync", "vfr"]).output(pattern)
        } else {
            cmd.args(&["-q:v", "2"]).output(pattern)
        }
    }
}

impl FrameDecoder for FfmpegDecoder {
    fn decode(&self, video: &Path, output_dir: &Path, stride: u32) -> Result<(), ExtractionError> {
        Self::command(video, output_dir, stride).execute()?;
        Ok(())
    }
}

/// One decoded frame on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFrame {
    /// Position in the extracted sequence (0-based)
    pub ordinal: usize,
    /// Frame index in the source video
    pub source_index: u64,
    pub path: PathBuf,
}

impl ExtractedFrame {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

pub struct FrameExtractor {
    decoder: Box<dyn FrameDecoder>,
}

impl FrameExtractor {
    pub fn new(decoder: Box<dyn FrameDecoder>) -> Self {
        Self { decoder }
    }

    /// Decode `video` into `output_dir` and return the frames in temporal order.
    pub fn extract(
        &self,
        video: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
        stride: u32,
    ) -> Result<Vec<ExtractedFrame>, ExtractionError> {
        let video = video.as_ref();
        let output_dir = output_dir.as_ref();

        fs::create_dir_all(output_dir).map_err(|source| ExtractionError::OutputDir {
            path: output_dir.to_path_buf(),
            source,
        })?;

        let stale = remove_stale_frames(output_dir).map_err(|source| ExtractionError::OutputDir {
            path: output_dir.to_path_buf(),
            source,
        })?;
        if stale > 0 {
            debug!("Removed {} stale frame(s) from {}", stale, output_dir.display());
        }

        self.decoder.decode(video, output_dir, stride)?;

        let paths = list_frames(output_dir).map_err(|source| ExtractionError::OutputDir {
            path: output_dir.to_path_buf(),
            source,
        })?;

        let step = effective_stride(stride) as u64;
        let frames: Vec<ExtractedFrame> = paths
            .into_iter()
            .enumerate()
            .map(|(ordinal, path)| ExtractedFrame {
                ordinal,
                source_index: ordinal as u64 * step,
                path,
            })
            .collect();

        info!("Extracted {} frame(s) to {}", frames.len(), output_dir.display());
        Ok(frames)
    }
}

impl Default for FrameExtractor {
    fn default() -> Self {
        Self::new(Box::new(FfmpegDecoder::new()))
    }
}

/// 0 and 1 both mean "every frame"
pub fn effective_stride(stride: u32) -> u32 {
    stride.max(1)
}

/// Sequence number encoded in `frame-<digits>.<ext>`
pub fn frame_number(path: &Path) -> Option<u64> {
    let stem = path.file_stem()?.to_str()?;
    let digits = stem.strip_prefix(FRAME_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Frame files in `dir`, ordered by their sequence number
pub fn list_frames(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut numbered = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(n) = frame_number(&path) {
            numbered.push((n, path));
        }
    }
    numbered.sort();
    Ok(numbered.into_iter().map(|(_, p)| p).collect())
}

fn remove_stale_frames(dir: &Path) -> std::io::Result<usize> {
    let stale = list_frames(dir)?;
    for path in &stale {
        fs::remove_file(path)?;
    }
    Ok(stale.len())
}
