//! Container / stream metadata probing

use crate::ffmpeg::{FfmpegCommand, FfmpegError};
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("ffprobe failed: {0}")]
    Ffprobe(#[from] FfmpegError),

    #[error("Unparseable probe output: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Capability: describe a video's container format and streams.
pub trait MetadataProbe: Send + Sync {
    fn probe(&self, video: &Path) -> Result<Value, ProbeError>;
}

/// `ffprobe -show_format -show_streams` as a JSON document
#[derive(Debug, Default, Clone)]
pub struct FfprobeProbe;

impl FfprobeProbe {
    pub fn new() -> Self {
        Self
    }

    fn command(video: &Path) -> FfmpegCommand {
        FfmpegCommand::probe()
            .args(&[
                "-v", "error",
                "-print_format", "json",
                "-show_format",
                "-show_streams",
            ])
            .output(video)
    }
}

impl MetadataProbe for FfprobeProbe {
    fn probe(&self, video: &Path) -> Result<Value, ProbeError> {
        let output = Self::command(video).execute()?;
        let parsed: Value = serde_json::from_slice(&output.stdout)?;
        Ok(parsed)
    }
}

/// Placeholder document used when probing fails
pub fn empty_metadata() -> Value {
    Value::Object(serde_json::Map::new())
}
