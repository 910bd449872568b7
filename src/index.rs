//! Frame indexing: perceptual + integrity fingerprint per extracted frame

use crate::fingerprint::PerceptualHasher;
use crate::hash::{self, HashError};
use crate::video::ExtractedFrame;
use rayon::prelude::*;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Cannot digest extracted frame {path}: {source}")]
    Digest {
        path: PathBuf,
        #[source]
        source: HashError,
    },

    #[error("Frame listed twice: {0}")]
    DuplicateFrame(PathBuf),

    #[error("Cannot write frame index {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot serialize frame index: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One indexed frame. `phash` is empty when the frame could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub ordinal: usize,
    pub source_index: u64,
    pub frame: String,
    #[serde(serialize_with = "serialize_path_lossy")]
    pub path: PathBuf,
    pub phash: String,
    pub sha256: String,
}

/// JSON strings must be UTF-8; undecodable path bytes become U+FFFD
pub(crate) fn serialize_path_lossy<P, S>(path: &P, serializer: S) -> Result<S::Ok, S::Error>
where
    P: AsRef<Path>,
    S: Serializer,
{
    serializer.serialize_str(&path.as_ref().to_string_lossy())
}

pub(crate) fn serialize_opt_path_lossy<S: Serializer>(
    path: &Option<PathBuf>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match path {
        Some(p) => serialize_path_lossy(p, serializer),
        None => serializer.serialize_none(),
    }
}

impl Frame {
    pub fn has_fingerprint(&self) -> bool {
        !self.phash.is_empty()
    }
}

/// Frames in temporal order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameIndex {
    frames: Vec<Frame>,
}

impl FrameIndex {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Frame> {
        self.frames.iter()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.frames.iter().map(|f| f.path.clone()).collect()
    }

    /// Number of frames whose perceptual fingerprint failed
    pub fn fingerprint_failures(&self) -> usize {
        self.frames.iter().filter(|f| !f.has_fingerprint()).count()
    }
}

impl<'a> IntoIterator for &'a FrameIndex {
    type Item = &'a Frame;
    type IntoIter = std::slice::Iter<'a, Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

pub struct FrameIndexer<'a> {
    fingerprinter: &'a dyn PerceptualHasher,
    parallel: bool,
}

impl<'a> FrameIndexer<'a> {
    pub fn new(fingerprinter: &'a dyn PerceptualHasher) -> Self {
        Self {
            fingerprinter,
            parallel: false,
        }
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Fingerprint and digest every frame, preserving input order.
    ///
    /// A frame that cannot be fingerprinted gets an empty `phash`; a frame
    /// that cannot be digested aborts the whole index.
    pub fn index(&self, frames: &[ExtractedFrame]) -> Result<FrameIndex, IndexError> {
        let mut seen = HashSet::with_capacity(frames.len());
        for frame in frames {
            if !seen.insert(frame.path.as_path()) {
                return Err(IndexError::DuplicateFrame(frame.path.clone()));
            }
        }

        let indexed: Vec<Frame> = if self.parallel {
            frames
                .par_iter()
                .map(|f| self.index_one(f))
                .collect::<Result<_, _>>()?
        } else {
            frames
                .iter()
                .map(|f| self.index_one(f))
                .collect::<Result<_, _>>()?
        };

        let index = FrameIndex { frames: indexed };
        info!(
            "Indexed {} frame(s), {} without perceptual fingerprint",
            index.len(),
            index.fingerprint_failures()
        );
        Ok(index)
    }

    fn index_one(&self, frame: &ExtractedFrame) -> Result<Frame, IndexError> {
        let phash = match self.fingerprinter.fingerprint(&frame.path) {
            Ok(h) => h,
            Err(e) => {
                warn!("Fingerprint failed for {}: {}", frame.path.display(), e);
                String::new()
            }
        };

        let sha256 = hash::digest(&frame.path).map_err(|source| IndexError::Digest {
            path: frame.path.clone(),
            source,
        })?;

        debug!("{} phash={} sha256={}", frame.file_name(), phash, sha256);

        Ok(Frame {
            ordinal: frame.ordinal,
            source_index: frame.source_index,
            frame: frame.file_name(),
            path: frame.path.clone(),
            phash,
            sha256,
        })
    }
}

/// Persist the index as pretty-printed JSON
pub fn write_index(index: &FrameIndex, path: impl AsRef<Path>) -> Result<(), IndexError> {
    let path = path.as_ref();
    let write_err = |source| IndexError::Write {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(write_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, index)?;
    writer.flush().map_err(write_err)?;
    Ok(())
}
