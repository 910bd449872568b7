//! Temporal anomaly detection over consecutive frame pairs

use crate::ssim::SimilarityMetric;
use image::{GrayImage, ImageReader};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_THRESHOLD: f64 = 0.60;

/// Score substituted when the metric itself fails; always flags the pair
pub const FAILED_SCORE: f64 = 0.0;

#[derive(Debug, Error)]
pub enum TemporalError {
    #[error("Cannot write temporal scores {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot serialize temporal scores: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Similarity between a frame and the frame right after it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityRecord {
    /// Position of `frame` in the analyzed sequence
    pub ordinal: usize,
    pub frame: String,
    pub next_frame: String,
    pub ssim: f64,
}

/// Pair omitted because one of its rasters failed to decode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedPair {
    pub ordinal: usize,
    pub frame: String,
    pub next_frame: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemporalAnalysis {
    pub threshold: f64,
    pub records: Vec<SimilarityRecord>,
    pub anomalies: Vec<SimilarityRecord>,
    pub skipped_pairs: Vec<SkippedPair>,
    /// Records whose score is the substituted [`FAILED_SCORE`]
    pub metric_failures: usize,
}

enum PairOutcome {
    Scored(SimilarityRecord, bool),
    Skipped(SkippedPair),
}

pub struct TemporalAnalyzer<'a> {
    metric: &'a dyn SimilarityMetric,
    threshold: f64,
    parallel: bool,
}

impl<'a> TemporalAnalyzer<'a> {
    pub fn new(metric: &'a dyn SimilarityMetric) -> Self {
        Self {
            metric,
            threshold: DEFAULT_THRESHOLD,
            parallel: false,
        }
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Whether a score counts as a discontinuity (strictly below threshold)
    pub fn is_anomaly(&self, score: f64) -> bool {
        score < self.threshold
    }

    /// Score every consecutive pair of `frames` in forward order.
    pub fn analyze<P: AsRef<Path> + Sync>(&self, frames: &[P]) -> TemporalAnalysis {
        let outcomes: Vec<PairOutcome> = if self.parallel {
            frames
                .par_windows(2)
                .enumerate()
                .map(|(i, pair)| {
                    let a = load_gray(pair[0].as_ref());
                    let b = load_gray(pair[1].as_ref());
                    self.compare(i, pair[0].as_ref(), pair[1].as_ref(), a.as_ref(), b.as_ref())
                })
                .collect()
        } else {
            // Each frame is decoded once and carried over to the next pair
            let mut outcomes = Vec::with_capacity(frames.len().saturating_sub(1));
            let mut previous = frames.first().map(|p| load_gray(p.as_ref()));
            for (i, pair) in frames.windows(2).enumerate() {
                let current = load_gray(pair[1].as_ref());
                let a = previous.as_ref().and_then(|r| r.as_ref());
                outcomes.push(self.compare(i, pair[0].as_ref(), pair[1].as_ref(), a, current.as_ref()));
                previous = Some(current);
            }
            outcomes
        };

        let mut analysis = TemporalAnalysis {
            threshold: self.threshold,
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                PairOutcome::Scored(record, metric_failed) => {
                    if metric_failed {
                        analysis.metric_failures += 1;
                    }
                    if self.is_anomaly(record.ssim) {
                        analysis.anomalies.push(record.clone());
                    }
                    analysis.records.push(record);
                }
                PairOutcome::Skipped(pair) => analysis.skipped_pairs.push(pair),
            }
        }

        info!(
            "Scored {} pair(s): {} anomalies below {:.2}, {} skipped",
            analysis.records.len(),
            analysis.anomalies.len(),
            self.threshold,
            analysis.skipped_pairs.len()
        );
        analysis
    }

    fn compare(
        &self,
        ordinal: usize,
        path_a: &Path,
        path_b: &Path,
        a: Option<&GrayImage>,
        b: Option<&GrayImage>,
    ) -> PairOutcome {
        let frame = file_name(path_a);
        let next_frame = file_name(path_b);

        let (a, b) = match (a, b) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                debug!("Skipping pair {} -> {}: unreadable raster", frame, next_frame);
                return PairOutcome::Skipped(SkippedPair { ordinal, frame, next_frame });
            }
        };

        let (ssim, failed) = match self.metric.score(a, b) {
            Ok(s) => (s, false),
            Err(e) => {
                warn!("Similarity failed for {} -> {}: {}", frame, next_frame, e);
                (FAILED_SCORE, true)
            }
        };

        debug!("{} -> {} ssim={:.4}", frame, next_frame, ssim);
        PairOutcome::Scored(SimilarityRecord { ordinal, frame, next_frame, ssim }, failed)
    }
}

/// Decode by content, not extension, matching the fingerprinter
fn load_gray(path: &Path) -> Option<GrayImage> {
    let decoded = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(image::ImageError::IoError)
        .and_then(|reader| reader.decode());
    match decoded {
        Ok(img) => Some(img.to_luma8()),
        Err(e) => {
            debug!("Cannot decode {}: {}", path.display(), e);
            None
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Persist the scored records (not anomalies or skips) as pretty JSON
pub fn write_scores(analysis: &TemporalAnalysis, path: impl AsRef<Path>) -> Result<(), TemporalError> {
    let path = path.as_ref();
    let write_err = |source| TemporalError::Write {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(write_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &analysis.records)?;
    writer.flush().map_err(write_err)?;
    Ok(())
}
