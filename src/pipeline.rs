//! End-to-end forensic pipeline
//!
//! Sequencing and failure policy:
//!
//! | Stage | On failure |
//! |---|---|
//! | video digest | abort, nothing written |
//! | metadata probe | empty metadata, continue |
//! | frame extraction / zero frames | abort |
//! | frame fingerprint | empty `phash`, continue |
//! | frame digest | abort |
//! | pair decode | pair skipped |
//! | pair similarity | score 0.0 (anomaly) |
//! | frame cleanup | warning only |

use crate::error::{ForensicsError, Result};
use crate::fingerprint::{PerceptualHasher, PhashFingerprinter};
use crate::hash;
use crate::index::{self, serialize_opt_path_lossy, serialize_path_lossy, FrameIndex, FrameIndexer};
use crate::metrics::{PipelineStats, Timer};
use crate::probe::{self, FfprobeProbe, MetadataProbe};
use crate::report::{HtmlReport, ReportRenderer};
use crate::ssim::{SimilarityMetric, Ssim};
use crate::temporal::{self, SimilarityRecord, SkippedPair, TemporalAnalyzer, DEFAULT_THRESHOLD};
use crate::video::{FfmpegDecoder, FrameDecoder, FrameExtractor};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const FRAMES_DIR: &str = "frames";
pub const INDEX_FILE: &str = "frame_index.json";
pub const TEMPORAL_FILE: &str = "temporal.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory receiving frames, JSON documents and the report
    pub output_root: PathBuf,
    /// 0 or 1 = every frame, n = every n-th frame
    pub stride: u32,
    /// Pairs scoring strictly below this are anomalies
    pub threshold: f64,
    /// Delete extracted frames once all artifacts are written
    pub cleanup: bool,
    /// Fingerprint frames and score pairs on the rayon pool
    pub parallel: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("results"),
            stride: 0,
            threshold: DEFAULT_THRESHOLD,
            cleanup: false,
            parallel: false,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() || !(-1.0..=1.0).contains(&self.threshold) {
            return Err(ForensicsError::Config(format!(
                "threshold must be within [-1, 1], got {}",
                self.threshold
            )));
        }
        if self.output_root.as_os_str().is_empty() {
            return Err(ForensicsError::Config("output root is empty".to_string()));
        }
        Ok(())
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.output_root.join(FRAMES_DIR)
    }
}

/// The analyzed video, fixed at pipeline start
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoArtifact {
    #[serde(serialize_with = "serialize_path_lossy")]
    pub path: PathBuf,
    pub sha256: String,
    pub mime_type: Option<String>,
    pub metadata: Value,
}

impl VideoArtifact {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactPaths {
    #[serde(serialize_with = "serialize_path_lossy")]
    pub frames_dir: PathBuf,
    #[serde(serialize_with = "serialize_path_lossy")]
    pub index: PathBuf,
    #[serde(serialize_with = "serialize_path_lossy")]
    pub temporal: PathBuf,
    #[serde(serialize_with = "serialize_opt_path_lossy")]
    pub report: Option<PathBuf>,
    pub frames_removed: bool,
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub video: VideoArtifact,
    pub index: FrameIndex,
    pub threshold: f64,
    pub records: Vec<SimilarityRecord>,
    pub anomalies: Vec<SimilarityRecord>,
    pub skipped_pairs: Vec<SkippedPair>,
    pub artifacts: ArtifactPaths,
    pub stats: PipelineStats,
}

pub struct ForensicPipeline {
    config: PipelineConfig,
    decoder: Box<dyn FrameDecoder>,
    probe: Box<dyn MetadataProbe>,
    fingerprinter: Box<dyn PerceptualHasher>,
    metric: Box<dyn SimilarityMetric>,
    renderer: Option<Box<dyn ReportRenderer>>,
}

impl ForensicPipeline {
    /// Pipeline with the ffmpeg/ffprobe collaborators and an HTML report
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            decoder: Box::new(FfmpegDecoder::new()),
            probe: Box::new(FfprobeProbe::new()),
            fingerprinter: Box::new(PhashFingerprinter::new()),
            metric: Box::new(Ssim),
            renderer: Some(Box::new(HtmlReport::new())),
        }
    }

    pub fn with_decoder(mut self, decoder: impl FrameDecoder + 'static) -> Self {
        self.decoder = Box::new(decoder);
        self
    }

    pub fn with_probe(mut self, probe: impl MetadataProbe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    pub fn with_fingerprinter(mut self, fingerprinter: impl PerceptualHasher + 'static) -> Self {
        self.fingerprinter = Box::new(fingerprinter);
        self
    }

    pub fn with_metric(mut self, metric: impl SimilarityMetric + 'static) -> Self {
        self.metric = Box::new(metric);
        self
    }

    pub fn with_renderer(mut self, renderer: impl ReportRenderer + 'static) -> Self {
        self.renderer = Some(Box::new(renderer));
        self
    }

    pub fn without_report(mut self) -> Self {
        self.renderer = None;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(self, video: impl AsRef<Path>) -> Result<PipelineResult> {
        let video = video.as_ref();
        self.config.validate()?;

        let total = Timer::new();
        let mut stats = PipelineStats::default();

        info!("Computing SHA-256 of {}", video.display());
        let timer = Timer::new();
        let sha256 = hash::digest(video)?;
        stats.timings.hash_ms = timer.elapsed_ms();
        info!("SHA-256: {}", sha256);

        let video_path = fs::canonicalize(video).map_err(|source| ForensicsError::Io {
            path: video.to_path_buf(),
            source,
        })?;
        let mime_type = sniff_mime(&video_path);

        let output_root = &self.config.output_root;
        fs::create_dir_all(output_root).map_err(|source| ForensicsError::Io {
            path: output_root.clone(),
            source,
        })?;

        info!("Probing container metadata");
        let timer = Timer::new();
        let metadata = match self.probe.probe(&video_path) {
            Ok(meta) => meta,
            Err(e) => {
                warn!("Metadata probe failed, continuing without it: {}", e);
                probe::empty_metadata()
            }
        };
        stats.timings.probe_ms = timer.elapsed_ms();

        let video_artifact = VideoArtifact {
            path: video_path,
            sha256,
            mime_type,
            metadata,
        };

        info!("Extracting frames (stride {})", self.config.stride);
        let timer = Timer::new();
        let frames_dir = self.config.frames_dir();
        let ForensicPipeline {
            config,
            decoder,
            fingerprinter,
            metric,
            renderer,
            ..
        } = self;
        let extracted = FrameExtractor::new(decoder).extract(&video_artifact.path, &frames_dir, config.stride)?;
        stats.timings.extract_ms = timer.elapsed_ms();
        if extracted.is_empty() {
            return Err(ForensicsError::NoFrames(video_artifact.path));
        }
        stats.frames_extracted = extracted.len();

        info!("Indexing {} frame(s) (pHash + SHA-256)", extracted.len());
        let timer = Timer::new();
        let frame_index = FrameIndexer::new(fingerprinter.as_ref())
            .parallel(config.parallel)
            .index(&extracted)?;
        let index_path = config.output_root.join(INDEX_FILE);
        index::write_index(&frame_index, &index_path)?;
        stats.timings.index_ms = timer.elapsed_ms();
        stats.fingerprint_failures = frame_index.fingerprint_failures();
        info!("Wrote {}", index_path.display());

        info!("Computing SSIM between consecutive frames");
        let timer = Timer::new();
        let analysis = TemporalAnalyzer::new(metric.as_ref())
            .threshold(config.threshold)
            .parallel(config.parallel)
            .analyze(frame_index.paths().as_slice());
        let temporal_path = config.output_root.join(TEMPORAL_FILE);
        temporal::write_scores(&analysis, &temporal_path)?;
        stats.timings.temporal_ms = timer.elapsed_ms();
        stats.pairs_scored = analysis.records.len();
        stats.pairs_skipped = analysis.skipped_pairs.len();
        stats.similarity_failures = analysis.metric_failures;
        stats.anomalies = analysis.anomalies.len();
        info!("Temporal analysis saved to {}", temporal_path.display());

        let mut result = PipelineResult {
            video: video_artifact,
            index: frame_index,
            threshold: analysis.threshold,
            records: analysis.records,
            anomalies: analysis.anomalies,
            skipped_pairs: analysis.skipped_pairs,
            artifacts: ArtifactPaths {
                frames_dir: frames_dir.clone(),
                index: index_path,
                temporal: temporal_path,
                report: None,
                frames_removed: false,
            },
            stats,
        };

        if let Some(renderer) = renderer {
            let timer = Timer::new();
            let report_path = renderer.render(&result, &config.output_root)?;
            result.stats.timings.report_ms = timer.elapsed_ms();
            info!("Report written to {}", report_path.display());
            result.artifacts.report = Some(report_path);
        }

        if config.cleanup {
            info!("Cleaning up extracted frames");
            match fs::remove_dir_all(&frames_dir) {
                Ok(()) => result.artifacts.frames_removed = true,
                Err(e) => warn!("Could not remove {}: {}", frames_dir.display(), e),
            }
        }

        result.stats.timings.total_ms = total.elapsed_ms();
        info!(
            "Pipeline finished: {} frame(s), {} anomal{}",
            result.index.len(),
            result.anomalies.len(),
            if result.anomalies.len() == 1 { "y" } else { "ies" }
        );
        Ok(result)
    }
}

fn sniff_mime(path: &Path) -> Option<String> {
    match infer::get_from_path(path) {
        Ok(kind) => kind.map(|k| k.mime_type().to_string()),
        Err(e) => {
            warn!("Cannot sniff file type of {}: {}", path.display(), e);
            None
        }
    }
}
