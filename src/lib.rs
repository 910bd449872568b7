//! frame_forensics - frame-level forensic analysis of video files
//!
//! Hashes the video, decodes it into still frames (system `ffmpeg`, no
//! linking), indexes every frame with a perceptual and a SHA-256
//! fingerprint, and flags consecutive frame pairs whose structural
//! similarity drops below a threshold.
//!
//! ```rust,no_run
//! use frame_forensics::{ForensicPipeline, PipelineConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig { stride: 5, ..Default::default() };
//! let result = ForensicPipeline::new(config).run("evidence/cam01.mp4")?;
//! for anomaly in &result.anomalies {
//!     println!("{} -> {} ssim={:.3}", anomaly.frame, anomaly.next_frame, anomaly.ssim);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod ffmpeg;
pub mod fingerprint;
pub mod hash;
pub mod index;
pub mod metrics;
pub mod pipeline;
pub mod probe;
pub mod report;
pub mod ssim;
pub mod temporal;
pub mod video;

pub use error::{ForensicsError, Result};
pub use ffmpeg::{FfmpegCommand, FfmpegError};
pub use fingerprint::{FingerprintError, PerceptualHasher, PhashFingerprinter};
pub use hash::{digest, HashError, IntegrityHasher};
pub use index::{Frame, FrameIndex, FrameIndexer, IndexError};
pub use metrics::{PipelineStats, StageTimings};
pub use pipeline::{ArtifactPaths, ForensicPipeline, PipelineConfig, PipelineResult, VideoArtifact};
pub use probe::{FfprobeProbe, MetadataProbe, ProbeError};
pub use report::{HtmlReport, ReportError, ReportRenderer};
pub use ssim::{SimilarityError, SimilarityMetric, Ssim};
pub use temporal::{SimilarityRecord, SkippedPair, TemporalAnalysis, TemporalAnalyzer, DEFAULT_THRESHOLD};
pub use video::{ExtractedFrame, ExtractionError, FfmpegDecoder, FrameDecoder, FrameExtractor};
