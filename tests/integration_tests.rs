//! Integration tests for the frame_forensics pipeline

use frame_forensics::probe::{MetadataProbe, ProbeError};
use frame_forensics::{
    digest, ExtractionError, ForensicPipeline, ForensicsError, FrameDecoder, FrameExtractor,
    HashError, PipelineConfig,
};
use image::{GrayImage, Luma};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Stands in for ffmpeg: renders `levels.len()` flat gray frames,
/// keeping every `stride`-th one, numbered from 1 like ffmpeg does.
struct SyntheticDecoder {
    levels: Vec<u8>,
    corrupt: Vec<usize>,
}

impl SyntheticDecoder {
    fn new(levels: Vec<u8>) -> Self {
        Self {
            levels,
            corrupt: Vec::new(),
        }
    }

    fn with_corrupt(mut self, written_ordinal: usize) -> Self {
        self.corrupt.push(written_ordinal);
        self
    }
}

impl FrameDecoder for SyntheticDecoder {
    fn decode(&self, _video: &Path, output_dir: &Path, stride: u32) -> Result<(), ExtractionError> {
        let step = stride.max(1) as usize;
        for (ordinal, (_, level)) in self
            .levels
            .iter()
            .enumerate()
            .filter(|(n, _)| n % step == 0)
            .enumerate()
        {
            let path = output_dir.join(format!("frame-{:06}.png", ordinal + 1));
            if self.corrupt.contains(&ordinal) {
                fs::write(&path, b"").map_err(|e| ExtractionError::Decoder(e.to_string()))?;
            } else {
                GrayImage::from_pixel(24, 24, Luma([*level]))
                    .save(&path)
                    .map_err(|e| ExtractionError::Decoder(e.to_string()))?;
            }
        }
        Ok(())
    }
}

struct FailingDecoder;

impl FrameDecoder for FailingDecoder {
    fn decode(&self, _video: &Path, _output_dir: &Path, _stride: u32) -> Result<(), ExtractionError> {
        Err(ExtractionError::Decoder("Invalid data found when processing input".to_string()))
    }
}

struct StaticProbe(Value);

impl MetadataProbe for StaticProbe {
    fn probe(&self, _video: &Path) -> Result<Value, ProbeError> {
        Ok(self.0.clone())
    }
}

struct BrokenProbe;

impl MetadataProbe for BrokenProbe {
    fn probe(&self, _video: &Path) -> Result<Value, ProbeError> {
        Err(ProbeError::Parse(serde_json::from_str::<Value>("{").unwrap_err()))
    }
}

fn fake_video(dir: &Path) -> PathBuf {
    let path = dir.join("evidence.mp4");
    fs::write(&path, b"not really a video, but hashable").unwrap();
    path
}

fn config(root: &Path) -> PipelineConfig {
    PipelineConfig {
        output_root: root.join("results"),
        ..Default::default()
    }
}

fn split_levels() -> Vec<u8> {
    vec![5, 5, 5, 5, 5, 250, 250, 250, 250, 250]
}

#[test]
fn test_single_transition_yields_one_anomaly() {
    let temp_dir = TempDir::new().unwrap();
    let video = fake_video(temp_dir.path());

    let result = ForensicPipeline::new(config(temp_dir.path()))
        .with_decoder(SyntheticDecoder::new(split_levels()))
        .with_probe(StaticProbe(json!({ "format": { "nb_streams": 1 } })))
        .run(&video)
        .unwrap();

    assert_eq!(result.index.len(), 10);
    assert_eq!(result.records.len(), 9);
    assert_eq!(result.anomalies.len(), 1);

    let cut = &result.anomalies[0];
    assert_eq!(cut.ordinal, 4);
    assert_eq!(cut.frame, "frame-000005.png");
    assert_eq!(cut.next_frame, "frame-000006.png");
    assert!(cut.ssim < 0.1, "cut ssim={}", cut.ssim);

    for record in result.records.iter().filter(|r| r.ordinal != 4) {
        assert!(record.ssim > 0.99, "{} ssim={}", record.frame, record.ssim);
    }

    assert_eq!(result.video.sha256, digest(&video).unwrap());
    assert!(result.video.path.is_absolute());
    assert_eq!(result.video.metadata["format"]["nb_streams"], 1);
    assert_eq!(result.stats.anomalies, 1);
    assert_eq!(result.stats.frames_extracted, 10);
}

#[test]
fn test_stride_three_on_nine_frames() {
    let temp_dir = TempDir::new().unwrap();
    let video = fake_video(temp_dir.path());
    let levels: Vec<u8> = (0..9).map(|i| i * 25).collect();

    let result = ForensicPipeline::new(PipelineConfig {
        stride: 3,
        ..config(temp_dir.path())
    })
    .with_decoder(SyntheticDecoder::new(levels))
    .with_probe(StaticProbe(json!({})))
    .run(&video)
    .unwrap();

    let sources: Vec<u64> = result.index.iter().map(|f| f.source_index).collect();
    assert_eq!(sources, vec![0, 3, 6]);
    assert_eq!(result.records.len(), 2);
}

#[test]
fn test_extractor_stride_counts() {
    let temp_dir = TempDir::new().unwrap();

    for (n, stride, expected) in [(10usize, 0u32, 10usize), (10, 1, 10), (10, 5, 2), (12, 5, 3), (9, 3, 3)] {
        let out = temp_dir.path().join(format!("frames_{}_{}", n, stride));
        let extractor = FrameExtractor::new(Box::new(SyntheticDecoder::new(vec![128; n])));

        let frames = extractor.extract("video.mp4", &out, stride).unwrap();

        assert_eq!(frames.len(), expected, "n={} stride={}", n, stride);
        let mut names: Vec<String> = frames.iter().map(|f| f.file_name()).collect();
        let in_order = names.clone();
        names.sort();
        assert_eq!(names, in_order);
    }
}

#[test]
fn test_corrupt_frame_does_not_abort_indexing() {
    let temp_dir = TempDir::new().unwrap();
    let video = fake_video(temp_dir.path());

    let result = ForensicPipeline::new(config(temp_dir.path()))
        .with_decoder(SyntheticDecoder::new(vec![90; 6]).with_corrupt(2))
        .with_probe(StaticProbe(json!({})))
        .run(&video)
        .unwrap();

    assert_eq!(result.index.len(), 6);
    assert!(result.index.frames()[2].phash.is_empty());
    assert_eq!(result.index.frames()[2].sha256.len(), 64);
    for (i, frame) in result.index.iter().enumerate() {
        if i != 2 {
            assert!(!frame.phash.is_empty(), "frame {} lost its fingerprint", i);
        }
    }
    assert_eq!(result.stats.fingerprint_failures, 1);

    // Pairs touching the corrupt frame are skipped, not flagged
    assert_eq!(result.records.len(), 3);
    assert_eq!(result.skipped_pairs.len(), 2);
    assert!(result.anomalies.is_empty());
}

#[test]
fn test_missing_video_aborts_before_any_artifact() {
    let temp_dir = TempDir::new().unwrap();
    let cfg = config(temp_dir.path());
    let output_root = cfg.output_root.clone();

    let err = ForensicPipeline::new(cfg)
        .with_decoder(SyntheticDecoder::new(split_levels()))
        .run(temp_dir.path().join("missing.mp4"))
        .unwrap_err();

    assert!(matches!(err, ForensicsError::VideoHash(HashError::NotFound(_))));
    assert!(!output_root.exists());
}

#[test]
fn test_directory_as_video_is_invalid_input() {
    let temp_dir = TempDir::new().unwrap();
    let cfg = config(temp_dir.path());

    let err = ForensicPipeline::new(cfg)
        .with_decoder(SyntheticDecoder::new(split_levels()))
        .run(temp_dir.path())
        .unwrap_err();

    assert!(matches!(err, ForensicsError::VideoHash(HashError::InvalidInput(_))));
}

#[test]
fn test_extraction_failure_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let video = fake_video(temp_dir.path());
    let cfg = config(temp_dir.path());
    let output_root = cfg.output_root.clone();

    let err = ForensicPipeline::new(cfg)
        .with_decoder(FailingDecoder)
        .with_probe(StaticProbe(json!({})))
        .run(&video)
        .unwrap_err();

    match err {
        ForensicsError::Extraction(ExtractionError::Decoder(msg)) => {
            assert!(msg.contains("Invalid data"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!output_root.join("frame_index.json").exists());
    assert!(!output_root.join("report.html").exists());
}

#[test]
fn test_zero_frames_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let video = fake_video(temp_dir.path());

    let err = ForensicPipeline::new(config(temp_dir.path()))
        .with_decoder(SyntheticDecoder::new(Vec::new()))
        .with_probe(StaticProbe(json!({})))
        .run(&video)
        .unwrap_err();

    assert!(matches!(err, ForensicsError::NoFrames(_)));
}

#[test]
fn test_probe_failure_is_not_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let video = fake_video(temp_dir.path());

    let result = ForensicPipeline::new(config(temp_dir.path()))
        .with_decoder(SyntheticDecoder::new(vec![50; 3]))
        .with_probe(BrokenProbe)
        .run(&video)
        .unwrap();

    assert_eq!(result.video.metadata, json!({}));
    assert_eq!(result.index.len(), 3);
}

#[test]
fn test_artifacts_written_then_frames_cleaned_up() {
    let temp_dir = TempDir::new().unwrap();
    let video = fake_video(temp_dir.path());

    let result = ForensicPipeline::new(PipelineConfig {
        cleanup: true,
        ..config(temp_dir.path())
    })
    .with_decoder(SyntheticDecoder::new(split_levels()))
    .with_probe(StaticProbe(json!({})))
    .run(&video)
    .unwrap();

    let artifacts = &result.artifacts;
    assert!(artifacts.frames_removed);
    assert!(!artifacts.frames_dir.exists());

    let index: Value = serde_json::from_str(&fs::read_to_string(&artifacts.index).unwrap()).unwrap();
    assert_eq!(index.as_array().unwrap().len(), 10);

    let scores: Value = serde_json::from_str(&fs::read_to_string(&artifacts.temporal).unwrap()).unwrap();
    assert_eq!(scores.as_array().unwrap().len(), 9);

    let report = fs::read_to_string(artifacts.report.as_ref().unwrap()).unwrap();
    assert!(report.contains("frame-000005.png -&gt; frame-000006.png"));
    assert!(report.contains(&result.video.sha256));
}

#[test]
fn test_parallel_run_matches_sequential() {
    let temp_dir = TempDir::new().unwrap();
    let video = fake_video(temp_dir.path());
    let levels = vec![10, 10, 120, 120, 120, 240, 30, 30];

    let sequential = ForensicPipeline::new(PipelineConfig {
        output_root: temp_dir.path().join("seq"),
        ..Default::default()
    })
    .with_decoder(SyntheticDecoder::new(levels.clone()))
    .with_probe(StaticProbe(json!({})))
    .without_report()
    .run(&video)
    .unwrap();

    let parallel = ForensicPipeline::new(PipelineConfig {
        output_root: temp_dir.path().join("par"),
        parallel: true,
        ..Default::default()
    })
    .with_decoder(SyntheticDecoder::new(levels))
    .with_probe(StaticProbe(json!({})))
    .without_report()
    .run(&video)
    .unwrap();

    assert_eq!(sequential.records, parallel.records);
    assert_eq!(sequential.anomalies, parallel.anomalies);
    let seq_hashes: Vec<&str> = sequential.index.iter().map(|f| f.sha256.as_str()).collect();
    let par_hashes: Vec<&str> = parallel.index.iter().map(|f| f.sha256.as_str()).collect();
    assert_eq!(seq_hashes, par_hashes);
    assert!(parallel.artifacts.report.is_none());
}

#[test]
fn test_custom_threshold_changes_classification() {
    let temp_dir = TempDir::new().unwrap();
    let video = fake_video(temp_dir.path());

    let result = ForensicPipeline::new(PipelineConfig {
        threshold: -1.0,
        ..config(temp_dir.path())
    })
    .with_decoder(SyntheticDecoder::new(split_levels()))
    .with_probe(StaticProbe(json!({})))
    .run(&video)
    .unwrap();

    assert_eq!(result.records.len(), 9);
    assert!(result.anomalies.is_empty());
}

#[cfg(unix)]
#[test]
fn test_non_utf8_output_root_completes() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let temp_dir = TempDir::new().unwrap();
    let video = fake_video(temp_dir.path());
    let root = temp_dir.path().join(OsStr::from_bytes(b"case\xff"));

    let result = ForensicPipeline::new(PipelineConfig {
        output_root: root.clone(),
        ..Default::default()
    })
    .with_decoder(SyntheticDecoder::new(vec![40, 40, 40]))
    .with_probe(StaticProbe(json!({})))
    .run(&video)
    .unwrap();

    assert_eq!(result.index.len(), 3);
    assert_eq!(result.records.len(), 2);
    assert!(result.index.iter().all(|f| f.sha256.len() == 64));

    let doc: Value = serde_json::from_str(&fs::read_to_string(root.join("frame_index.json")).unwrap()).unwrap();
    assert_eq!(doc.as_array().unwrap().len(), 3);
    assert!(doc[0]["path"].as_str().unwrap().contains('\u{fffd}'));
    assert!(root.join("temporal.json").is_file());
    assert!(root.join("report.html").is_file());

    let summary = serde_json::to_value(&result).unwrap();
    assert!(summary["artifacts"]["index"].as_str().unwrap().ends_with("frame_index.json"));
}
