// frame_forensics - forensic analysis CLI
// Hashes a video, extracts and indexes its frames, flags low-SSIM transitions

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use frame_forensics::{ForensicPipeline, PipelineConfig, DEFAULT_THRESHOLD};

#[derive(Parser)]
#[command(name = "frame_forensics", version, about = "Frame-level forensic analysis of a video file")]
struct Args {
    /// Video file to analyze
    video: PathBuf,

    /// Directory for frames, JSON artifacts and the report
    #[arg(long, default_value = "results")]
    output_root: PathBuf,

    /// Keep every n-th frame (0 or 1 = every frame)
    #[arg(long, default_value_t = 0)]
    stride: u32,

    /// Flag pairs whose SSIM is strictly below this value
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: f64,

    /// Delete extracted frames after the report is written
    #[arg(long)]
    cleanup: bool,

    /// Index frames and score pairs in parallel
    #[arg(long)]
    parallel: bool,

    /// Print the full result as JSON on stdout
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    info!("🎬 Video: {}", args.video.display());

    let config = PipelineConfig {
        output_root: args.output_root,
        stride: args.stride,
        threshold: args.threshold,
        cleanup: args.cleanup,
        parallel: args.parallel,
    };

    let result = ForensicPipeline::new(config)
        .run(&args.video)
        .with_context(|| format!("Forensic analysis of {} failed", args.video.display()))?;

    if args.json {
        let out = serde_json::to_string_pretty(&result)
            .context("Failed to serialize pipeline result")?;
        println!("{}", out);
        return Ok(());
    }

    println!("SHA-256: {}", result.video.sha256);
    println!("Frames:  {}", result.index.len());
    println!(
        "Pairs:   {} scored, {} skipped",
        result.records.len(),
        result.skipped_pairs.len()
    );
    if result.anomalies.is_empty() {
        println!("No low-SSIM anomalies detected (SSIM < {}).", result.threshold);
    } else {
        println!(
            "Anomalies (SSIM < {}): {} ({:.1}% of scored pairs)",
            result.threshold,
            result.anomalies.len(),
            result.stats.anomaly_rate() * 100.0
        );
        for anomaly in &result.anomalies {
            println!("   ▶ {} → {} (ssim={:.3})", anomaly.frame, anomaly.next_frame, anomaly.ssim);
        }
    }
    if let Some(report) = &result.artifacts.report {
        println!("Report:  {}", report.display());
    }

    Ok(())
}
