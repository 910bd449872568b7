//! Static report rendering

use crate::pipeline::{PipelineResult, FRAMES_DIR};
use chrono::{SecondsFormat, Utc};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const REPORT_FILE: &str = "report.html";

/// Number of frame-index entries shown in the report
const INDEX_PREVIEW: usize = 20;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Cannot write report {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot serialize report section: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Capability: turn a finished run into a human-readable document.
pub trait ReportRenderer: Send + Sync {
    /// Write the report under `output_root` and return its path
    fn render(&self, result: &PipelineResult, output_root: &Path) -> Result<PathBuf, ReportError>;
}

#[derive(Debug, Clone)]
pub struct HtmlReport {
    file_name: String,
}

impl HtmlReport {
    pub fn new() -> Self {
        Self {
            file_name: REPORT_FILE.to_string(),
        }
    }

    pub fn with_file_name(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }

    pub fn to_html(&self, result: &PipelineResult, output_root: &Path) -> Result<String, ReportError> {
        let video_name = escape(&result.video.file_name());
        let generated = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let metadata = serde_json::to_string_pretty(&result.video.metadata)?;
        let stats = &result.stats;

        let mut html = String::new();
        let _ = write!(
            html,
            r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>Video Forensic Report - {video_name}</title>
<style>
body {{ font-family: Arial, sans-serif; max-width: 900px; margin: 2rem; }}
pre {{ background:#f4f4f4; padding:1rem; overflow:auto; }}
.anomaly {{ color: darkred; }}
.thumb {{ max-width: 240px; border:1px solid #ccc; padding:4px; margin:6px; }}
</style>
</head>
<body>
<h1>Video Forensic Report</h1>
<p><strong>Video:</strong> {video_name}</p>
<p><strong>SHA-256:</strong> {sha}</p>
<p><strong>Detected type:</strong> {mime}</p>
<p><strong>Generated (UTC):</strong> {generated}</p>
<h2>Container metadata</h2>
<pre>{metadata}</pre>
<h2>Summary</h2>
<ul>
<li>Frames indexed: {frames}</li>
<li>Frames without perceptual hash: {fp_failures}</li>
<li>Pairs scored: {scored}</li>
<li>Pairs skipped (unreadable frame): {skipped}</li>
<li>Pairs with failed similarity (scored 0.0): {sim_failures}</li>
<li>Anomaly rate: {rate:.1}%</li>
</ul>
<h2>Flagged temporal anomalies (low SSIM)</h2>
<p>Threshold used: SSIM &lt; {threshold}</p>
"#,
            sha = escape(&result.video.sha256),
            mime = escape(result.video.mime_type.as_deref().unwrap_or("unknown")),
            metadata = escape(&metadata),
            frames = result.index.len(),
            fp_failures = stats.fingerprint_failures,
            scored = result.records.len(),
            skipped = result.skipped_pairs.len(),
            sim_failures = stats.similarity_failures,
            rate = stats.anomaly_rate() * 100.0,
            threshold = result.threshold,
        );

        if result.anomalies.is_empty() {
            html.push_str("<p>No low-SSIM anomalies detected.</p>\n");
        } else {
            html.push_str("<ul>\n");
            let frames_dir = output_root.join(FRAMES_DIR);
            for anomaly in &result.anomalies {
                let frame = escape(&anomaly.frame);
                let next = escape(&anomaly.next_frame);
                let _ = write!(
                    html,
                    "<li class=\"anomaly\">{} -&gt; {} (ssim={:.3})<br>",
                    frame, next, anomaly.ssim
                );
                if frames_dir.join(&anomaly.frame).exists() {
                    let _ = write!(
                        html,
                        "<img class=\"thumb\" src=\"{dir}/{frame}\"> <img class=\"thumb\" src=\"{dir}/{next}\">",
                        dir = FRAMES_DIR,
                        frame = frame,
                        next = next
                    );
                }
                html.push_str("</li>\n");
            }
            html.push_str("</ul>\n");
        }

        if !result.skipped_pairs.is_empty() {
            html.push_str("<h2>Skipped pairs</h2>\n<ul>\n");
            for pair in &result.skipped_pairs {
                let _ = writeln!(html, "<li>{} -&gt; {}</li>", escape(&pair.frame), escape(&pair.next_frame));
            }
            html.push_str("</ul>\n");
        }

        let _ = write!(
            html,
            "<h2>Frame index (first {} entries)</h2>\n<pre>\n",
            INDEX_PREVIEW.min(result.index.len())
        );
        for entry in result.index.iter().take(INDEX_PREVIEW) {
            let line = serde_json::to_string(entry)?;
            let _ = writeln!(html, "{}", escape(&line));
        }
        html.push_str("</pre>\n</body></html>\n");

        Ok(html)
    }
}

impl Default for HtmlReport {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportRenderer for HtmlReport {
    fn render(&self, result: &PipelineResult, output_root: &Path) -> Result<PathBuf, ReportError> {
        let html = self.to_html(result, output_root)?;
        let path = output_root.join(&self.file_name);
        fs::write(&path, html).map_err(|source| ReportError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
