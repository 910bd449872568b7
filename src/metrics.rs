//! Run statistics for a forensic pipeline pass

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Counters and per-stage latency of one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub frames_extracted: usize,
    pub fingerprint_failures: usize,
    pub pairs_scored: usize,
    pub pairs_skipped: usize,
    pub similarity_failures: usize,
    pub anomalies: usize,
    pub timings: StageTimings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageTimings {
    pub hash_ms: u64,
    pub probe_ms: u64,
    pub extract_ms: u64,
    pub index_ms: u64,
    pub temporal_ms: u64,
    pub report_ms: u64,
    pub total_ms: u64,
}

impl PipelineStats {
    /// Share of scored pairs flagged as anomalies
    pub fn anomaly_rate(&self) -> f64 {
        if self.pairs_scored > 0 {
            self.anomalies as f64 / self.pairs_scored as f64
        } else {
            0.0
        }
    }
}

/// Timer for tracking stage latency
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
