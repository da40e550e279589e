use crate::frame::FrameStats;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

/// Latest brightness figures exposed to polling clients
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct FrameStatus {
    pub max_intensity: u8,
    pub mean_intensity: f64,
    pub is_streaming: bool,
}

impl FrameStatus {
    /// `/camera_status` body: numbers while streaming, "N/A" otherwise
    pub fn to_json(&self) -> Value {
        if self.is_streaming {
            json!({
                "max_count": self.max_intensity,
                "mean_count": self.mean_intensity,
            })
        } else {
            json!({
                "max_count": "N/A",
                "mean_count": "N/A",
            })
        }
    }
}

/// Counters for the capture loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PipelineStats {
    pub frames_captured: u64,
    pub frames_gated: u64,
    pub frames_delivered: u64,
    pub timeouts: u64,
    pub encode_failures: u64,
}

pub(crate) struct StatusTracker {
    status: RwLock<FrameStatus>,
    frames_captured: AtomicU64,
    frames_gated: AtomicU64,
    frames_delivered: AtomicU64,
    timeouts: AtomicU64,
    encode_failures: AtomicU64,
}

impl StatusTracker {
    pub(crate) fn new() -> Self {
        Self {
            status: RwLock::new(FrameStatus::default()),
            frames_captured: AtomicU64::new(0),
            frames_gated: AtomicU64::new(0),
            frames_delivered: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            encode_failures: AtomicU64::new(0),
        }
    }

    pub(crate) fn snapshot(&self) -> FrameStatus {
        *self.status.read()
    }

    pub(crate) fn set_streaming(&self, streaming: bool) {
        self.status.write().is_streaming = streaming;
    }

    pub(crate) fn record_frame(&self, stats: FrameStats) {
        {
            let mut status = self.status.write();
            status.max_intensity = stats.max;
            status.mean_intensity = stats.mean;
        }
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_gated(&self) {
        self.frames_gated.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivered(&self) {
        self.frames_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timeout(&self) -> u64 {
        self.timeouts.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_encode_failure(&self) {
        self.encode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn stats(&self) -> PipelineStats {
        PipelineStats {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_gated: self.frames_gated.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
        }
    }
}
