use crate::camera::CameraDevice;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Effective camera and gating settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraSettings {
    /// Requested exposure in milliseconds, without the device offset
    pub exposure_ms: f64,
    pub gain: f64,
    pub trigger_enabled: bool,
    pub threshold_gate_enabled: bool,
    pub threshold: u8,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            exposure_ms: 20.0,
            gain: 0.0,
            trigger_enabled: false,
            threshold_gate_enabled: false,
            threshold: 0,
        }
    }
}

/// Partial settings update; `None` leaves a field unchanged
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SettingsChange {
    pub gain: Option<f64>,
    pub exposure_ms: Option<f64>,
    pub trigger_enabled: Option<bool>,
    pub threshold_gate_enabled: Option<bool>,
    /// Raw threshold, clamped into 0..=255 when applied
    pub threshold: Option<i64>,
}

impl SettingsChange {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Threshold after clamping, if one was requested
    pub fn clamped_threshold(&self) -> Option<u8> {
        self.threshold.map(clamp_threshold)
    }
}

pub fn clamp_threshold(raw: i64) -> u8 {
    raw.clamp(0, u8::MAX as i64) as u8
}

/// Camera device together with the settings last applied to it.
///
/// Every device call happens while holding the surrounding lock, so frame
/// retrieval and settings mutation never interleave.
pub struct CameraHandle {
    pub device: Box<dyn CameraDevice>,
    pub settings: CameraSettings,
}

pub type SharedCamera = Arc<Mutex<CameraHandle>>;

pub fn shared_camera(device: Box<dyn CameraDevice>, settings: CameraSettings) -> SharedCamera {
    Arc::new(Mutex::new(CameraHandle { device, settings }))
}
