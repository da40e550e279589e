use crate::frame::MonoFrame;
use crate::settings::CameraSettings;

/// Brightness gate applied to each captured frame.
///
/// A gated frame is replaced by a uniform white frame of the same size, so
/// viewers see a steady placeholder rather than the last passing image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdGate {
    pub enabled: bool,
    pub threshold: u8,
}

impl ThresholdGate {
    pub fn from_settings(settings: &CameraSettings) -> Self {
        Self {
            enabled: settings.threshold_gate_enabled,
            threshold: settings.threshold,
        }
    }

    pub fn blocks(&self, mean_intensity: f64) -> bool {
        self.enabled && mean_intensity <= self.threshold as f64
    }

    /// Returns the frame to deliver and whether it was substituted
    pub fn apply(&self, frame: MonoFrame, mean_intensity: f64) -> (MonoFrame, bool) {
        if self.blocks(mean_intensity) {
            (frame.white_like(), true)
        } else {
            (frame, false)
        }
    }
}
