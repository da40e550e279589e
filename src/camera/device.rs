use crate::error::CameraError;
use crate::frame::MonoFrame;
use std::time::Duration;

/// Offset added to every requested exposure so the device never receives a
/// value below its minimum increment
pub const EXPOSURE_OFFSET_MS: f64 = 0.019;

/// Outcome of a successful retrieval call
#[derive(Debug)]
pub enum Grab {
    Frame(MonoFrame),
    /// No frame arrived within the timeout
    TimedOut,
}

/// Range limits reported by the device once it is open
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceLimits {
    pub exposure_min_us: f64,
    pub exposure_max_us: f64,
    pub gain_min: f64,
    pub gain_max: f64,
}

impl DeviceLimits {
    pub fn exposure_min_ms(&self) -> f64 {
        self.exposure_min_us / 1000.0
    }

    pub fn exposure_max_ms(&self) -> f64 {
        self.exposure_max_us / 1000.0
    }
}

/// Capability the acquisition pipeline needs from a camera.
///
/// Implementations block in [`CameraDevice::retrieve_frame`]; callers hold the
/// shared camera lock for the duration of every call.
pub trait CameraDevice: Send {
    fn open(&mut self) -> Result<(), CameraError>;
    fn close(&mut self) -> Result<(), CameraError>;
    fn is_open(&self) -> bool;

    fn start_acquisition(&mut self) -> Result<(), CameraError>;
    fn stop_acquisition(&mut self) -> Result<(), CameraError>;
    fn is_acquiring(&self) -> bool;

    fn limits(&self) -> Result<DeviceLimits, CameraError>;

    fn set_exposure_us(&mut self, exposure_us: f64) -> Result<(), CameraError>;
    fn exposure_us(&self) -> Result<f64, CameraError>;

    fn set_gain(&mut self, gain: f64) -> Result<(), CameraError>;
    fn gain(&self) -> Result<f64, CameraError>;

    fn set_trigger_mode(&mut self, enabled: bool) -> Result<(), CameraError>;
    fn trigger_mode(&self) -> Result<bool, CameraError>;

    /// Wait up to `timeout` for the next frame.
    ///
    /// `Ok(Grab::TimedOut)` is recoverable; `Err` is a hard failure.
    fn retrieve_frame(&mut self, timeout: Duration) -> Result<Grab, CameraError>;
}

/// Convert a requested exposure in milliseconds to the microsecond value the
/// device receives
pub fn device_exposure_us(requested_ms: f64) -> f64 {
    (requested_ms + EXPOSURE_OFFSET_MS) * 1000.0
}
