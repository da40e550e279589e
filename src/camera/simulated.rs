use super::device::{CameraDevice, DeviceLimits, Grab};
use crate::config::CameraConfig;
use crate::error::CameraError;
use crate::frame::MonoFrame;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

const EXPOSURE_MIN_US: f64 = 19.0;
const EXPOSURE_MAX_US: f64 = 10_000_000.0;
const GAIN_MIN: f64 = 0.0;
const GAIN_MAX: f64 = 24.0;

/// Exposure at which the rendered pattern has its nominal brightness
const REFERENCE_EXPOSURE_US: f64 = 20_000.0;

/// Software camera producing a moving Mono8 gradient.
///
/// Brightness scales linearly with exposure and with gain in dB. In trigger
/// mode frames arrive at a fixed simulated trigger period instead of after
/// each exposure.
pub struct SimulatedCamera {
    width: u32,
    height: u32,
    trigger_period: Duration,
    open: bool,
    acquiring: bool,
    exposure_us: f64,
    gain: f64,
    trigger_mode: bool,
    frame_counter: u64,
    last_trigger: Option<Instant>,
}

impl SimulatedCamera {
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            width: config.resolution.0,
            height: config.resolution.1,
            trigger_period: Duration::from_millis(config.trigger_period_ms),
            open: false,
            acquiring: false,
            exposure_us: REFERENCE_EXPOSURE_US,
            gain: GAIN_MIN,
            trigger_mode: false,
            frame_counter: 0,
            last_trigger: None,
        }
    }

    fn ensure_open(&self) -> Result<(), CameraError> {
        if self.open {
            Ok(())
        } else {
            Err(CameraError::NotOpen)
        }
    }

    fn render(&mut self) -> MonoFrame {
        let scale = (self.exposure_us / REFERENCE_EXPOSURE_US) * 10f64.powf(self.gain / 20.0);
        let shift = (self.frame_counter * 4) as u32;
        self.frame_counter += 1;

        let span = (self.width + self.height).max(1);
        let mut pixels = Vec::with_capacity(self.width as usize * self.height as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                let base = ((x + y + shift) % span) as f64 / span as f64 * 160.0;
                pixels.push((base * scale).round().clamp(0.0, 255.0) as u8);
            }
        }

        MonoFrame::new(self.width, self.height, pixels)
    }

    /// How long until the next frame is ready
    fn next_frame_delay(&mut self) -> Duration {
        if self.trigger_mode {
            let now = Instant::now();
            let last = *self.last_trigger.get_or_insert(now);
            (last + self.trigger_period).saturating_duration_since(now)
        } else {
            Duration::from_secs_f64(self.exposure_us / 1_000_000.0)
        }
    }
}

impl CameraDevice for SimulatedCamera {
    fn open(&mut self) -> Result<(), CameraError> {
        if self.width == 0 || self.height == 0 {
            return Err(CameraError::DeviceOpen {
                details: format!("invalid resolution {}x{}", self.width, self.height),
            });
        }
        self.open = true;
        info!(
            "Simulated camera opened ({}x{} Mono8)",
            self.width, self.height
        );
        Ok(())
    }

    fn close(&mut self) -> Result<(), CameraError> {
        self.acquiring = false;
        self.open = false;
        info!("Simulated camera closed");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn start_acquisition(&mut self) -> Result<(), CameraError> {
        self.ensure_open()?;
        self.acquiring = true;
        self.last_trigger = None;
        debug!("Simulated camera acquisition started");
        Ok(())
    }

    fn stop_acquisition(&mut self) -> Result<(), CameraError> {
        self.acquiring = false;
        debug!("Simulated camera acquisition stopped");
        Ok(())
    }

    fn is_acquiring(&self) -> bool {
        self.acquiring
    }

    fn limits(&self) -> Result<DeviceLimits, CameraError> {
        self.ensure_open()?;
        Ok(DeviceLimits {
            exposure_min_us: EXPOSURE_MIN_US,
            exposure_max_us: EXPOSURE_MAX_US,
            gain_min: GAIN_MIN,
            gain_max: GAIN_MAX,
        })
    }

    fn set_exposure_us(&mut self, exposure_us: f64) -> Result<(), CameraError> {
        self.ensure_open()?;
        if !(EXPOSURE_MIN_US..=EXPOSURE_MAX_US).contains(&exposure_us) {
            return Err(CameraError::Configuration {
                details: format!("exposure {} us out of range", exposure_us),
            });
        }
        self.exposure_us = exposure_us;
        Ok(())
    }

    fn exposure_us(&self) -> Result<f64, CameraError> {
        self.ensure_open()?;
        Ok(self.exposure_us)
    }

    fn set_gain(&mut self, gain: f64) -> Result<(), CameraError> {
        self.ensure_open()?;
        if !(GAIN_MIN..=GAIN_MAX).contains(&gain) {
            return Err(CameraError::Configuration {
                details: format!("gain {} out of range", gain),
            });
        }
        self.gain = gain;
        Ok(())
    }

    fn gain(&self) -> Result<f64, CameraError> {
        self.ensure_open()?;
        Ok(self.gain)
    }

    fn set_trigger_mode(&mut self, enabled: bool) -> Result<(), CameraError> {
        self.ensure_open()?;
        self.trigger_mode = enabled;
        self.last_trigger = None;
        Ok(())
    }

    fn trigger_mode(&self) -> Result<bool, CameraError> {
        self.ensure_open()?;
        Ok(self.trigger_mode)
    }

    fn retrieve_frame(&mut self, timeout: Duration) -> Result<Grab, CameraError> {
        self.ensure_open()?;
        if !self.acquiring {
            return Err(CameraError::NotAcquiring);
        }

        let delay = self.next_frame_delay();
        if delay > timeout {
            // A pending trigger keeps its schedule across the timeout
            std::thread::sleep(timeout);
            return Ok(Grab::TimedOut);
        }

        std::thread::sleep(delay);
        if self.trigger_mode {
            self.last_trigger = Some(Instant::now());
        }

        let frame = self.render();
        trace!(
            "Simulated frame {} ({}x{})",
            self.frame_counter,
            frame.width,
            frame.height
        );
        Ok(Grab::Frame(frame))
    }
}
