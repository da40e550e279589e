use super::device::{device_exposure_us, CameraDevice, DeviceLimits};
use super::simulated::SimulatedCamera;
use crate::config::CameraConfig;
use crate::error::{CamviewError, Result};
use crate::settings::CameraSettings;
use tracing::{error, info};

/// Device that has been opened, configured and put into acquisition
pub struct ConfiguredCamera {
    pub device: Box<dyn CameraDevice>,
    pub limits: DeviceLimits,
    pub settings: CameraSettings,
}

/// Builder running the camera startup sequence
pub struct CameraDeviceBuilder {
    config: Option<CameraConfig>,
    device: Option<Box<dyn CameraDevice>>,
}

impl CameraDeviceBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            device: None,
        }
    }

    pub fn config(mut self, config: CameraConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use this device instead of the simulated camera
    pub fn device(mut self, device: Box<dyn CameraDevice>) -> Self {
        self.device = Some(device);
        self
    }

    /// Open the device, apply startup defaults, read its limits and start
    /// acquisition. Any failure aborts startup and closes the device.
    pub fn build(self) -> Result<ConfiguredCamera> {
        let config = self
            .config
            .ok_or_else(|| CamviewError::system("Camera configuration must be specified"))?;

        let mut device = self
            .device
            .unwrap_or_else(|| Box::new(SimulatedCamera::new(&config)));

        device.open()?;

        match Self::configure(device.as_mut(), &config) {
            Ok((limits, settings)) => {
                info!(
                    "Camera ready: exposure {:.3}-{:.3} ms, gain {:.2}-{:.2}",
                    limits.exposure_min_ms(),
                    limits.exposure_max_ms(),
                    limits.gain_min,
                    limits.gain_max
                );
                Ok(ConfiguredCamera {
                    device,
                    limits,
                    settings,
                })
            }
            Err(e) => {
                error!("Camera startup failed: {}", e);
                let _ = device.close();
                Err(e.into())
            }
        }
    }

    fn configure(
        device: &mut dyn CameraDevice,
        config: &CameraConfig,
    ) -> std::result::Result<(DeviceLimits, CameraSettings), crate::error::CameraError> {
        device.set_trigger_mode(false)?;
        device.set_exposure_us(device_exposure_us(config.initial_exposure_ms))?;
        device.set_gain(config.initial_gain)?;
        let limits = device.limits()?;
        device.start_acquisition()?;

        let settings = CameraSettings {
            exposure_ms: config.initial_exposure_ms,
            gain: config.initial_gain,
            ..CameraSettings::default()
        };

        Ok((limits, settings))
    }
}

impl Default for CameraDeviceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
