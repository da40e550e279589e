mod builder;
mod device;
#[cfg(test)]
pub(crate) mod mock;
mod simulated;
#[cfg(test)]
mod tests;

pub use builder::{CameraDeviceBuilder, ConfiguredCamera};
pub use device::{device_exposure_us, CameraDevice, DeviceLimits, Grab, EXPOSURE_OFFSET_MS};
pub use simulated::SimulatedCamera;
