mod controller;
mod types;

pub use controller::SettingsController;
pub use types::{
    clamp_threshold, shared_camera, CameraHandle, CameraSettings, SettingsChange, SharedCamera,
};
