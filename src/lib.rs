pub mod app;
pub mod camera;
pub mod config;
pub mod error;
pub mod events;
pub mod frame;
pub mod pipeline;
pub mod settings;
pub mod streaming;

pub use app::{CamviewApp, ComponentState, ShutdownReason};
pub use camera::{CameraDevice, CameraDeviceBuilder, DeviceLimits, Grab, SimulatedCamera};
pub use config::CamviewConfig;
pub use error::{CamviewError, Result};
pub use events::{CamviewEvent, EventBus};
pub use frame::{EncodedFrame, MonoFrame};
pub use pipeline::{FrameStatus, Pipeline, StreamConsumer};
pub use settings::{CameraSettings, SettingsChange, SettingsController};
pub use streaming::{StreamServer, StreamServerBuilder};
