use thiserror::Error;

#[derive(Error, Debug)]
pub enum CamviewError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl CamviewError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Failures reported by a camera device
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CameraError {
    #[error("Failed to open camera device: {details}")]
    DeviceOpen { details: String },

    #[error("Camera device is not open")]
    NotOpen,

    #[error("Camera configuration failed: {details}")]
    Configuration { details: String },

    #[error("Frame retrieval failed: {details}")]
    Retrieval { details: String },

    #[error("Camera is not acquiring")]
    NotAcquiring,
}

/// Failures of a settings change
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControlError {
    #[error("{field} value {value} outside of [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Device rejected settings change: {0}")]
    Device(#[from] CameraError),

    #[error("Settings task failed: {details}")]
    Task { details: String },
}

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Failed to bind {address}: {source}")]
    BindFailed {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server startup failed: {details}")]
    StartupFailed { details: String },

    #[error("JPEG encoding failed: {details}")]
    Encoding { details: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },
}

pub type Result<T> = std::result::Result<T, CamviewError>;
