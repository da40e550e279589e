use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CamviewConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub camera: CameraConfig,
    pub pipeline: PipelineConfig,
    pub events: EventsConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
    /// IP address to bind to
    #[serde(default = "default_server_ip")]
    pub ip: String,

    /// Port to listen on
    #[serde(default = "default_server_port")]
    pub port: u16,
}

/// Login credentials, compared as plain text
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AuthConfig {
    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default = "default_password")]
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CameraConfig {
    /// Exposure applied at startup, in milliseconds
    #[serde(default = "default_initial_exposure_ms")]
    pub initial_exposure_ms: f64,

    /// Gain applied at startup
    #[serde(default = "default_initial_gain")]
    pub initial_gain: f64,

    /// Resolution of the simulated sensor (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Interval between simulated external trigger pulses
    #[serde(default = "default_trigger_period_ms")]
    pub trigger_period_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Sleep between captures while trigger mode is off
    #[serde(default = "default_pacing_interval_ms")]
    pub pacing_interval_ms: u64,

    /// Upper bound on a single frame retrieval
    #[serde(default = "default_retrieve_timeout_ms")]
    pub retrieve_timeout_ms: u64,

    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Frames buffered per stream consumer before the oldest are dropped
    #[serde(default = "default_consumer_buffer")]
    pub consumer_buffer: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EventsConfig {
    /// Notification channel capacity
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

impl PipelineConfig {
    pub fn pacing_interval(&self) -> Duration {
        Duration::from_millis(self.pacing_interval_ms)
    }

    pub fn retrieve_timeout(&self) -> Duration {
        Duration::from_millis(self.retrieve_timeout_ms)
    }
}

impl CamviewConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("camview.toml")
    }

    /// Load configuration from a specific file path.
    ///
    /// The file format follows the extension, so the `config.yaml` layout of
    /// older deployments loads as well as TOML.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("server.ip", default_server_ip())?
            .set_default("server.port", default_server_port())?
            .set_default("auth.username", default_username())?
            .set_default("auth.password", default_password())?
            .set_default("camera.initial_exposure_ms", default_initial_exposure_ms())?
            .set_default("camera.initial_gain", default_initial_gain())?
            .set_default(
                "camera.resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("camera.trigger_period_ms", default_trigger_period_ms())?
            .set_default("pipeline.pacing_interval_ms", default_pacing_interval_ms())?
            .set_default("pipeline.retrieve_timeout_ms", default_retrieve_timeout_ms())?
            .set_default("pipeline.jpeg_quality", default_jpeg_quality() as u64)?
            .set_default("pipeline.consumer_buffer", default_consumer_buffer() as u64)?
            .set_default("events.capacity", default_event_capacity() as u64)?
            .add_source(File::with_name(&path_str).required(false))
            // CAMVIEW_AUTH__PASSWORD etc.
            .add_source(Environment::with_prefix("CAMVIEW").separator("__"))
            .build()?;

        let config: CamviewConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!(
            "Final configuration: server={:?} camera={:?} pipeline={:?}",
            config.server, config.camera, config.pipeline
        );

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.username.is_empty() {
            return Err(ConfigError::Message(
                "Auth username must not be empty".to_string(),
            ));
        }

        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if !(self.camera.initial_exposure_ms > 0.0) {
            return Err(ConfigError::Message(
                "Initial exposure must be greater than 0".to_string(),
            ));
        }

        if self.pipeline.retrieve_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "Retrieve timeout must be greater than 0".to_string(),
            ));
        }

        if self.pipeline.jpeg_quality == 0 || self.pipeline.jpeg_quality > 100 {
            return Err(ConfigError::Message(
                "JPEG quality must be within 1..=100".to_string(),
            ));
        }

        if self.pipeline.consumer_buffer == 0 {
            return Err(ConfigError::Message(
                "Consumer buffer must be greater than 0".to_string(),
            ));
        }

        if self.events.capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for CamviewConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                ip: default_server_ip(),
                port: default_server_port(),
            },
            auth: AuthConfig {
                username: default_username(),
                password: default_password(),
            },
            camera: CameraConfig {
                initial_exposure_ms: default_initial_exposure_ms(),
                initial_gain: default_initial_gain(),
                resolution: default_camera_resolution(),
                trigger_period_ms: default_trigger_period_ms(),
            },
            pipeline: PipelineConfig {
                pacing_interval_ms: default_pacing_interval_ms(),
                retrieve_timeout_ms: default_retrieve_timeout_ms(),
                jpeg_quality: default_jpeg_quality(),
                consumer_buffer: default_consumer_buffer(),
            },
            events: EventsConfig {
                capacity: default_event_capacity(),
            },
        }
    }
}

// Default value functions
fn default_server_ip() -> String {
    "0.0.0.0".to_string()
}
fn default_server_port() -> u16 {
    5000
}

fn default_username() -> String {
    "admin".to_string()
}
fn default_password() -> String {
    "admin".to_string()
}

fn default_initial_exposure_ms() -> f64 {
    20.0
}
fn default_initial_gain() -> f64 {
    0.0
}
fn default_camera_resolution() -> (u32, u32) {
    (640, 480)
}
fn default_trigger_period_ms() -> u64 {
    500
}

fn default_pacing_interval_ms() -> u64 {
    100
}
fn default_retrieve_timeout_ms() -> u64 {
    5000
}
fn default_jpeg_quality() -> u8 {
    90
}
fn default_consumer_buffer() -> usize {
    4
}

fn default_event_capacity() -> usize {
    64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = CamviewConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.camera.initial_exposure_ms, 20.0);
        assert_eq!(config.camera.initial_gain, 0.0);
        assert_eq!(config.pipeline.pacing_interval(), Duration::from_millis(100));
        assert_eq!(config.pipeline.retrieve_timeout(), Duration::from_millis(5000));
    }

    #[test]
    fn test_load_yaml_credentials() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "auth:\n  username: operator\n  password: hunter2").unwrap();

        let config = CamviewConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.auth.username, "operator");
        assert_eq!(config.auth.password, "hunter2");
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_load_toml_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[server]\nport = 8081\n\n[pipeline]\npacing_interval_ms = 50\njpeg_quality = 75"
        )
        .unwrap();

        let config = CamviewConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.server.port, 8081);
        assert_eq!(config.pipeline.pacing_interval_ms, 50);
        assert_eq!(config.pipeline.jpeg_quality, 75);
        assert_eq!(config.pipeline.retrieve_timeout_ms, 5000);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = CamviewConfig::load_from_file("/nonexistent/camview.toml").unwrap();
        assert_eq!(config.server, CamviewConfig::default().server);
    }

    #[test]
    fn test_config_validation() {
        let mut config = CamviewConfig::default();
        config.pipeline.jpeg_quality = 0;
        assert!(config.validate().is_err());

        config.pipeline.jpeg_quality = 90;
        config.camera.resolution = (0, 480);
        assert!(config.validate().is_err());

        config.camera.resolution = (640, 480);
        config.auth.username.clear();
        assert!(config.validate().is_err());

        config.auth.username = "admin".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_serializes_to_toml() {
        let text = toml::to_string_pretty(&CamviewConfig::default()).unwrap();
        assert!(text.contains("[pipeline]"));
        assert!(text.contains("pacing_interval_ms = 100"));
    }
}
