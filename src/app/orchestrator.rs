use super::state::ComponentStates;
use super::types::ShutdownReason;
use crate::camera::CameraDevice;
use crate::config::CamviewConfig;
use crate::error::Result;
use crate::events::EventBus;
use crate::pipeline::{LoopExit, Pipeline};
use crate::settings::{SettingsController, SharedCamera};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Application coordinator owning the camera, capture pipeline and HTTP server
pub struct CamviewApp {
    pub(super) config: CamviewConfig,
    pub(super) event_bus: Arc<EventBus>,

    /// Device to use instead of the simulated camera
    pub(super) device_override: Option<Box<dyn CameraDevice>>,

    // Components, populated by `start`
    pub(super) camera: Option<SharedCamera>,
    pub(super) controller: Option<SettingsController>,
    pub(super) pipeline: Option<Arc<Pipeline>>,
    pub(super) capture_task: Option<JoinHandle<LoopExit>>,
    pub(super) server_task: Option<JoinHandle<()>>,
    pub(super) local_addr: Option<SocketAddr>,

    // Lifecycle management
    pub(super) component_states: ComponentStates,
    pub(super) shutdown_sender: Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl CamviewApp {
    /// Create the application from a validated configuration
    pub fn new(config: CamviewConfig) -> Result<Self> {
        config.validate()?;

        let event_bus = Arc::new(EventBus::new(config.events.capacity));
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        Ok(Self {
            config,
            event_bus,
            device_override: None,
            camera: None,
            controller: None,
            pipeline: None,
            capture_task: None,
            server_task: None,
            local_addr: None,
            component_states: ComponentStates::default(),
            shutdown_sender: Arc::new(Mutex::new(Some(shutdown_sender))),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Drive this device instead of the built-in simulated camera
    pub fn with_device(mut self, device: Box<dyn CameraDevice>) -> Self {
        self.device_override = Some(device);
        self
    }

    pub fn config(&self) -> &CamviewConfig {
        &self.config
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn pipeline(&self) -> Option<Arc<Pipeline>> {
        self.pipeline.clone()
    }

    pub fn controller(&self) -> Option<SettingsController> {
        self.controller.clone()
    }

    /// Address the HTTP server is bound to, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Ask a running `run` loop to shut down
    pub fn request_shutdown(&self, reason: ShutdownReason) -> bool {
        match self.shutdown_sender.lock().take() {
            Some(sender) => sender.send(reason).is_ok(),
            None => false,
        }
    }
}
