use super::state::{CAMERA, PIPELINE, STREAMING};
use super::{CamviewApp, ComponentState, ShutdownReason};
use crate::camera::{CameraDeviceBuilder, ConfiguredCamera};
use crate::error::{CamviewError, Result};
use crate::pipeline::{LoopExit, Pipeline};
use crate::settings::{shared_camera, SettingsController};
use crate::streaming::StreamServerBuilder;
use std::sync::Arc;
use tracing::{error, info, warn};

impl CamviewApp {
    /// Bring up camera, capture pipeline and HTTP server in that order.
    ///
    /// A failure at any step releases whatever already started and returns
    /// the error.
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting camview");

        if let Err(e) = self.start_components().await {
            error!("Startup aborted: {}", e);
            if let Err(cleanup) = self.shutdown().await {
                warn!("Cleanup after failed startup reported: {}", cleanup);
            }
            return Err(e);
        }

        info!("camview started successfully");
        Ok(())
    }

    async fn start_components(&mut self) -> Result<()> {
        self.start_camera().await?;
        self.start_pipeline().await?;
        self.start_server().await
    }

    async fn start_camera(&mut self) -> Result<()> {
        self.set_component_state(CAMERA, ComponentState::Starting)
            .await;

        let mut builder = CameraDeviceBuilder::new().config(self.config.camera.clone());
        if let Some(device) = self.device_override.take() {
            builder = builder.device(device);
        }

        let built = tokio::task::spawn_blocking(move || builder.build())
            .await
            .map_err(|e| CamviewError::component(CAMERA.to_string(), e.to_string()))
            .and_then(|result| result);

        let ConfiguredCamera {
            device,
            limits,
            settings,
        } = match built {
            Ok(configured) => configured,
            Err(e) => {
                self.set_component_state(CAMERA, ComponentState::Failed)
                    .await;
                error!("Failed to start camera: {}", e);
                return Err(e);
            }
        };

        let camera = shared_camera(device, settings);
        self.controller = Some(SettingsController::new(
            Arc::clone(&camera),
            limits,
            Arc::clone(&self.event_bus),
        ));
        self.camera = Some(camera);

        self.set_component_state(CAMERA, ComponentState::Running)
            .await;
        info!("Camera started successfully");
        Ok(())
    }

    async fn start_pipeline(&mut self) -> Result<()> {
        let camera = self
            .camera
            .clone()
            .ok_or_else(|| CamviewError::system("Camera must start before the pipeline"))?;

        self.set_component_state(PIPELINE, ComponentState::Starting)
            .await;

        let pipeline = Pipeline::new(
            camera,
            self.config.pipeline.clone(),
            Arc::clone(&self.event_bus),
            self.cancellation_token.clone(),
        );
        self.set_component_state(PIPELINE, ComponentState::Running)
            .await;
        self.capture_task = Some(pipeline.start());

        // Record the pipeline leaving on its own, outside of shutdown
        let watched = Arc::clone(&pipeline);
        let states = self.component_states.clone();
        let token = self.cancellation_token.clone();
        tokio::spawn(async move {
            watched.stopped().cancelled().await;
            if token.is_cancelled() {
                return;
            }
            let state = match watched.exit() {
                Some(LoopExit::Failed(_)) => ComponentState::Failed,
                _ => ComponentState::Stopped,
            };
            states.set(PIPELINE, state).await;
        });

        self.pipeline = Some(pipeline);
        info!("Capture pipeline started successfully");
        Ok(())
    }

    async fn start_server(&mut self) -> Result<()> {
        let (pipeline, controller) = match (self.pipeline.clone(), self.controller.clone()) {
            (Some(pipeline), Some(controller)) => (pipeline, controller),
            _ => {
                return Err(CamviewError::system(
                    "Pipeline must start before the server",
                ))
            }
        };

        self.set_component_state(STREAMING, ComponentState::Starting)
            .await;

        let server = StreamServerBuilder::new()
            .config(self.config.server.clone())
            .auth(self.config.auth.clone())
            .pipeline(pipeline)
            .controller(controller)
            .event_bus(Arc::clone(&self.event_bus))
            .build()?;

        let listener = match server.bind().await {
            Ok(listener) => listener,
            Err(e) => {
                self.set_component_state(STREAMING, ComponentState::Failed)
                    .await;
                return Err(e);
            }
        };
        self.local_addr = listener.local_addr().ok();

        let token = self.cancellation_token.clone();
        let shutdown_sender = Arc::clone(&self.shutdown_sender);
        self.server_task = Some(tokio::spawn(async move {
            if let Err(e) = server.serve(listener, token).await {
                error!("Live view server error: {}", e);
                if let Some(sender) = shutdown_sender.lock().take() {
                    let _ = sender.send(ShutdownReason::Error(e.to_string()));
                }
            }
        }));

        self.set_component_state(STREAMING, ComponentState::Running)
            .await;
        info!(
            "Live view server started on {}:{}",
            self.config.server.ip, self.config.server.port
        );
        Ok(())
    }
}
