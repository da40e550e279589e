use super::state::{CAMERA, PIPELINE, STREAMING};
use super::{CamviewApp, ComponentState};
use crate::error::{CamviewError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info};

const CAMERA_STOP_TIMEOUT: Duration = Duration::from_secs(10);
const SERVER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

impl CamviewApp {
    /// Stop everything that was started.
    ///
    /// Cancels the shared token, stops acquisition and closes the device,
    /// then waits for the capture loop and the HTTP server to finish. Returns
    /// a non-zero exit code if any component failed to stop cleanly.
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");

        self.cancellation_token.cancel();

        let mut exit_code = 0;

        if let Some(camera) = self.camera.clone() {
            let release = async move {
                tokio::task::spawn_blocking(move || {
                    let mut handle = camera.lock();
                    handle.device.stop_acquisition()?;
                    handle.device.close()
                })
                .await
                .map_err(|e| CamviewError::component(CAMERA.to_string(), e.to_string()))?
                .map_err(CamviewError::from)
            };
            if self
                .stop_component(CAMERA, CAMERA_STOP_TIMEOUT, release)
                .await
                .is_err()
            {
                exit_code = 1;
            }
        }

        if let Some(task) = self.capture_task.take() {
            // A retrieval in flight may hold the loop for one full timeout
            let limit = self.config.pipeline.retrieve_timeout() + SERVER_STOP_TIMEOUT;
            let join = async move {
                let exit = task
                    .await
                    .map_err(|e| CamviewError::component(PIPELINE.to_string(), e.to_string()))?;
                info!("Capture loop exited: {:?}", exit);
                Ok::<(), CamviewError>(())
            };
            if self.stop_component(PIPELINE, limit, join).await.is_err() {
                exit_code = 1;
            }
        }

        if let Some(task) = self.server_task.take() {
            let join = async move {
                task.await
                    .map_err(|e| CamviewError::component(STREAMING.to_string(), e.to_string()))
            };
            if self
                .stop_component(STREAMING, SERVER_STOP_TIMEOUT, join)
                .await
                .is_err()
            {
                exit_code = 1;
            }
        }

        self.camera = None;
        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    async fn stop_component<F>(&self, component: &str, limit: Duration, stop: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        info!("Stopping {} component", component);
        self.set_component_state(component, ComponentState::Stopping)
            .await;

        match timeout(limit, stop).await {
            Ok(Ok(())) => {
                self.set_component_state(component, ComponentState::Stopped)
                    .await;
                info!("{} component stopped", component);
                Ok(())
            }
            Ok(Err(e)) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                error!("Error stopping {} component: {}", component, e);
                Err(e)
            }
            Err(_) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                error!("{} component stop timeout", component);
                Err(CamviewError::component(
                    component.to_string(),
                    "stop timeout".to_string(),
                ))
            }
        }
    }
}
