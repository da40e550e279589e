use super::types::{CameraHandle, CameraSettings, SettingsChange, SharedCamera};
use crate::camera::{device_exposure_us, DeviceLimits, EXPOSURE_OFFSET_MS};
use crate::error::{CameraError, ControlError};
use crate::events::{CamviewEvent, EventBus};
use std::sync::{Arc, OnceLock};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Device setting written during an apply, restored on rollback
#[derive(Debug, Clone, Copy)]
enum Applied {
    Gain,
    ExposureMs,
    Trigger,
}

/// Validates settings changes and applies them under the camera lock
#[derive(Clone)]
pub struct SettingsController {
    camera: SharedCamera,
    limits: DeviceLimits,
    event_bus: Arc<EventBus>,
    queue: Arc<OnceLock<mpsc::UnboundedSender<SettingsChange>>>,
}

impl SettingsController {
    pub fn new(camera: SharedCamera, limits: DeviceLimits, event_bus: Arc<EventBus>) -> Self {
        Self {
            camera,
            limits,
            event_bus,
            queue: Arc::new(OnceLock::new()),
        }
    }

    pub fn limits(&self) -> DeviceLimits {
        self.limits
    }

    /// Snapshot of the settings currently in effect
    pub fn current(&self) -> CameraSettings {
        self.camera.lock().settings
    }

    /// Check exposure and gain against the device limits
    pub fn validate(&self, change: &SettingsChange) -> Result<(), ControlError> {
        if let Some(gain) = change.gain {
            check_range("gain", gain, self.limits.gain_min, self.limits.gain_max)?;
        }

        if let Some(exposure_ms) = change.exposure_ms {
            // The offset is part of what the device receives
            check_range(
                "exposure",
                exposure_ms + EXPOSURE_OFFSET_MS,
                self.limits.exposure_min_ms(),
                self.limits.exposure_max_ms(),
            )?;
        }

        Ok(())
    }

    /// Apply a change as one unit while holding the camera lock.
    ///
    /// Blocks for as long as a frame retrieval holds the lock. If the device
    /// rejects one field, fields already written are restored before the
    /// error is returned.
    pub fn apply(&self, change: SettingsChange) -> Result<CameraSettings, ControlError> {
        self.validate(&change)?;

        let settings = {
            let mut handle = self.camera.lock();
            let previous = handle.settings;
            let mut applied = Vec::with_capacity(3);

            if let Err(e) = write_device_fields(&mut handle, &change, &mut applied) {
                rollback(&mut handle, &previous, &applied);
                return Err(ControlError::Device(e));
            }

            let mut next = previous;
            if let Some(gain) = change.gain {
                next.gain = gain;
            }
            if let Some(exposure_ms) = change.exposure_ms {
                next.exposure_ms = exposure_ms;
            }
            if let Some(trigger) = change.trigger_enabled {
                next.trigger_enabled = trigger;
            }
            if let Some(gate) = change.threshold_gate_enabled {
                next.threshold_gate_enabled = gate;
            }
            if let Some(threshold) = change.clamped_threshold() {
                next.threshold = threshold;
            }

            handle.settings = next;
            next
        };

        if let Err(e) = self
            .event_bus
            .publish(CamviewEvent::settings_updated(settings))
        {
            debug!("Settings update not broadcast: {}", e);
        }

        Ok(settings)
    }

    /// Run [`SettingsController::apply`] on the blocking pool and wait for it
    pub async fn apply_async(&self, change: SettingsChange) -> Result<CameraSettings, ControlError> {
        let controller = self.clone();
        tokio::task::spawn_blocking(move || controller.apply(change))
            .await
            .map_err(|e| ControlError::Task {
                details: e.to_string(),
            })?
    }

    /// Fire-and-forget apply.
    ///
    /// Changes go through one queue and are applied in submission order.
    /// Failures are logged and published as `SettingsFailed`. Must be called
    /// from within a tokio runtime.
    pub fn dispatch(&self, change: SettingsChange) {
        let queue = self.queue.get_or_init(|| {
            let (sender, receiver) = mpsc::unbounded_channel();
            // The worker holds no sender, so the queue closes with the last controller
            let worker = Self::new(
                Arc::clone(&self.camera),
                self.limits,
                Arc::clone(&self.event_bus),
            );
            tokio::spawn(worker.run_queue(receiver));
            sender
        });

        if let Err(e) = queue.send(change) {
            error!("Settings queue closed, change dropped: {:?}", e.0);
        }
    }

    async fn run_queue(self, mut changes: mpsc::UnboundedReceiver<SettingsChange>) {
        while let Some(change) = changes.recv().await {
            match self.apply_async(change).await {
                Ok(settings) => debug!("Dispatched settings change applied: {:?}", settings),
                Err(e) => {
                    error!("Dispatched settings change failed: {}", e);
                    if let Err(e) = self.event_bus.publish(CamviewEvent::SettingsFailed {
                        error: e.to_string(),
                    }) {
                        debug!("Settings failure not broadcast: {}", e);
                    }
                }
            }
        }

        debug!("Settings queue closed");
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ControlError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ControlError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

fn write_device_fields(
    handle: &mut CameraHandle,
    change: &SettingsChange,
    applied: &mut Vec<Applied>,
) -> Result<(), CameraError> {
    if let Some(gain) = change.gain {
        handle.device.set_gain(gain)?;
        applied.push(Applied::Gain);
    }

    if let Some(exposure_ms) = change.exposure_ms {
        let exposure_us = device_exposure_us(exposure_ms);
        handle.device.set_exposure_us(exposure_us)?;
        applied.push(Applied::ExposureMs);
        info!(
            "Exposure set to {:.3} ms ({:.1} us on device)",
            exposure_ms, exposure_us
        );
    }

    if let Some(trigger) = change.trigger_enabled {
        handle.device.set_trigger_mode(trigger)?;
        applied.push(Applied::Trigger);
    }

    Ok(())
}

fn rollback(handle: &mut CameraHandle, previous: &CameraSettings, applied: &[Applied]) {
    for step in applied.iter().rev() {
        let result = match step {
            Applied::Gain => handle.device.set_gain(previous.gain),
            Applied::ExposureMs => handle
                .device
                .set_exposure_us(device_exposure_us(previous.exposure_ms)),
            Applied::Trigger => handle.device.set_trigger_mode(previous.trigger_enabled),
        };

        if let Err(e) = result {
            warn!("Failed to roll back {:?}: {}", step, e);
        }
    }
}
