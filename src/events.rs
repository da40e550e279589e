use crate::error::EventBusError;
use crate::settings::CameraSettings;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Events pushed to connected browser sessions and internal listeners
#[derive(Debug, Clone, Serialize)]
pub enum CamviewEvent {
    /// A settings change was applied to the camera
    SettingsUpdated {
        settings: CameraSettings,
        timestamp: DateTime<Utc>,
    },
    /// A dispatched settings change failed against the device
    SettingsFailed { error: String },
    /// The capture loop has exited
    StreamingStopped { reason: String },
    /// A system error occurred in a component
    SystemError { component: String, error: String },
}

impl CamviewEvent {
    pub fn settings_updated(settings: CameraSettings) -> Self {
        Self::SettingsUpdated {
            settings,
            timestamp: Utc::now(),
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            CamviewEvent::SettingsUpdated { settings, .. } => format!(
                "Settings updated: exposure {:.3} ms, gain {:.2}, trigger {}, gate {} @ {}",
                settings.exposure_ms,
                settings.gain,
                settings.trigger_enabled,
                settings.threshold_gate_enabled,
                settings.threshold
            ),
            CamviewEvent::SettingsFailed { error } => format!("Settings change failed: {}", error),
            CamviewEvent::StreamingStopped { reason } => format!("Streaming stopped: {}", reason),
            CamviewEvent::SystemError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            CamviewEvent::SettingsUpdated { .. } => "update_settings",
            CamviewEvent::SettingsFailed { .. } => "settings_failed",
            CamviewEvent::StreamingStopped { .. } => "streaming_stopped",
            CamviewEvent::SystemError { .. } => "system_error",
        }
    }

    /// Browser-facing message, `None` for events that stay server-side
    pub fn to_client_message(&self) -> Option<serde_json::Value> {
        let data = match self {
            CamviewEvent::SettingsUpdated { settings, .. } => json!({
                "gain": settings.gain,
                "exposure": settings.exposure_ms,
                "triggered": settings.trigger_enabled,
                "count_trigger": settings.threshold_gate_enabled,
                "threshold": settings.threshold,
            }),
            CamviewEvent::SettingsFailed { error } => json!({ "error": error }),
            CamviewEvent::StreamingStopped { reason } => json!({ "reason": reason }),
            CamviewEvent::SystemError { .. } => return None,
        };

        Some(json!({ "event": self.event_type(), "data": data }))
    }
}

/// Broadcast channel for settings notifications
pub struct EventBus {
    sender: broadcast::Sender<CamviewEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CamviewEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers.
    ///
    /// Returns the number of receivers, or an error when nobody is listening.
    pub fn publish(&self, event: CamviewEvent) -> Result<usize, EventBusError> {
        match &event {
            CamviewEvent::SettingsUpdated { .. } => info!("{}", event.description()),
            CamviewEvent::SettingsFailed { error } => warn!("Settings change failed: {}", error),
            CamviewEvent::StreamingStopped { reason } => warn!("Streaming stopped: {}", reason),
            CamviewEvent::SystemError { component, error } => {
                error!("System error in {}: {}", component, error)
            }
        }

        self.sender.send(event).map_err(|e| {
            debug!("No event subscribers: {}", e);
            EventBusError::PublishFailed {
                details: e.to_string(),
            }
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}
