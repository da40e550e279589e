use super::{CamviewApp, ComponentState};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

pub const CAMERA: &str = "camera";
pub const PIPELINE: &str = "pipeline";
pub const STREAMING: &str = "streaming";

/// Lifecycle table shared with background tasks
#[derive(Clone, Default)]
pub struct ComponentStates {
    states: Arc<Mutex<HashMap<String, ComponentState>>>,
}

impl ComponentStates {
    pub async fn set(&self, component: &str, state: ComponentState) {
        self.states
            .lock()
            .await
            .insert(component.to_string(), state.clone());
        debug!("Component '{}' state changed to: {:?}", component, state);
    }

    pub async fn get(&self, component: &str) -> Option<ComponentState> {
        self.states.lock().await.get(component).cloned()
    }

    pub async fn snapshot(&self) -> HashMap<String, ComponentState> {
        self.states.lock().await.clone()
    }
}

impl CamviewApp {
    pub async fn set_component_state(&self, component: &str, state: ComponentState) {
        self.component_states.set(component, state).await;
    }

    pub async fn get_component_state(&self, component: &str) -> Option<ComponentState> {
        self.component_states.get(component).await
    }

    pub async fn get_all_component_states(&self) -> HashMap<String, ComponentState> {
        self.component_states.snapshot().await
    }
}
