mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod types;


pub use orchestrator::CamviewApp;
pub use types::{ComponentState, ShutdownReason};
