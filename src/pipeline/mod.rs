mod capture;
mod consumer;
mod gate;
mod status;

pub use capture::{Iteration, LoopExit, Pipeline};
pub use consumer::StreamConsumer;
pub use gate::ThresholdGate;
pub use status::{FrameStatus, PipelineStats};
