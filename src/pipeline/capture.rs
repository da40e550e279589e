use super::consumer::StreamConsumer;
use super::gate::ThresholdGate;
use super::status::{FrameStatus, PipelineStats, StatusTracker};
use crate::camera::Grab;
use crate::config::PipelineConfig;
use crate::error::CameraError;
use crate::events::{CamviewEvent, EventBus};
use crate::frame::{encode_jpeg, EncodedFrame};
use crate::settings::SharedCamera;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Why the capture loop returned
#[derive(Debug, Clone, PartialEq)]
pub enum LoopExit {
    /// The device left the acquiring state
    DeviceStopped,
    /// Process shutdown was requested
    Shutdown,
    /// Frame retrieval failed with a non-timeout error
    Failed(CameraError),
}

/// Result of one capture iteration
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Iteration {
    /// Frame encoded and published to this many consumers
    Delivered { consumers: usize, gated: bool },
    /// Frame captured but nobody is subscribed
    Captured { gated: bool },
    /// Frame captured but could not be encoded
    EncodeFailed,
    TimedOut,
    /// The device was no longer acquiring when the lock was taken
    Stopped,
}

/// Acquisition and streaming pipeline.
///
/// Owns the capture loop, live status and the frame fan-out. All device
/// access goes through the shared camera lock.
pub struct Pipeline {
    camera: SharedCamera,
    config: PipelineConfig,
    event_bus: Arc<EventBus>,
    frames: broadcast::Sender<EncodedFrame>,
    status: StatusTracker,
    sequence: AtomicU64,
    consumers: Arc<AtomicUsize>,
    shutdown: CancellationToken,
    stopped: CancellationToken,
    exit: Mutex<Option<LoopExit>>,
}

impl Pipeline {
    pub fn new(
        camera: SharedCamera,
        config: PipelineConfig,
        event_bus: Arc<EventBus>,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        let (frames, _) = broadcast::channel(config.consumer_buffer.max(1));

        Arc::new(Self {
            camera,
            config,
            event_bus,
            frames,
            status: StatusTracker::new(),
            sequence: AtomicU64::new(0),
            consumers: Arc::new(AtomicUsize::new(0)),
            shutdown,
            stopped: CancellationToken::new(),
            exit: Mutex::new(None),
        })
    }

    /// Run the capture loop on the blocking pool
    pub fn start(self: &Arc<Self>) -> JoinHandle<LoopExit> {
        let pipeline = Arc::clone(self);
        tokio::task::spawn_blocking(move || pipeline.run())
    }

    /// Blocking capture loop. Returns when the device stops acquiring, on
    /// shutdown, or on a hard retrieval failure.
    pub fn run(&self) -> LoopExit {
        info!(
            "Capture loop started (pacing {:?}, timeout {:?})",
            self.config.pacing_interval(),
            self.config.retrieve_timeout()
        );
        self.status.set_streaming(true);

        let exit = loop {
            if self.shutdown.is_cancelled() {
                break LoopExit::Shutdown;
            }

            let (acquiring, triggered) = {
                let handle = self.camera.lock();
                (handle.device.is_acquiring(), handle.settings.trigger_enabled)
            };

            if !acquiring {
                break LoopExit::DeviceStopped;
            }

            // Externally triggered frames are not paced
            if !triggered {
                std::thread::sleep(self.config.pacing_interval());
                if self.shutdown.is_cancelled() {
                    break LoopExit::Shutdown;
                }
            }

            match self.capture_once() {
                // Shutdown cancels the token before it stops the device
                Ok(Iteration::Stopped) if self.shutdown.is_cancelled() => {
                    break LoopExit::Shutdown;
                }
                Ok(Iteration::Stopped) => break LoopExit::DeviceStopped,
                Ok(Iteration::TimedOut) => {
                    let total = self.status.record_timeout();
                    warn!(
                        "Frame retrieval timed out after {:?} ({} total)",
                        self.config.retrieve_timeout(),
                        total
                    );
                }
                Ok(iteration) => trace!("Capture iteration: {:?}", iteration),
                Err(e) => {
                    error!("Frame retrieval failed, stopping capture loop: {}", e);
                    break LoopExit::Failed(e);
                }
            }
        };

        self.status.set_streaming(false);
        *self.exit.lock() = Some(exit.clone());
        self.stopped.cancel();
        self.announce_exit(&exit);

        exit
    }

    /// Retrieve, measure, gate, encode and publish one frame
    pub fn capture_once(&self) -> Result<Iteration, CameraError> {
        let (grab, settings) = {
            let mut handle = self.camera.lock();
            if !handle.device.is_acquiring() {
                return Ok(Iteration::Stopped);
            }
            let grab = handle.device.retrieve_frame(self.config.retrieve_timeout())?;
            (grab, handle.settings)
        };

        let frame = match grab {
            Grab::Frame(frame) => frame,
            Grab::TimedOut => return Ok(Iteration::TimedOut),
        };

        let stats = frame.stats();
        self.status.record_frame(stats);

        let (frame, gated) = ThresholdGate::from_settings(&settings).apply(frame, stats.mean);
        if gated {
            self.status.record_gated();
            debug!(
                "Frame gated: mean {:.3} <= threshold {}",
                stats.mean, settings.threshold
            );
        }

        if self.frames.receiver_count() == 0 {
            return Ok(Iteration::Captured { gated });
        }

        let jpeg = match encode_jpeg(&frame, self.config.jpeg_quality) {
            Ok(jpeg) => jpeg,
            Err(e) => {
                self.status.record_encode_failure();
                error!("Failed to encode frame: {}", e);
                return Ok(Iteration::EncodeFailed);
            }
        };

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        // Send only fails when every receiver left since the check above
        let consumers = self
            .frames
            .send(EncodedFrame { sequence, jpeg })
            .unwrap_or(0);
        self.status.record_delivered();

        Ok(Iteration::Delivered { consumers, gated })
    }

    /// Register a new stream consumer
    pub fn subscribe(&self) -> StreamConsumer {
        StreamConsumer::new(
            self.frames.subscribe(),
            self.stopped.clone(),
            Arc::clone(&self.consumers),
        )
    }

    pub fn status(&self) -> FrameStatus {
        self.status.snapshot()
    }

    pub fn stats(&self) -> PipelineStats {
        self.status.stats()
    }

    pub fn is_streaming(&self) -> bool {
        self.status.snapshot().is_streaming
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.load(Ordering::SeqCst)
    }

    /// How the capture loop ended, once it has
    pub fn exit(&self) -> Option<LoopExit> {
        self.exit.lock().clone()
    }

    /// Cancelled once the capture loop has exited
    pub fn stopped(&self) -> CancellationToken {
        self.stopped.clone()
    }

    fn announce_exit(&self, exit: &LoopExit) {
        let event = match exit {
            LoopExit::Shutdown => {
                info!("Capture loop stopped for shutdown");
                return;
            }
            LoopExit::DeviceStopped => CamviewEvent::StreamingStopped {
                reason: "camera stopped acquiring".to_string(),
            },
            LoopExit::Failed(e) => CamviewEvent::SystemError {
                component: "pipeline".to_string(),
                error: e.to_string(),
            },
        };

        if let Err(e) = self.event_bus.publish(event) {
            debug!("Capture loop exit not broadcast: {}", e);
        }
    }
}
