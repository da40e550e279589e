use super::device::{CameraDevice, DeviceLimits, Grab};
use crate::error::CameraError;
use crate::frame::MonoFrame;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Scripted outcome of one `retrieve_frame` call
#[derive(Debug, Clone, Copy)]
pub enum MockStep {
    /// Uniform frame with this pixel value
    Frame(u8),
    Timeout,
    Fail,
}

/// Observations shared between a test and its mock camera
#[derive(Default)]
pub struct MockProbe {
    pub acquiring: AtomicBool,
    pub in_retrieve: AtomicBool,
    pub in_mutation: AtomicBool,
    pub overlaps: AtomicUsize,
    pub retrievals: AtomicUsize,
    pub fail_trigger: AtomicBool,
    pub exposures_us: Mutex<Vec<f64>>,
    pub gains: Mutex<Vec<f64>>,
    pub triggers: Mutex<Vec<bool>>,
}

/// Camera replaying a script, then producing uniform frames of `default_value`
pub struct MockCamera {
    probe: Arc<MockProbe>,
    script: VecDeque<MockStep>,
    default_value: u8,
    retrieve_delay: Duration,
    width: u32,
    height: u32,
}

impl MockCamera {
    pub fn new(probe: Arc<MockProbe>) -> Self {
        probe.acquiring.store(true, Ordering::SeqCst);
        Self {
            probe,
            script: VecDeque::new(),
            default_value: 100,
            retrieve_delay: Duration::from_millis(2),
            width: 8,
            height: 8,
        }
    }

    pub fn with_script(mut self, steps: impl IntoIterator<Item = MockStep>) -> Self {
        self.script.extend(steps);
        self
    }

    pub fn with_default_value(mut self, value: u8) -> Self {
        self.default_value = value;
        self
    }

    pub fn with_retrieve_delay(mut self, delay: Duration) -> Self {
        self.retrieve_delay = delay;
        self
    }

    fn mutate<F: FnOnce(&MockProbe)>(&self, record: F) {
        self.probe.in_mutation.store(true, Ordering::SeqCst);
        if self.probe.in_retrieve.load(Ordering::SeqCst) {
            self.probe.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        std::thread::sleep(Duration::from_millis(1));
        record(&self.probe);
        self.probe.in_mutation.store(false, Ordering::SeqCst);
    }
}

impl CameraDevice for MockCamera {
    fn open(&mut self) -> Result<(), CameraError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), CameraError> {
        self.probe.acquiring.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        true
    }

    fn start_acquisition(&mut self) -> Result<(), CameraError> {
        self.probe.acquiring.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop_acquisition(&mut self) -> Result<(), CameraError> {
        self.probe.acquiring.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_acquiring(&self) -> bool {
        self.probe.acquiring.load(Ordering::SeqCst)
    }

    fn limits(&self) -> Result<DeviceLimits, CameraError> {
        Ok(mock_limits())
    }

    fn set_exposure_us(&mut self, exposure_us: f64) -> Result<(), CameraError> {
        self.mutate(|probe| probe.exposures_us.lock().push(exposure_us));
        Ok(())
    }

    fn exposure_us(&self) -> Result<f64, CameraError> {
        Ok(self.probe.exposures_us.lock().last().copied().unwrap_or(20_019.0))
    }

    fn set_gain(&mut self, gain: f64) -> Result<(), CameraError> {
        self.mutate(|probe| probe.gains.lock().push(gain));
        Ok(())
    }

    fn gain(&self) -> Result<f64, CameraError> {
        Ok(self.probe.gains.lock().last().copied().unwrap_or(0.0))
    }

    fn set_trigger_mode(&mut self, enabled: bool) -> Result<(), CameraError> {
        if self.probe.fail_trigger.load(Ordering::SeqCst) {
            return Err(CameraError::Configuration {
                details: "trigger mode rejected".to_string(),
            });
        }
        self.mutate(|probe| probe.triggers.lock().push(enabled));
        Ok(())
    }

    fn trigger_mode(&self) -> Result<bool, CameraError> {
        Ok(self.probe.triggers.lock().last().copied().unwrap_or(false))
    }

    fn retrieve_frame(&mut self, _timeout: Duration) -> Result<Grab, CameraError> {
        if !self.probe.acquiring.load(Ordering::SeqCst) {
            return Err(CameraError::NotAcquiring);
        }

        self.probe.in_retrieve.store(true, Ordering::SeqCst);
        if self.probe.in_mutation.load(Ordering::SeqCst) {
            self.probe.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        std::thread::sleep(self.retrieve_delay);
        self.probe.retrievals.fetch_add(1, Ordering::SeqCst);

        let step = self
            .script
            .pop_front()
            .unwrap_or(MockStep::Frame(self.default_value));
        let result = match step {
            MockStep::Frame(value) => Ok(Grab::Frame(MonoFrame::filled(
                self.width,
                self.height,
                value,
            ))),
            MockStep::Timeout => Ok(Grab::TimedOut),
            MockStep::Fail => Err(CameraError::Retrieval {
                details: "scripted failure".to_string(),
            }),
        };

        self.probe.in_retrieve.store(false, Ordering::SeqCst);
        result
    }
}

pub fn mock_limits() -> DeviceLimits {
    DeviceLimits {
        exposure_min_us: 19.0,
        exposure_max_us: 1_000_000.0,
        gain_min: 0.0,
        gain_max: 24.0,
    }
}
