use super::*;
use crate::config::CameraConfig;
use crate::error::{CamviewError, CameraError};
use std::time::Duration;

fn create_test_camera_config() -> CameraConfig {
    CameraConfig {
        initial_exposure_ms: 1.0,
        initial_gain: 0.0,
        resolution: (32, 24),
        trigger_period_ms: 20,
    }
}

#[test]
fn test_exposure_offset() {
    assert!((device_exposure_us(20.0) - 20_019.0).abs() < 1e-6);
    assert!((device_exposure_us(0.0) - 19.0).abs() < 1e-6);
}

#[test]
fn test_builder_runs_startup_sequence() {
    let camera = CameraDeviceBuilder::new()
        .config(create_test_camera_config())
        .build()
        .unwrap();

    assert!(camera.device.is_open());
    assert!(camera.device.is_acquiring());
    assert!(!camera.device.trigger_mode().unwrap());
    assert!((camera.device.exposure_us().unwrap() - 1_019.0).abs() < 1e-6);
    assert_eq!(camera.settings.exposure_ms, 1.0);
    assert_eq!(camera.settings.threshold, 0);
    assert!(!camera.settings.threshold_gate_enabled);
    assert_eq!(camera.limits.gain_max, 24.0);
}

#[test]
fn test_builder_validation() {
    let result = CameraDeviceBuilder::new().build();

    match result {
        Err(CamviewError::System { message }) => {
            assert!(message.contains("Camera configuration must be specified"))
        }
        _ => panic!("Expected system error for missing configuration"),
    }
}

#[test]
fn test_builder_aborts_on_invalid_initial_gain() {
    let mut config = create_test_camera_config();
    config.initial_gain = 99.0;

    let result = CameraDeviceBuilder::new().config(config).build();
    assert!(matches!(
        result,
        Err(CamviewError::Camera(CameraError::Configuration { .. }))
    ));
}

#[test]
fn test_simulated_frame_dimensions() {
    let mut camera = CameraDeviceBuilder::new()
        .config(create_test_camera_config())
        .build()
        .unwrap();

    match camera.device.retrieve_frame(Duration::from_millis(500)).unwrap() {
        Grab::Frame(frame) => {
            assert_eq!((frame.width, frame.height), (32, 24));
            assert!(frame.validate_size());
        }
        Grab::TimedOut => panic!("continuous acquisition should not time out"),
    }
}

#[test]
fn test_simulated_brightness_follows_exposure() {
    let mut camera = SimulatedCamera::new(&create_test_camera_config());
    camera.open().unwrap();
    camera.start_acquisition().unwrap();

    camera.set_exposure_us(2_000.0).unwrap();
    let dark = match camera.retrieve_frame(Duration::from_secs(1)).unwrap() {
        Grab::Frame(frame) => frame.stats().mean,
        Grab::TimedOut => panic!("unexpected timeout"),
    };

    camera.set_exposure_us(40_000.0).unwrap();
    let bright = match camera.retrieve_frame(Duration::from_secs(1)).unwrap() {
        Grab::Frame(frame) => frame.stats().mean,
        Grab::TimedOut => panic!("unexpected timeout"),
    };

    assert!(bright > dark);
}

#[test]
fn test_simulated_trigger_mode_times_out() {
    let mut config = create_test_camera_config();
    config.trigger_period_ms = 1_000;
    let mut camera = SimulatedCamera::new(&config);
    camera.open().unwrap();
    camera.start_acquisition().unwrap();
    camera.set_trigger_mode(true).unwrap();

    let grab = camera.retrieve_frame(Duration::from_millis(10)).unwrap();
    assert!(matches!(grab, Grab::TimedOut));
}

#[test]
fn test_retrieve_requires_acquisition() {
    let mut camera = SimulatedCamera::new(&create_test_camera_config());
    assert_eq!(
        camera.retrieve_frame(Duration::from_millis(10)).unwrap_err(),
        CameraError::NotOpen
    );

    camera.open().unwrap();
    assert_eq!(
        camera.retrieve_frame(Duration::from_millis(10)).unwrap_err(),
        CameraError::NotAcquiring
    );
}
