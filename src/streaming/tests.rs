use super::server::StreamServerBuilder;
use super::*;
use crate::camera::mock::{mock_limits, MockCamera, MockProbe};
use crate::config::{AuthConfig, PipelineConfig, ServerConfig};
use crate::events::{CamviewEvent, EventBus};
use crate::pipeline::Pipeline;
use crate::settings::{shared_camera, CameraSettings, SettingsController};
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

struct TestServer {
    server: StreamServer,
    pipeline: Arc<Pipeline>,
    controller: SettingsController,
    event_bus: Arc<EventBus>,
    shutdown: CancellationToken,
}

fn create_test_server() -> TestServer {
    let probe = Arc::new(MockProbe::default());
    let camera = shared_camera(
        Box::new(MockCamera::new(probe).with_default_value(64)),
        CameraSettings::default(),
    );
    let event_bus = Arc::new(EventBus::new(16));
    let shutdown = CancellationToken::new();
    let pipeline = Pipeline::new(
        camera.clone(),
        PipelineConfig {
            pacing_interval_ms: 10,
            retrieve_timeout_ms: 1000,
            jpeg_quality: 80,
            consumer_buffer: 4,
        },
        Arc::clone(&event_bus),
        shutdown.clone(),
    );
    let controller = SettingsController::new(camera, mock_limits(), Arc::clone(&event_bus));

    let server = StreamServerBuilder::new()
        .config(ServerConfig {
            ip: "127.0.0.1".to_string(),
            port: 0,
        })
        .auth(AuthConfig {
            username: "operator".to_string(),
            password: "secret".to_string(),
        })
        .pipeline(Arc::clone(&pipeline))
        .controller(controller.clone())
        .event_bus(Arc::clone(&event_bus))
        .build()
        .unwrap();

    TestServer {
        server,
        pipeline,
        controller,
        event_bus,
        shutdown,
    }
}

fn form_request(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Log in and return the `name=value` cookie pair
async fn login(router: &Router) -> String {
    let response = router
        .clone()
        .oneshot(form_request(
            "/login",
            "username=operator&password=secret",
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/");

    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

#[tokio::test]
async fn test_stream_server_builder() {
    let test = create_test_server();

    assert_eq!(test.server.config.ip, "127.0.0.1");
    assert_eq!(test.server.address(), "127.0.0.1:0");
    assert!(test.server.sessions().is_empty());
}

#[tokio::test]
async fn test_builder_requires_pipeline() {
    let result = StreamServerBuilder::new()
        .config(ServerConfig {
            ip: "127.0.0.1".to_string(),
            port: 5000,
        })
        .build();

    assert!(result.is_err());
}

#[tokio::test]
async fn test_unauthenticated_requests_redirect_to_login() {
    let test = create_test_server();
    let router = test.server.router();

    for uri in ["/", "/video_feed", "/camera_status"] {
        let response = router.clone().oneshot(get_request(uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{}", uri);
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }

    let response = router
        .clone()
        .oneshot(form_request("/camera_control", "gain=1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(test.pipeline.consumer_count(), 0);
}

#[tokio::test]
async fn test_unknown_session_cookie_is_rejected() {
    let test = create_test_server();
    let cookie = format!("{}={}", SESSION_COOKIE, uuid::Uuid::new_v4());

    let response = test
        .server
        .router()
        .oneshot(get_request("/camera_status", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_login_page_is_public() {
    let test = create_test_server();
    let response = test
        .server
        .router()
        .oneshot(get_request("/login", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("action=\"/login\""));
}

#[tokio::test]
async fn test_invalid_credentials() {
    let test = create_test_server();
    let response = test
        .server
        .router()
        .oneshot(form_request(
            "/login",
            "username=operator&password=wrong",
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    assert_eq!(body_text(response).await, INVALID_CREDENTIALS);
    assert!(test.server.sessions().is_empty());
}

#[tokio::test]
async fn test_login_grants_access_to_control_page() {
    let test = create_test_server();
    let router = test.server.router();
    let cookie = login(&router).await;

    let response = router.oneshot(get_request("/", Some(&cookie))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let page = body_text(response).await;
    assert!(page.contains("src=\"/video_feed\""));
    assert!(page.contains("Gain (0 - 24)"));
    assert!(page.contains("value=\"20\""));
}

#[tokio::test]
async fn test_logout_ends_session() {
    let test = create_test_server();
    let router = test.server.router();
    let cookie = login(&router).await;
    assert_eq!(test.server.sessions().len(), 1);

    let response = router
        .clone()
        .oneshot(get_request("/logout", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/login");
    assert!(test.server.sessions().is_empty());

    let response = router
        .oneshot(get_request("/camera_status", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_status_not_available_when_not_streaming() {
    let test = create_test_server();
    let router = test.server.router();
    let cookie = login(&router).await;

    let response = router
        .oneshot(get_request("/camera_status", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["max_count"], "N/A");
    assert_eq!(body["mean_count"], "N/A");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_status_reports_intensity_while_streaming() {
    let test = create_test_server();
    let router = test.server.router();
    let cookie = login(&router).await;
    let handle = test.pipeline.start();

    timeout(Duration::from_secs(2), async {
        while test.pipeline.stats().frames_captured == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let response = router
        .oneshot(get_request("/camera_status", Some(&cookie)))
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["max_count"], 64);
    assert_eq!(body["mean_count"], 64.0);

    test.shutdown.cancel();
    handle.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_video_feed_streams_multipart_frames() {
    let test = create_test_server();
    let router = test.server.router();
    let cookie = login(&router).await;
    let handle = test.pipeline.start();

    let response = router
        .oneshot(get_request("/video_feed", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "multipart/x-mixed-replace; boundary=frame"
    );
    assert_eq!(test.pipeline.consumer_count(), 1);

    let mut body = response.into_body().into_data_stream();
    let chunk = timeout(Duration::from_secs(2), futures::StreamExt::next(&mut body))
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(chunk.starts_with(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n\xFF\xD8"));
    assert!(chunk.ends_with(b"\r\n"));

    drop(body);
    assert_eq!(test.pipeline.consumer_count(), 0);

    test.shutdown.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_camera_control_applies_change() {
    let test = create_test_server();
    let router = test.server.router();
    let cookie = login(&router).await;
    let mut events = test.event_bus.subscribe();

    let response = router
        .oneshot(form_request(
            "/camera_control",
            "gain=6.5&exposure=10&triggered=false&count_trigger=on&threshold=999",
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let event = timeout(Duration::from_secs(2), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, CamviewEvent::SettingsUpdated { .. }));

    let settings = test.controller.current();
    assert_eq!(settings.gain, 6.5);
    assert_eq!(settings.exposure_ms, 10.0);
    assert!(settings.threshold_gate_enabled);
    assert_eq!(settings.threshold, 255);
}

#[tokio::test]
async fn test_camera_control_rejects_out_of_range_gain() {
    let test = create_test_server();
    let router = test.server.router();
    let cookie = login(&router).await;

    let response = router
        .oneshot(form_request("/camera_control", "gain=100", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("gain"));
    assert_eq!(test.controller.current(), CameraSettings::default());
}

#[tokio::test]
async fn test_health_is_public() {
    let test = create_test_server();
    let response = test
        .server
        .router()
        .oneshot(get_request("/health", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["streaming"], false);
    assert_eq!(body["consumers"], 0);
    assert_eq!(body["pipeline_stats"]["frames_captured"], 0);
}

fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_control_form_unparseable_numbers_are_absent() {
    let change = parse_control_form(&fields(&[
        ("gain", "loud"),
        ("exposure", ""),
        ("threshold", "x"),
    ]));

    assert_eq!(change.gain, None);
    assert_eq!(change.exposure_ms, None);
    assert_eq!(change.threshold, None);
}

#[test]
fn test_control_form_checkbox_semantics() {
    let on = parse_control_form(&fields(&[("count_trigger", "on")]));
    let other = parse_control_form(&fields(&[("count_trigger", "yes")]));
    let absent = parse_control_form(&fields(&[]));

    assert_eq!(on.threshold_gate_enabled, Some(true));
    assert_eq!(other.threshold_gate_enabled, Some(false));
    assert_eq!(absent.threshold_gate_enabled, Some(false));
}

#[test]
fn test_control_form_trigger_flag() {
    let cases = [
        ("true", Some(true)),
        ("On", Some(true)),
        ("1", Some(true)),
        ("false", Some(false)),
        ("0", Some(false)),
        ("", Some(false)),
        ("maybe", None),
    ];

    for (value, expected) in cases {
        let change = parse_control_form(&fields(&[("triggered", value)]));
        assert_eq!(change.trigger_enabled, expected, "{:?}", value);
    }

    let absent = parse_control_form(&fields(&[]));
    assert_eq!(absent.trigger_enabled, None);
}

#[test]
fn test_control_form_threshold_requires_integer() {
    let fractional = parse_control_form(&fields(&[("threshold", "12.7")]));
    let whole = parse_control_form(&fields(&[("threshold", " 12 ")]));

    assert_eq!(fractional.threshold, None);
    assert_eq!(whole.threshold, Some(12));
}

#[test]
fn test_control_form_threshold_clamps_on_apply() {
    let low = parse_control_form(&fields(&[("threshold", "-5")]));
    let high = parse_control_form(&fields(&[("threshold", "999")]));

    assert_eq!(low.clamped_threshold(), Some(0));
    assert_eq!(high.clamped_threshold(), Some(255));
}

#[test]
fn test_credentials_are_compared_exactly() {
    let auth = AuthConfig {
        username: "operator".to_string(),
        password: "secret".to_string(),
    };

    assert!(credentials_match(&auth, "operator", "secret"));
    assert!(!credentials_match(&auth, "operator", "Secret"));
    assert!(!credentials_match(&auth, "Operator", "secret"));
}
