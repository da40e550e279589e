use crate::error::ControlError;
use crate::settings::SettingsChange;
use axum::{
    extract::{Form, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::auth::{credentials_match, log_login, session_clear_cookie, session_set_cookie};
use super::pages::{control_page, login_page};
use super::server::ServerState;

pub const INVALID_CREDENTIALS: &str = "Invalid credentials, please try again.";

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

pub async fn login_page_handler() -> Html<String> {
    Html(login_page())
}

pub async fn login_form_handler(
    State(state): State<ServerState>,
    Form(form): Form<LoginForm>,
) -> Response {
    let ok = credentials_match(&state.auth, &form.username, &form.password);
    log_login(&form.username, ok);

    if !ok {
        return (StatusCode::OK, INVALID_CREDENTIALS).into_response();
    }

    let session = state.sessions.create();
    let mut response = Redirect::to("/").into_response();
    response
        .headers_mut()
        .insert(header::SET_COOKIE, session_set_cookie(&session));
    response
}

pub async fn logout_handler(State(state): State<ServerState>, headers: HeaderMap) -> Response {
    if let Some(session) = state.sessions.from_headers(&headers) {
        state.sessions.remove(&session);
        info!("Session {} logged out", session);
    }

    let mut response = Redirect::to("/login").into_response();
    response
        .headers_mut()
        .insert(header::SET_COOKIE, session_clear_cookie());
    response
}

pub async fn control_page_handler(State(state): State<ServerState>) -> Html<String> {
    let settings = state.controller.current();
    Html(control_page(&settings, &state.controller.limits()))
}

/// MJPEG feed for one consumer; ends when the client leaves or capture stops
pub async fn video_feed_handler(State(state): State<ServerState>) -> Response {
    let consumer = state.pipeline.subscribe();
    debug!("Serving MJPEG feed to consumer {}", consumer.id());

    (
        [
            (
                header::CONTENT_TYPE,
                "multipart/x-mixed-replace; boundary=frame",
            ),
            (header::CACHE_CONTROL, "no-cache, private"),
            (header::PRAGMA, "no-cache"),
        ],
        axum::body::Body::from_stream(consumer.into_stream()),
    )
        .into_response()
}

pub async fn camera_control_handler(
    State(state): State<ServerState>,
    Form(fields): Form<HashMap<String, String>>,
) -> Response {
    let change = parse_control_form(&fields);
    debug!("Settings change requested: {:?}", change);

    if let Err(e) = state.controller.validate(&change) {
        warn!("Rejected settings change: {}", e);
        return e.into_response();
    }

    state.controller.dispatch(change);
    StatusCode::NO_CONTENT.into_response()
}

pub async fn camera_status_handler(State(state): State<ServerState>) -> Json<serde_json::Value> {
    Json(state.pipeline.status().to_json())
}

pub async fn health_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = state.pipeline.stats();
    let streaming = state.pipeline.is_streaming();

    let health_info = serde_json::json!({
        "status": if streaming { "healthy" } else { "degraded" },
        "streaming": streaming,
        "consumers": state.pipeline.consumer_count(),
        "pipeline_stats": {
            "frames_captured": stats.frames_captured,
            "frames_gated": stats.frames_gated,
            "frames_delivered": stats.frames_delivered,
            "timeouts": stats.timeouts,
            "encode_failures": stats.encode_failures,
        },
        "server_info": {
            "sessions": state.sessions.len(),
            "subscribers": state.event_bus.subscriber_count(),
        }
    });

    (StatusCode::OK, Json(health_info))
}

/// Translate the control form into a settings change.
///
/// Numbers that fail to parse are treated as absent. `count_trigger` is a
/// checkbox, so anything other than `on` (including absence) disables it.
pub fn parse_control_form(fields: &HashMap<String, String>) -> SettingsChange {
    SettingsChange {
        gain: parse_field(fields, "gain"),
        exposure_ms: parse_field(fields, "exposure"),
        trigger_enabled: fields.get("triggered").and_then(|v| parse_flag(v)),
        threshold_gate_enabled: Some(fields.get("count_trigger").is_some_and(|v| v == "on")),
        threshold: fields
            .get("threshold")
            .and_then(|v| v.trim().parse::<i64>().ok()),
    }
}

fn parse_field(fields: &HashMap<String, String>, name: &str) -> Option<f64> {
    fields
        .get(name)
        .and_then(|v| v.trim().parse::<f64>().ok())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "1" | "yes" => Some(true),
        "false" | "off" | "0" | "no" | "" => Some(false),
        _ => None,
    }
}

impl IntoResponse for ControlError {
    fn into_response(self) -> Response {
        let status = match self {
            ControlError::OutOfRange { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
