use super::server::ServerState;
use crate::config::AuthConfig;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use parking_lot::RwLock;
use std::collections::HashSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "camview_session";

/// In-memory set of logged-in sessions
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashSet<Uuid>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions.write().insert(id);
        id
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.sessions.read().contains(id)
    }

    pub fn remove(&self, id: &Uuid) -> bool {
        self.sessions.write().remove(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Session referenced by the request cookie, if it is still live
    pub fn from_headers(&self, headers: &HeaderMap) -> Option<Uuid> {
        session_cookie(headers).filter(|id| self.contains(id))
    }
}

/// Plain-text credential comparison
pub fn credentials_match(auth: &AuthConfig, username: &str, password: &str) -> bool {
    auth.username == username && auth.password == password
}

fn session_cookie(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value).ok())
}

pub fn session_set_cookie(id: &Uuid) -> HeaderValue {
    HeaderValue::from_str(&format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        SESSION_COOKIE, id
    ))
    .unwrap_or_else(|_| HeaderValue::from_static(""))
}

pub fn session_clear_cookie() -> HeaderValue {
    HeaderValue::from_static("camview_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Redirect requests without a live session to the login page
pub async fn require_session(
    State(state): State<ServerState>,
    request: Request,
    next: Next,
) -> Response {
    if state.sessions.from_headers(request.headers()).is_some() {
        next.run(request).await
    } else {
        debug!("Unauthenticated request to {}", request.uri().path());
        Redirect::to("/login").into_response()
    }
}

pub(crate) fn log_login(username: &str, ok: bool) {
    if ok {
        info!("User '{}' logged in", username);
    } else {
        warn!("Rejected login for user '{}'", username);
    }
}
