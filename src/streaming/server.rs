use crate::{
    config::{AuthConfig, ServerConfig},
    error::{CamviewError, Result, StreamError},
    events::EventBus,
    pipeline::Pipeline,
    settings::SettingsController,
};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::auth::{require_session, SessionStore};
use super::handlers::{
    camera_control_handler, camera_status_handler, control_page_handler, health_handler,
    login_form_handler, login_page_handler, logout_handler, video_feed_handler,
};
use super::notify::notifications_handler;

/// Shared state for the Axum server
#[derive(Clone)]
pub struct ServerState {
    pub(crate) pipeline: Arc<Pipeline>,
    pub(crate) controller: SettingsController,
    pub(crate) sessions: Arc<SessionStore>,
    pub(crate) auth: AuthConfig,
    pub(crate) event_bus: Arc<EventBus>,
}

/// HTTP front end: login, control page, MJPEG feed and notifications
pub struct StreamServer {
    pub(crate) config: ServerConfig,
    pub(crate) state: ServerState,
}

impl StreamServer {
    pub fn new(
        config: ServerConfig,
        auth: AuthConfig,
        pipeline: Arc<Pipeline>,
        controller: SettingsController,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let state = ServerState {
            pipeline,
            controller,
            sessions: Arc::new(SessionStore::new()),
            auth,
            event_bus,
        };

        Self { config, state }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.config.ip, self.config.port)
    }

    pub fn sessions(&self) -> Arc<SessionStore> {
        Arc::clone(&self.state.sessions)
    }

    /// Build the router with every route behind the session check except
    /// login, logout and health
    pub fn router(&self) -> Router {
        let protected = Router::new()
            .route("/", get(control_page_handler))
            .route("/video_feed", get(video_feed_handler))
            .route("/camera_control", post(camera_control_handler))
            .route("/camera_status", get(camera_status_handler))
            .route("/ws", get(notifications_handler))
            .route_layer(middleware::from_fn_with_state(
                self.state.clone(),
                require_session,
            ));

        Router::new()
            .route("/login", get(login_page_handler).post(login_form_handler))
            .route("/logout", get(logout_handler))
            .route("/health", get(health_handler))
            .merge(protected)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind the listening socket
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.address();

        info!("Starting live view server on {}", addr);

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| StreamError::BindFailed {
                address: addr.clone(),
                source: e,
            })?;

        info!("Live view server listening on {}", addr);
        Ok(listener)
    }

    /// Serve on an already bound listener until `shutdown` is cancelled
    pub async fn serve(&self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| StreamError::StartupFailed {
                details: format!("Server error: {}", e),
            })?;

        info!("Live view server stopped");
        Ok(())
    }

    /// Bind and serve until `shutdown` is cancelled
    pub async fn start(&self, shutdown: CancellationToken) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }
}

/// Stream server builder for configuration
pub struct StreamServerBuilder {
    config: Option<ServerConfig>,
    auth: Option<AuthConfig>,
    pipeline: Option<Arc<Pipeline>>,
    controller: Option<SettingsController>,
    event_bus: Option<Arc<EventBus>>,
}

impl StreamServerBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            auth: None,
            pipeline: None,
            controller: None,
            event_bus: None,
        }
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn auth(mut self, auth: AuthConfig) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn pipeline(mut self, pipeline: Arc<Pipeline>) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    pub fn controller(mut self, controller: SettingsController) -> Self {
        self.controller = Some(controller);
        self
    }

    pub fn event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Build the stream server
    pub fn build(self) -> Result<StreamServer> {
        let config = self.config.ok_or_else(|| missing("Server configuration"))?;
        let auth = self.auth.ok_or_else(|| missing("Auth configuration"))?;
        let pipeline = self.pipeline.ok_or_else(|| missing("Pipeline"))?;
        let controller = self.controller.ok_or_else(|| missing("Settings controller"))?;
        let event_bus = self.event_bus.ok_or_else(|| missing("Event bus"))?;

        Ok(StreamServer::new(
            config, auth, pipeline, controller, event_bus,
        ))
    }
}

impl Default for StreamServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn missing(what: &str) -> CamviewError {
    CamviewError::Stream(StreamError::StartupFailed {
        details: format!("{} is required", what),
    })
}
