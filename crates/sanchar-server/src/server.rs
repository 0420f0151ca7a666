//! `SancharServer`: Axum HTTP + `WebSocket` gateway.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use sanchar_core::ConnectionId;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::relay::{RelayEngine, spawn_sweeper};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::session::{SessionOptions, run_ws_session};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// The relay every session dispatches into.
    pub engine: Arc<RelayEngine>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Prometheus handle for `/metrics`, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    /// One permit per allowed `WebSocket`, held for the session's lifetime.
    pub slots: Arc<Semaphore>,
}

/// The relay server.
pub struct SancharServer {
    config: Arc<ServerConfig>,
    engine: Arc<RelayEngine>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: Option<PrometheusHandle>,
    slots: Arc<Semaphore>,
    start_time: Instant,
}

impl SancharServer {
    /// Create a server around a relay engine.
    pub fn new(config: ServerConfig, engine: Arc<RelayEngine>) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(config.max_connections)),
            config: Arc::new(config),
            engine,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            metrics: None,
            start_time: Instant::now(),
        }
    }

    /// Serve `/metrics` from this Prometheus handle.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            engine: Arc::clone(&self.engine),
            shutdown: Arc::clone(&self.shutdown),
            start_time: self.start_time,
            config: Arc::clone(&self.config),
            metrics: self.metrics.clone(),
            slots: Arc::clone(&self.slots),
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws", get(ws_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// The relay engine.
    pub fn engine(&self) -> &Arc<RelayEngine> {
        &self.engine
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind, then serve in the background alongside the pending-call sweeper.
    pub async fn listen(self) -> std::io::Result<RunningServer> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;

        let sweeper = spawn_sweeper(
            Arc::clone(self.engine.pending()),
            self.config.sweep_interval(),
            self.shutdown.token(),
        );

        let router = self.router();
        let token = self.shutdown.token();
        let server = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                warn!(error = %e, "http server exited with error");
            }
        });

        info!(addr = %local_addr, "sanchar server listening");
        Ok(RunningServer {
            addr: local_addr,
            shutdown: Arc::clone(&self.shutdown),
            engine: self.engine,
            handles: vec![server, sweeper],
        })
    }
}

/// A bound, serving instance.
pub struct RunningServer {
    addr: SocketAddr,
    shutdown: Arc<ShutdownCoordinator>,
    engine: Arc<RelayEngine>,
    handles: Vec<JoinHandle<()>>,
}

impl RunningServer {
    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// The relay engine behind this server.
    pub fn engine(&self) -> &Arc<RelayEngine> {
        &self.engine
    }

    /// Stop accepting, close sessions, and wait for background tasks.
    pub async fn shutdown(self, timeout: Option<Duration>) {
        self.shutdown.graceful_shutdown(self.handles, timeout).await;
        info!("sanchar server stopped");
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.engine.groups().connection_count(),
        state.engine.pending().len(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// GET /ws
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    if state.shutdown.is_shutting_down() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let Ok(slot) = Arc::clone(&state.slots).try_acquire_owned() else {
        warn!(max = state.config.max_connections, "connection limit reached");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };

    let options = SessionOptions {
        ping_interval: state.config.heartbeat_interval(),
        silence_timeout: state.config.heartbeat_timeout(),
        outbound_buffer: state.config.outbound_buffer,
    };
    let engine = Arc::clone(&state.engine);
    let token = state.shutdown.token();
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| async move {
            run_ws_session(socket, ConnectionId::new(), engine, options, token).await;
            drop(slot);
        })
}
