mod body;
mod handler;
mod inspect;
mod stats;
mod worker;
mod xray;

use crate::auth::Authenticator;
use crate::config::NodeConfig;
use crate::error::{NodeError, Result};
use crate::stats::TrafficStore;
use axum::{
    Router,
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use body::JsonBody;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<NodeConfig>,
    pub store: Arc<TrafficStore>,
    pub control_gate: Arc<dyn Authenticator>,
    pub worker_gate: Arc<dyn Authenticator>,
}

pub fn router(state: AppState) -> Router {
    let control_plane = Router::new()
        .route("/node/xray/healthcheck", get(xray::healthcheck))
        .route("/node/xray/status", get(xray::status))
        .route("/node/xray/stop", get(xray::stop))
        .route("/node/xray/start", post(xray::start))
        .route("/node/stats/get-system-stats", get(stats::system_stats))
        .route("/node/stats/get-users-stats", post(stats::users_stats))
        .route(
            "/node/stats/get-user-online-status",
            post(stats::user_online_status),
        )
        .route("/node/stats/get-inbound-stats", post(stats::inbound_stats))
        .route("/node/stats/get-outbound-stats", post(stats::outbound_stats))
        .route(
            "/node/stats/get-all-inbounds-stats",
            post(stats::all_inbounds_stats),
        )
        .route(
            "/node/stats/get-all-outbounds-stats",
            post(stats::all_outbounds_stats),
        )
        .route("/node/stats/get-combined-stats", post(stats::combined_stats))
        .route("/node/handler/add-user", post(handler::add_user))
        .route("/node/handler/add-users", post(handler::add_users))
        .route("/node/handler/remove-user", post(handler::remove_user))
        .route("/node/handler/remove-users", post(handler::remove_users))
        .route(
            "/node/handler/get-inbound-users",
            post(handler::inbound_users),
        )
        .route(
            "/node/handler/get-inbound-users-count",
            post(handler::inbound_users_count),
        )
        .route("/stats", get(inspect::detailed_stats))
        .route("/mappings", get(inspect::mappings))
        .route_layer(middleware::from_fn_with_state(
            state.control_gate.clone(),
            require_auth,
        ));

    let worker = Router::new()
        .route("/worker/report", post(worker::report))
        .route("/worker/batch-report", post(worker::batch_report))
        .route("/worker/add-mapping", post(worker::add_mapping))
        .route("/worker/batch-add-mapping", post(worker::batch_add_mapping))
        .route("/worker/remove-mapping", post(worker::remove_mapping))
        .route(
            "/worker/batch-remove-mapping",
            post(worker::batch_remove_mapping),
        )
        .route_layer(middleware::from_fn_with_state(
            state.worker_gate.clone(),
            require_auth,
        ));

    Router::new()
        .route("/", get(inspect::health))
        .route("/health", get(inspect::health))
        .merge(control_plane)
        .merge(worker)
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn require_auth(
    State(gate): State<Arc<dyn Authenticator>>,
    request: Request,
    next: Next,
) -> Response {
    if gate.authorize(request.headers()) {
        next.run(request).await
    } else {
        warn!("Rejected unauthenticated request to {}", request.uri().path());
        NodeError::Unauthorized.into_response()
    }
}

async fn not_found() -> NodeError {
    NodeError::NotFound
}

pub struct ApiServer {
    state: AppState,
}

impl ApiServer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Serve until `shutdown` fires, then let in-flight requests finish.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let listen_addr = self.state.config.listen_addr.clone();
        let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
        info!("API server listening on {}", listen_addr);

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("API server stopped");
        Ok(())
    }
}
