use super::{AppState, JsonBody};
use axum::{Json, extract::State};
use protocol::{
    Envelope, NodeInfo, XrayHealthResponse, XrayStartRequest, XrayStartResponse,
    XrayStatusResponse, XrayStopResponse,
};
use tracing::{info, instrument};

// No relay process is managed; these endpoints answer the way a healthy one would.

pub(super) async fn healthcheck(State(state): State<AppState>) -> Json<Envelope<XrayHealthResponse>> {
    Json(Envelope::new(XrayHealthResponse {
        is_alive: true,
        xray_internal_status_cached: true,
        xray_version: state.config.xray_version.clone(),
        node_version: state.config.node_version.clone(),
    }))
}

pub(super) async fn status(State(state): State<AppState>) -> Json<Envelope<XrayStatusResponse>> {
    Json(Envelope::new(XrayStatusResponse {
        is_running: true,
        version: state.config.xray_version.clone(),
    }))
}

pub(super) async fn stop() -> Json<Envelope<XrayStopResponse>> {
    info!("Stop requested, nothing to stop");
    Json(Envelope::new(XrayStopResponse { is_stopped: true }))
}

#[instrument(skip(state, request))]
pub(super) async fn start(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<XrayStartRequest>,
) -> Json<Envelope<XrayStartResponse>> {
    info!("Start requested with a configuration push");
    match &request.xray_config {
        Some(config) if !config.is_empty() => {
            state.store.set_active_labels_from_config(config);
        }
        _ => info!("No inbounds or outbounds pushed, keeping current labels"),
    }

    Json(Envelope::new(XrayStartResponse {
        is_started: true,
        xray_version: state.config.xray_version.clone(),
        error: None,
        system_info: state.store.get_system_stats().into(),
        node: NodeInfo {
            version: state.config.node_version.clone(),
        },
    }))
}
