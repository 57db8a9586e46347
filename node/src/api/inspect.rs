use super::AppState;
use axum::{Json, extract::State};
use chrono::{SecondsFormat, Utc};
use protocol::{DetailedStatsResponse, HealthResponse, UserDetail};
use std::collections::BTreeMap;

const SERVICE_NAME: &str = "remnawave-node-mock";

pub(super) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: SERVICE_NAME.to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

pub(super) async fn detailed_stats(State(state): State<AppState>) -> Json<DetailedStatsResponse> {
    let users = state
        .store
        .user_details()
        .into_iter()
        .map(|user| UserDetail {
            username: user.identifier,
            uplink: user.uplink,
            downlink: user.downlink,
            connections: user.connections,
            last_seen: user.last_seen.to_rfc3339_opts(SecondsFormat::Millis, true),
        })
        .collect();

    Json(DetailedStatsResponse {
        users,
        system: state.store.get_system_stats().into(),
        uuid_mappings: state.store.mapping().snapshot_all(),
    })
}

pub(super) async fn mappings(State(state): State<AppState>) -> Json<BTreeMap<String, String>> {
    Json(state.store.mapping().snapshot_all())
}
