use super::{AppState, JsonBody};
use crate::stats::{ClassFamily, ClassUsage, SystemSummary, UserUsage};
use axum::{Json, extract::State};
use protocol::{
    AllInboundsResponse, AllOutboundsResponse, CombinedStatsResponse, Envelope, InboundTraffic,
    OnlineStatusRequest, OnlineStatusResponse, OutboundTraffic, ResetRequest, SystemStats,
    TagStatsRequest, UserTraffic, UsersStatsResponse,
};
use tracing::instrument;

impl From<UserUsage> for UserTraffic {
    fn from(usage: UserUsage) -> Self {
        Self {
            username: usage.identifier,
            uplink: usage.uplink,
            downlink: usage.downlink,
        }
    }
}

impl From<ClassUsage> for InboundTraffic {
    fn from(usage: ClassUsage) -> Self {
        Self {
            inbound: usage.label,
            uplink: usage.uplink,
            downlink: usage.downlink,
        }
    }
}

impl From<ClassUsage> for OutboundTraffic {
    fn from(usage: ClassUsage) -> Self {
        Self {
            outbound: usage.label,
            uplink: usage.uplink,
            downlink: usage.downlink,
        }
    }
}

impl From<SystemSummary> for SystemStats {
    fn from(summary: SystemSummary) -> Self {
        Self {
            uptime: summary.uptime_secs,
            total_users: summary.total_users,
            active_users: summary.active_users,
            total_uplink: summary.total_uplink,
            total_downlink: summary.total_downlink,
        }
    }
}

fn convert<T, U: From<T>>(rows: Vec<T>) -> Vec<U> {
    rows.into_iter().map(U::from).collect()
}

pub(super) async fn system_stats(State(state): State<AppState>) -> Json<Envelope<SystemStats>> {
    Json(Envelope::new(state.store.get_system_stats().into()))
}

#[instrument(skip(state))]
pub(super) async fn users_stats(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<ResetRequest>,
) -> Json<Envelope<UsersStatsResponse>> {
    let users = convert(state.store.get_user_stats(request.reset));
    Json(Envelope::new(UsersStatsResponse { users }))
}

pub(super) async fn user_online_status(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<OnlineStatusRequest>,
) -> Json<Envelope<OnlineStatusResponse>> {
    let online = state.store.is_user_online(&request.username);
    Json(Envelope::new(OnlineStatusResponse { online }))
}

#[instrument(skip(state))]
pub(super) async fn inbound_stats(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<TagStatsRequest>,
) -> Json<Envelope<InboundTraffic>> {
    let row = state
        .store
        .get_class_stat(ClassFamily::Ingress, request.tag.as_deref(), request.reset);
    Json(Envelope::new(row.into()))
}

#[instrument(skip(state))]
pub(super) async fn outbound_stats(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<TagStatsRequest>,
) -> Json<Envelope<OutboundTraffic>> {
    let row = state
        .store
        .get_class_stat(ClassFamily::Egress, request.tag.as_deref(), request.reset);
    Json(Envelope::new(row.into()))
}

#[instrument(skip(state))]
pub(super) async fn all_inbounds_stats(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<ResetRequest>,
) -> Json<Envelope<AllInboundsResponse>> {
    let inbounds = convert(
        state
            .store
            .get_family_stats(ClassFamily::Ingress, request.reset),
    );
    Json(Envelope::new(AllInboundsResponse { inbounds }))
}

#[instrument(skip(state))]
pub(super) async fn all_outbounds_stats(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<ResetRequest>,
) -> Json<Envelope<AllOutboundsResponse>> {
    let outbounds = convert(
        state
            .store
            .get_family_stats(ClassFamily::Egress, request.reset),
    );
    Json(Envelope::new(AllOutboundsResponse { outbounds }))
}

#[instrument(skip(state))]
pub(super) async fn combined_stats(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<ResetRequest>,
) -> Json<Envelope<CombinedStatsResponse>> {
    let report = state.store.get_class_stats(request.reset);
    Json(Envelope::new(CombinedStatsResponse {
        inbounds: convert(report.ingress),
        outbounds: convert(report.egress),
    }))
}
