use super::{AppState, JsonBody};
use crate::error::Result;
use crate::stats::TrafficReport;
use axum::{Json, extract::State};
use protocol::{
    BatchMappingRequest, BatchRemoveMappingRequest, BatchReportRequest, MappingRequest,
    ProtocolError, RemoveMappingRequest, ReportIdentity, ReportRequest, SuccessResponse,
    ValidatedReport,
};
use tracing::{debug, info, instrument};

impl From<ValidatedReport> for TrafficReport {
    fn from(report: ValidatedReport) -> Self {
        let traffic = match report.identity {
            ReportIdentity::Transport(uuid) => {
                TrafficReport::from_transport(uuid, report.uplink, report.downlink)
            }
            ReportIdentity::User(user_id) => {
                TrafficReport::from_user(user_id, report.uplink, report.downlink)
            }
        };
        traffic.with_labels(report.inbound_tag, report.outbound_tag)
    }
}

fn required<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ProtocolError::MissingField(field).into())
}

#[instrument(skip(state))]
pub(super) async fn report(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<ReportRequest>,
) -> Result<Json<SuccessResponse>> {
    let report = request.validate()?;
    let (uplink, downlink) = (report.uplink, report.downlink);
    let user_id = state.store.report(report.into());
    info!("Report accepted for {}: ↑{} ↓{}", user_id, uplink, downlink);
    Ok(Json(SuccessResponse::ok()))
}

#[instrument(skip(state, request))]
pub(super) async fn batch_report(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<BatchReportRequest>,
) -> Json<SuccessResponse> {
    let mut processed = 0;
    for entry in &request.reports {
        match entry.validate() {
            Ok(report) => {
                state.store.report(report.into());
                processed += 1;
            }
            Err(e) => debug!("Skipping batch entry: {}", e),
        }
    }
    info!(
        "Batch report: {} of {} entries accepted",
        processed,
        request.reports.len()
    );
    Json(SuccessResponse::processed(processed))
}

#[instrument(skip(state))]
pub(super) async fn add_mapping(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<MappingRequest>,
) -> Result<Json<SuccessResponse>> {
    let uuid = required(&request.uuid, "uuid")?;
    let user_id = required(&request.user_id, "userId")?;
    state.store.mapping().add_mapping(uuid, user_id);
    info!("Mapping added: {} -> {}", uuid, user_id);
    Ok(Json(SuccessResponse::ok()))
}

#[instrument(skip(state, request))]
pub(super) async fn batch_add_mapping(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<BatchMappingRequest>,
) -> Json<SuccessResponse> {
    let mut processed = 0;
    for (uuid, user_id) in request.mappings.iter().filter_map(MappingRequest::pair) {
        state.store.mapping().add_mapping(uuid, user_id);
        processed += 1;
    }
    info!("Batch mapping: {} added", processed);
    Json(SuccessResponse::processed(processed))
}

#[instrument(skip(state))]
pub(super) async fn remove_mapping(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RemoveMappingRequest>,
) -> Result<Json<SuccessResponse>> {
    let uuid = required(&request.uuid, "uuid")?;
    if state.store.mapping().remove_by_transport_id(uuid) {
        info!("Mapping removed: {}", uuid);
    }
    Ok(Json(SuccessResponse::ok()))
}

#[instrument(skip(state, request))]
pub(super) async fn batch_remove_mapping(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<BatchRemoveMappingRequest>,
) -> Json<SuccessResponse> {
    let mapping = state.store.mapping();
    let processed = request
        .uuids
        .iter()
        .filter(|uuid| mapping.remove_by_transport_id(uuid))
        .count();
    info!("Batch unmapping: {} of {} removed", processed, request.uuids.len());
    Json(SuccessResponse::processed(processed))
}
