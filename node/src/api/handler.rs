use super::{AppState, JsonBody};
use axum::{Json, extract::State};
use protocol::{
    AddUserRequest, AddUsersRequest, Envelope, HandlerResult, InboundUsersCountResponse,
    InboundUsersResponse, RemoveUserRequest, RemoveUsersRequest,
};
use serde_json::Value;
use tracing::{info, instrument};

// User provisioning is emulated: the only effect is learning which
// transport id belongs to which user.

#[instrument(skip(state))]
pub(super) async fn add_user(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<AddUserRequest>,
) -> Json<Envelope<HandlerResult>> {
    if let Some((uuid, username)) = request.mapping() {
        state.store.mapping().add_mapping(uuid, username);
        info!("Mapping learned from add-user: {} -> {}", uuid, username);
    }
    Json(Envelope::new(HandlerResult::ok()))
}

#[instrument(skip(state, request))]
pub(super) async fn add_users(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<AddUsersRequest>,
) -> Json<Envelope<HandlerResult>> {
    let mut learned = 0;
    for (uuid, user_id) in request.users.iter().filter_map(|user| user.mapping()) {
        state.store.mapping().add_mapping(uuid, user_id);
        learned += 1;
    }
    info!(
        "Mappings learned from add-users: {} of {}",
        learned,
        request.users.len()
    );
    Json(Envelope::new(HandlerResult::ok()))
}

#[instrument(skip(state))]
pub(super) async fn remove_user(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RemoveUserRequest>,
) -> Json<Envelope<HandlerResult>> {
    if let Some(uuid) = request.uuid() {
        state.store.mapping().remove_by_transport_id(uuid);
        info!("Mapping dropped by remove-user: {}", uuid);
    }
    Json(Envelope::new(HandlerResult::ok()))
}

#[instrument(skip(state, request))]
pub(super) async fn remove_users(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RemoveUsersRequest>,
) -> Json<Envelope<HandlerResult>> {
    let uuids = request
        .users
        .iter()
        .filter_map(|user| user.hash_uuid.as_deref())
        .filter(|uuid| !uuid.is_empty());
    for uuid in uuids {
        state.store.mapping().remove_by_transport_id(uuid);
    }
    info!("Mappings dropped by remove-users: {}", request.users.len());
    Json(Envelope::new(HandlerResult::ok()))
}

pub(super) async fn inbound_users(
    JsonBody(_request): JsonBody<Value>,
) -> Json<Envelope<InboundUsersResponse>> {
    Json(Envelope::new(InboundUsersResponse::default()))
}

pub(super) async fn inbound_users_count(
    State(state): State<AppState>,
    JsonBody(_request): JsonBody<Value>,
) -> Json<Envelope<InboundUsersCountResponse>> {
    let count = state.store.user_count();
    Json(Envelope::new(InboundUsersCountResponse { count }))
}
