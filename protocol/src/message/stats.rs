use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResetRequest {
    #[serde(default)]
    pub reset: bool,
}

/// `get-inbound-stats` / `get-outbound-stats`; an absent tag means the active one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagStatsRequest {
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub reset: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OnlineStatusRequest {
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnlineStatusResponse {
    pub online: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTraffic {
    pub username: String,
    pub uplink: u64,
    pub downlink: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsersStatsResponse {
    pub users: Vec<UserTraffic>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundTraffic {
    pub inbound: String,
    pub uplink: u64,
    pub downlink: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundTraffic {
    pub outbound: String,
    pub uplink: u64,
    pub downlink: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllInboundsResponse {
    pub inbounds: Vec<InboundTraffic>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllOutboundsResponse {
    pub outbounds: Vec<OutboundTraffic>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedStatsResponse {
    pub inbounds: Vec<InboundTraffic>,
    pub outbounds: Vec<OutboundTraffic>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStats {
    /// Seconds since the node started
    pub uptime: u64,
    pub total_users: usize,
    pub active_users: usize,
    pub total_uplink: u64,
    pub total_downlink: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetail {
    pub username: String,
    pub uplink: u64,
    pub downlink: u64,
    pub connections: u64,
    /// RFC 3339
    pub last_seen: String,
}

/// `GET /stats`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedStatsResponse {
    pub users: Vec<UserDetail>,
    pub system: SystemStats,
    pub uuid_mappings: BTreeMap<String, String>,
}
