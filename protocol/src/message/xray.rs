use super::stats::SystemStats;
use serde::{Deserialize, Serialize};

/// The part of a relay configuration the node reads traffic-class labels from.
/// Every other key of the pushed configuration is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct XrayConfig {
    #[serde(default)]
    pub inbounds: Vec<InboundDecl>,
    #[serde(default)]
    pub outbounds: Vec<OutboundDecl>,
}

impl XrayConfig {
    /// No inbounds and no outbounds, as sent by a bare `{}`.
    pub fn is_empty(&self) -> bool {
        self.inbounds.is_empty() && self.outbounds.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboundDecl {
    #[serde(default)]
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutboundDecl {
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XrayStartRequest {
    #[serde(default)]
    pub xray_config: Option<XrayConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XrayHealthResponse {
    pub is_alive: bool,
    pub xray_internal_status_cached: bool,
    pub xray_version: String,
    pub node_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XrayStatusResponse {
    pub is_running: bool,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XrayStopResponse {
    pub is_stopped: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInfo {
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XrayStartResponse {
    pub is_started: bool,
    pub xray_version: String,
    pub error: Option<String>,
    pub system_info: SystemStats,
    pub node: NodeInfo,
}
