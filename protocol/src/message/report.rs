use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single traffic report pushed by a worker.
///
/// `uuid` is a transport identifier and goes through the identity mapping;
/// `userId` names the logical user directly. Byte counts arrive loosely typed
/// and are checked by [`ReportRequest::validate`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub uplink: Option<Value>,
    #[serde(default)]
    pub downlink: Option<Value>,
    #[serde(default)]
    pub inbound_tag: Option<String>,
    #[serde(default)]
    pub outbound_tag: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReportRequest {
    #[serde(default)]
    pub reports: Vec<ReportRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportIdentity {
    Transport(String),
    User(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedReport {
    pub identity: ReportIdentity,
    pub uplink: u64,
    pub downlink: u64,
    pub inbound_tag: Option<String>,
    pub outbound_tag: Option<String>,
}

impl ReportRequest {
    pub fn validate(&self) -> Result<ValidatedReport> {
        let identity = match (non_empty(&self.uuid), non_empty(&self.user_id)) {
            (Some(uuid), _) => ReportIdentity::Transport(uuid),
            (None, Some(user_id)) => ReportIdentity::User(user_id),
            (None, None) => return Err(ProtocolError::MissingField("uuid")),
        };

        Ok(ValidatedReport {
            identity,
            uplink: byte_count("uplink", self.uplink.as_ref())?,
            downlink: byte_count("downlink", self.downlink.as_ref())?,
            inbound_tag: non_empty(&self.inbound_tag),
            outbound_tag: non_empty(&self.outbound_tag),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().filter(|v| !v.is_empty()).map(str::to_owned)
}

/// Accepts unsigned integers, integral floats and decimal strings. Absent or
/// `null` counts as zero.
fn byte_count(field: &'static str, value: Option<&Value>) -> Result<u64> {
    match value {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(number)) => {
            if let Some(n) = number.as_u64() {
                return Ok(n);
            }
            match number.as_f64() {
                Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Ok(f as u64),
                _ => Err(ProtocolError::InvalidByteCount(field)),
            }
        }
        Some(Value::String(text)) => text
            .trim()
            .parse::<u64>()
            .map_err(|_| ProtocolError::InvalidByteCount(field)),
        Some(_) => Err(ProtocolError::InvalidByteCount(field)),
    }
}
