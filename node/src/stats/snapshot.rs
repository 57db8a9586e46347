use super::counters::{ClassCounters, UserCounters};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// On-disk image of the whole traffic store.
///
/// Unknown keys are ignored and every key is optional so that files written
/// by older or newer nodes still load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub users: Vec<PersistedUser>,
    #[serde(default)]
    pub mappings: BTreeMap<String, String>,
    #[serde(default)]
    pub inbound_stats: BTreeMap<String, ClassCounters>,
    #[serde(default)]
    pub outbound_stats: BTreeMap<String, ClassCounters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedUser {
    pub username: String,
    #[serde(default)]
    pub uplink: u64,
    #[serde(default)]
    pub downlink: u64,
    #[serde(default)]
    pub connections: u64,
    /// Seconds since the UNIX epoch
    #[serde(default = "common::now_epoch_secs")]
    pub last_seen: f64,
}

impl From<&UserCounters> for PersistedUser {
    fn from(user: &UserCounters) -> Self {
        Self {
            username: user.identifier.clone(),
            uplink: user.uplink,
            downlink: user.downlink,
            connections: user.connections,
            last_seen: common::epoch_secs(user.last_seen),
        }
    }
}

impl PersistedUser {
    pub(crate) fn into_counters(self, fallback_seen: DateTime<Utc>) -> UserCounters {
        UserCounters {
            identifier: self.username,
            uplink: self.uplink,
            downlink: self.downlink,
            connections: self.connections,
            last_seen: common::from_epoch_secs(self.last_seen).unwrap_or(fallback_seen),
        }
    }
}
