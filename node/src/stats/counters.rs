use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_INGRESS_LABEL: &str = "VLESS_WS";
pub const DEFAULT_EGRESS_LABEL: &str = "DIRECT";

/// Outbound protocol whose tag is preferred as the egress label.
pub const DIRECT_EGRESS_PROTOCOL: &str = "freedom";

/// Cumulative traffic of one logical user.
#[derive(Debug, Clone, PartialEq)]
pub struct UserCounters {
    pub identifier: String,
    pub uplink: u64,
    pub downlink: u64,
    pub connections: u64,
    pub last_seen: DateTime<Utc>,
}

impl UserCounters {
    pub fn new(identifier: String, now: DateTime<Utc>) -> Self {
        Self {
            identifier,
            uplink: 0,
            downlink: 0,
            connections: 0,
            last_seen: now,
        }
    }

    pub(crate) fn record(&mut self, uplink: u64, downlink: u64, now: DateTime<Utc>) {
        self.uplink = self.uplink.saturating_add(uplink);
        self.downlink = self.downlink.saturating_add(downlink);
        self.connections = self.connections.saturating_add(1);
        self.last_seen = now;
    }

    pub fn has_traffic(&self) -> bool {
        self.uplink > 0 || self.downlink > 0
    }

    /// Zero the byte counters. Connection count and last activity survive.
    pub(crate) fn reset_traffic(&mut self) {
        self.uplink = 0;
        self.downlink = 0;
    }

    pub fn is_active(&self, now: DateTime<Utc>, window: TimeDelta) -> bool {
        now.signed_duration_since(self.last_seen) < window
    }
}

/// Cumulative traffic of one traffic-class label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounters {
    #[serde(default)]
    pub uplink: u64,
    #[serde(default)]
    pub downlink: u64,
}

impl ClassCounters {
    pub(crate) fn record(&mut self, uplink: u64, downlink: u64) {
        self.uplink = self.uplink.saturating_add(uplink);
        self.downlink = self.downlink.saturating_add(downlink);
    }

    pub fn has_traffic(&self) -> bool {
        self.uplink > 0 || self.downlink > 0
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassFamily {
    Ingress,
    Egress,
}

/// Labels applied to reports that do not name their traffic classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveLabels {
    pub ingress: String,
    pub egress: String,
}

impl ActiveLabels {
    pub fn label(&self, family: ClassFamily) -> &str {
        match family {
            ClassFamily::Ingress => &self.ingress,
            ClassFamily::Egress => &self.egress,
        }
    }
}

impl Default for ActiveLabels {
    fn default() -> Self {
        Self {
            ingress: DEFAULT_INGRESS_LABEL.to_string(),
            egress: DEFAULT_EGRESS_LABEL.to_string(),
        }
    }
}
