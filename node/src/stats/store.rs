use super::counters::{
    ActiveLabels, ClassCounters, ClassFamily, DEFAULT_EGRESS_LABEL, DEFAULT_INGRESS_LABEL,
    DIRECT_EGRESS_PROTOCOL, UserCounters,
};
use super::identity::IdentityMapping;
use super::snapshot::{PersistedUser, Snapshot};
use chrono::{TimeDelta, Utc};
use parking_lot::Mutex;
use protocol::XrayConfig;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Users seen within this window count as online.
pub const DEFAULT_ONLINE_WINDOW: Duration = Duration::from_secs(300);

/// One traffic report as handed to [`TrafficStore::report`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafficReport {
    pub identifier: String,
    pub uplink: u64,
    pub downlink: u64,
    /// Resolve `identifier` through the identity mapping first
    pub is_transport_id: bool,
    pub ingress_label: Option<String>,
    pub egress_label: Option<String>,
}

impl TrafficReport {
    pub fn from_transport(transport_id: impl Into<String>, uplink: u64, downlink: u64) -> Self {
        Self {
            identifier: transport_id.into(),
            uplink,
            downlink,
            is_transport_id: true,
            ingress_label: None,
            egress_label: None,
        }
    }

    pub fn from_user(user_id: impl Into<String>, uplink: u64, downlink: u64) -> Self {
        Self {
            is_transport_id: false,
            ..Self::from_transport(user_id, uplink, downlink)
        }
    }

    pub fn with_labels(mut self, ingress: Option<String>, egress: Option<String>) -> Self {
        self.ingress_label = ingress;
        self.egress_label = egress;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserUsage {
    pub identifier: String,
    pub uplink: u64,
    pub downlink: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassUsage {
    pub label: String,
    pub uplink: u64,
    pub downlink: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassUsageReport {
    pub ingress: Vec<ClassUsage>,
    pub egress: Vec<ClassUsage>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemSummary {
    pub uptime_secs: u64,
    pub total_users: usize,
    pub active_users: usize,
    pub total_uplink: u64,
    pub total_downlink: u64,
}

/// Revisions of the counters and the mapping covered by a save.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveMark {
    counters: u64,
    mappings: u64,
}

/// The node's traffic accounting.
///
/// All counters live behind one mutex and every operation, including the
/// reset half of a reset-on-read query, runs inside a single critical
/// section. The identity mapping keeps its own lock: a transport-id report
/// resolves the identity first and then takes the counter lock, so a racing
/// mapping change yields either the old or the new user, never a mix.
///
/// Lock order is counters, then mapping.
pub struct TrafficStore {
    state: Mutex<StoreState>,
    mapping: IdentityMapping,
    started_at: Instant,
    online_window: TimeDelta,
}

#[derive(Default)]
struct StoreState {
    users: BTreeMap<String, UserCounters>,
    ingress: BTreeMap<String, ClassCounters>,
    egress: BTreeMap<String, ClassCounters>,
    labels: ActiveLabels,
    revision: u64,
    saved: SaveMark,
}

impl StoreState {
    fn family(&mut self, family: ClassFamily) -> &mut BTreeMap<String, ClassCounters> {
        match family {
            ClassFamily::Ingress => &mut self.ingress,
            ClassFamily::Egress => &mut self.egress,
        }
    }

    fn class_rows(&mut self, family: ClassFamily, reset: bool) -> Vec<ClassUsage> {
        let counters = self.family(family);
        let rows: Vec<ClassUsage> = counters
            .iter()
            .filter(|(_, class)| class.has_traffic())
            .map(|(label, class)| ClassUsage {
                label: label.clone(),
                uplink: class.uplink,
                downlink: class.downlink,
            })
            .collect();

        if reset && !rows.is_empty() {
            counters.values_mut().for_each(ClassCounters::reset);
            self.touch();
        }
        rows
    }

    fn touch(&mut self) {
        self.revision += 1;
    }
}

fn pick_label(explicit: Option<String>, active: &str) -> String {
    explicit
        .filter(|label| !label.is_empty())
        .unwrap_or_else(|| active.to_string())
}

fn tag_of(tag: &Option<String>) -> Option<&str> {
    tag.as_deref().filter(|tag| !tag.is_empty())
}

/// Traffic-class labels declared by a relay configuration.
///
/// Ingress is the first inbound's tag. Egress is the tag of the first
/// `freedom` outbound, else the first outbound's tag. Missing pieces fall
/// back to the defaults.
pub fn derive_labels(config: &XrayConfig) -> ActiveLabels {
    let ingress = config
        .inbounds
        .first()
        .and_then(|inbound| tag_of(&inbound.tag))
        .unwrap_or(DEFAULT_INGRESS_LABEL);

    let egress = config
        .outbounds
        .iter()
        .filter(|outbound| outbound.protocol.as_deref() == Some(DIRECT_EGRESS_PROTOCOL))
        .find_map(|outbound| tag_of(&outbound.tag))
        .or_else(|| {
            config
                .outbounds
                .first()
                .and_then(|outbound| tag_of(&outbound.tag))
        })
        .unwrap_or(DEFAULT_EGRESS_LABEL);

    ActiveLabels {
        ingress: ingress.to_string(),
        egress: egress.to_string(),
    }
}

impl TrafficStore {
    pub fn new(online_window: Duration) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            mapping: IdentityMapping::new(),
            started_at: Instant::now(),
            online_window: TimeDelta::from_std(online_window).unwrap_or(TimeDelta::MAX),
        }
    }

    pub fn mapping(&self) -> &IdentityMapping {
        &self.mapping
    }

    /// Account one report and return the user id it was booked to.
    pub fn report(&self, report: TrafficReport) -> String {
        let TrafficReport {
            identifier,
            uplink,
            downlink,
            is_transport_id,
            ingress_label,
            egress_label,
        } = report;

        let user_id = if is_transport_id {
            self.mapping.resolve_user_id(&identifier)
        } else {
            identifier
        };
        let now = Utc::now();

        let mut guard = self.state.lock();
        let state = &mut *guard;

        let ingress = pick_label(ingress_label, &state.labels.ingress);
        let egress = pick_label(egress_label, &state.labels.egress);

        let user = state
            .users
            .entry(user_id.clone())
            .or_insert_with(|| UserCounters::new(user_id.clone(), now));
        user.record(uplink, downlink, now);
        let (total_uplink, total_downlink) = (user.uplink, user.downlink);

        state.ingress.entry(ingress).or_default().record(uplink, downlink);
        state.egress.entry(egress).or_default().record(uplink, downlink);
        state.touch();
        drop(guard);

        debug!(
            "Traffic report: {} ↑{} ↓{} (total ↑{} ↓{})",
            user_id, uplink, downlink, total_uplink, total_downlink
        );
        user_id
    }

    /// Users with traffic, ordered by id. With `reset`, every user's byte
    /// counters are zeroed in the same critical section.
    pub fn get_user_stats(&self, reset: bool) -> Vec<UserUsage> {
        let mut state = self.state.lock();
        let rows: Vec<UserUsage> = state
            .users
            .values()
            .filter(|user| user.has_traffic())
            .map(|user| UserUsage {
                identifier: user.identifier.clone(),
                uplink: user.uplink,
                downlink: user.downlink,
            })
            .collect();

        if reset && !rows.is_empty() {
            state.users.values_mut().for_each(UserCounters::reset_traffic);
            state.touch();
            info!("User traffic reset, returned {} rows", rows.len());
        }
        rows
    }

    /// Both class families; `reset` drains both and leaves users alone.
    pub fn get_class_stats(&self, reset: bool) -> ClassUsageReport {
        let mut state = self.state.lock();
        let report = ClassUsageReport {
            ingress: state.class_rows(ClassFamily::Ingress, reset),
            egress: state.class_rows(ClassFamily::Egress, reset),
        };
        if reset {
            info!(
                "Class traffic reset, returned {} ingress and {} egress rows",
                report.ingress.len(),
                report.egress.len()
            );
        }
        report
    }

    /// One class family; `reset` drains only that family.
    pub fn get_family_stats(&self, family: ClassFamily, reset: bool) -> Vec<ClassUsage> {
        self.state.lock().class_rows(family, reset)
    }

    /// A single class row, zero when the label has never been reported.
    /// `None` selects the family's active label.
    pub fn get_class_stat(&self, family: ClassFamily, label: Option<&str>, reset: bool) -> ClassUsage {
        let mut state = self.state.lock();
        let label = pick_label(label.map(str::to_owned), state.labels.label(family));
        let current = state.family(family).get(&label).copied().unwrap_or_default();

        if reset && current.has_traffic() {
            if let Some(counters) = state.family(family).get_mut(&label) {
                counters.reset();
            }
            state.touch();
        }

        ClassUsage {
            label,
            uplink: current.uplink,
            downlink: current.downlink,
        }
    }

    pub fn set_active_labels_from_config(&self, config: &XrayConfig) -> ActiveLabels {
        let labels = derive_labels(config);
        self.state.lock().labels = labels.clone();
        info!(
            "Active labels set from relay config: ingress={}, egress={}",
            labels.ingress, labels.egress
        );
        labels
    }

    pub fn active_labels(&self) -> ActiveLabels {
        self.state.lock().labels.clone()
    }

    pub fn get_system_stats(&self) -> SystemSummary {
        let now = Utc::now();
        let state = self.state.lock();
        let mut summary = SystemSummary {
            uptime_secs: self.started_at.elapsed().as_secs(),
            total_users: state.users.len(),
            active_users: 0,
            total_uplink: 0,
            total_downlink: 0,
        };
        for user in state.users.values() {
            summary.total_uplink = summary.total_uplink.saturating_add(user.uplink);
            summary.total_downlink = summary.total_downlink.saturating_add(user.downlink);
            if user.is_active(now, self.online_window) {
                summary.active_users += 1;
            }
        }
        summary
    }

    pub fn is_user_online(&self, user_id: &str) -> bool {
        let now = Utc::now();
        self.state
            .lock()
            .users
            .get(user_id)
            .is_some_and(|user| user.is_active(now, self.online_window))
    }

    /// Every user row, including idle ones.
    pub fn user_details(&self) -> Vec<UserCounters> {
        self.state.lock().users.values().cloned().collect()
    }

    pub fn user_count(&self) -> usize {
        self.state.lock().users.len()
    }

    /// Consistent image of counters and mapping, plus the mark to hand back
    /// to [`TrafficStore::mark_saved`] once the image is on disk.
    pub(crate) fn capture(&self) -> (Snapshot, SaveMark) {
        let state = self.state.lock();
        let (mapping_revision, mappings) = self.mapping.versioned_snapshot();
        let snapshot = Snapshot {
            users: state.users.values().map(PersistedUser::from).collect(),
            mappings,
            inbound_stats: state.ingress.clone(),
            outbound_stats: state.egress.clone(),
            saved_at: Some(Utc::now().to_rfc3339()),
        };
        let mark = SaveMark {
            counters: state.revision,
            mappings: mapping_revision,
        };
        (snapshot, mark)
    }

    /// Replace the whole state with a persisted image. The result counts as saved.
    pub(crate) fn restore(&self, snapshot: Snapshot) {
        let now = Utc::now();
        let mut state = self.state.lock();
        self.mapping.replace_all(snapshot.mappings);

        state.users = snapshot
            .users
            .into_iter()
            .map(|user| {
                let counters = user.into_counters(now);
                (counters.identifier.clone(), counters)
            })
            .collect();
        state.ingress = snapshot.inbound_stats;
        state.egress = snapshot.outbound_stats;
        state.touch();
        state.saved = SaveMark {
            counters: state.revision,
            mappings: self.mapping.revision(),
        };
    }

    pub(crate) fn mark_saved(&self, mark: SaveMark) {
        let mut state = self.state.lock();
        state.saved.counters = state.saved.counters.max(mark.counters);
        state.saved.mappings = state.saved.mappings.max(mark.mappings);
    }

    /// Whether anything changed since the last successful save.
    pub fn is_dirty(&self) -> bool {
        let state = self.state.lock();
        state.revision != state.saved.counters || self.mapping.revision() != state.saved.mappings
    }
}

impl Default for TrafficStore {
    fn default() -> Self {
        Self::new(DEFAULT_ONLINE_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{InboundDecl, OutboundDecl};
    use std::sync::Arc;

    fn usage(identifier: &str, uplink: u64, downlink: u64) -> UserUsage {
        UserUsage {
            identifier: identifier.to_string(),
            uplink,
            downlink,
        }
    }

    fn outbound(tag: Option<&str>, protocol: &str) -> OutboundDecl {
        OutboundDecl {
            tag: tag.map(str::to_owned),
            protocol: Some(protocol.to_string()),
        }
    }

    #[test]
    fn repeated_reports_accumulate_and_reset_drains() {
        let store = TrafficStore::default();
        store.report(TrafficReport::from_transport("abc", 1024, 2048));
        store.report(TrafficReport::from_transport("abc", 1024, 2048));

        assert_eq!(store.get_user_stats(false), vec![usage("abc", 2048, 4096)]);
        assert_eq!(store.get_user_stats(true), vec![usage("abc", 2048, 4096)]);
        assert!(store.get_user_stats(false).is_empty());
    }

    #[test]
    fn reset_keeps_connections_and_presence() {
        let store = TrafficStore::default();
        store.report(TrafficReport::from_user("u", 1, 1));
        store.get_user_stats(true);

        let details = store.user_details();
        assert_eq!(details[0].connections, 1);
        assert!(store.is_user_online("u"));
        assert_eq!(store.get_system_stats().total_users, 1);
    }

    #[test]
    fn transport_reports_are_booked_to_the_mapped_user() {
        let store = TrafficStore::default();
        store.mapping().add_mapping("VLESS-UUID", "user-1");

        let booked = store.report(TrafficReport::from_transport("vless-uuid", 10, 20));
        assert_eq!(booked, "user-1");

        let unmapped = store.report(TrafficReport::from_transport("OTHER", 1, 1));
        assert_eq!(unmapped, "other");

        // user ids are taken verbatim
        let direct = store.report(TrafficReport::from_user("VLESS-UUID", 1, 1));
        assert_eq!(direct, "VLESS-UUID");

        let ids: Vec<_> = store
            .get_user_stats(false)
            .into_iter()
            .map(|row| row.identifier)
            .collect();
        assert_eq!(ids, vec!["VLESS-UUID", "other", "user-1"]);
    }

    #[test]
    fn reports_feed_both_class_families_with_the_same_bytes() {
        let store = TrafficStore::default();
        store.report(TrafficReport::from_user("u", 100, 200));
        store.report(
            TrafficReport::from_user("u", 1, 2).with_labels(Some("IN2".into()), Some("".into())),
        );

        let classes = store.get_class_stats(false);
        assert_eq!(
            classes.ingress,
            vec![
                ClassUsage {
                    label: "IN2".into(),
                    uplink: 1,
                    downlink: 2
                },
                ClassUsage {
                    label: DEFAULT_INGRESS_LABEL.into(),
                    uplink: 100,
                    downlink: 200
                },
            ]
        );
        assert_eq!(
            classes.egress,
            vec![ClassUsage {
                label: DEFAULT_EGRESS_LABEL.into(),
                uplink: 101,
                downlink: 202
            }]
        );
    }

    #[test]
    fn class_and_user_resets_are_independent() {
        let store = TrafficStore::default();
        store.report(TrafficReport::from_user("u", 5, 5));

        store.get_class_stats(true);
        assert_eq!(store.get_user_stats(false), vec![usage("u", 5, 5)]);
        assert_eq!(store.get_class_stats(false), ClassUsageReport::default());

        store.report(TrafficReport::from_user("u", 1, 1));
        store.get_user_stats(true);
        let classes = store.get_class_stats(false);
        assert_eq!(classes.ingress.len(), 1);
        assert_eq!(classes.ingress[0].uplink, 1);
    }

    #[test]
    fn family_reset_leaves_the_other_family() {
        let store = TrafficStore::default();
        store.report(TrafficReport::from_user("u", 3, 4));

        assert_eq!(store.get_family_stats(ClassFamily::Ingress, true).len(), 1);
        assert!(store.get_family_stats(ClassFamily::Ingress, false).is_empty());
        assert_eq!(store.get_family_stats(ClassFamily::Egress, false).len(), 1);
    }

    #[test]
    fn single_class_stat_defaults_to_active_label() {
        let store = TrafficStore::default();
        store.report(TrafficReport::from_user("u", 3, 4));
        store.report(TrafficReport::from_user("u", 1, 1).with_labels(Some("OTHER".into()), None));

        let row = store.get_class_stat(ClassFamily::Ingress, None, true);
        assert_eq!((row.label.as_str(), row.uplink, row.downlink), (DEFAULT_INGRESS_LABEL, 3, 4));

        // only that row was reset
        let rest = store.get_family_stats(ClassFamily::Ingress, false);
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].label, "OTHER");

        let unknown = store.get_class_stat(ClassFamily::Egress, Some("nope"), false);
        assert_eq!((unknown.uplink, unknown.downlink), (0, 0));
    }

    #[test]
    fn labels_prefer_the_freedom_outbound() {
        let store = TrafficStore::default();
        let config = XrayConfig {
            inbounds: vec![InboundDecl {
                tag: Some("IN1".into()),
            }],
            outbounds: vec![outbound(Some("O1"), "other"), outbound(Some("O2"), "freedom")],
        };

        let labels = store.set_active_labels_from_config(&config);
        assert_eq!(labels.ingress, "IN1");
        assert_eq!(labels.egress, "O2");
        assert_eq!(store.active_labels(), labels);

        store.report(TrafficReport::from_user("u", 1, 1));
        let classes = store.get_class_stats(false);
        assert_eq!(classes.ingress[0].label, "IN1");
        assert_eq!(classes.egress[0].label, "O2");
    }

    #[test]
    fn labels_fall_back_to_first_outbound_then_defaults() {
        let first_outbound = XrayConfig {
            inbounds: vec![InboundDecl { tag: None }],
            outbounds: vec![outbound(Some("BLOCK"), "blackhole"), outbound(None, "freedom")],
        };
        let labels = derive_labels(&first_outbound);
        assert_eq!(labels.ingress, DEFAULT_INGRESS_LABEL);
        assert_eq!(labels.egress, "BLOCK");

        let empty = derive_labels(&XrayConfig::default());
        assert_eq!(empty, ActiveLabels::default());
    }

    #[test]
    fn system_stats_sum_live_totals() {
        let store = TrafficStore::default();
        store.report(TrafficReport::from_user("a", 10, 1));
        store.report(TrafficReport::from_user("b", 5, 2));

        let summary = store.get_system_stats();
        assert_eq!(summary.total_users, 2);
        assert_eq!(summary.active_users, 2);
        assert_eq!(summary.total_uplink, 15);
        assert_eq!(summary.total_downlink, 3);
    }

    #[test]
    fn stale_users_are_offline() {
        let store = TrafficStore::default();
        let long_ago = common::now_epoch_secs() - 3_600.0;
        store.restore(Snapshot {
            users: vec![PersistedUser {
                username: "idle".into(),
                uplink: 1,
                downlink: 1,
                connections: 1,
                last_seen: long_ago,
            }],
            ..Snapshot::default()
        });

        assert!(!store.is_user_online("idle"));
        assert!(!store.is_user_online("never-seen"));
        assert_eq!(store.get_system_stats().active_users, 0);

        store.report(TrafficReport::from_user("idle", 0, 0));
        assert!(store.is_user_online("idle"));
    }

    #[test]
    fn concurrent_reports_lose_nothing() {
        let store = Arc::new(TrafficStore::default());
        store.mapping().add_mapping("T", "user");

        std::thread::scope(|scope| {
            for worker in 0..8 {
                let store = store.clone();
                scope.spawn(move || {
                    for _ in 0..1_000 {
                        let report = if worker % 2 == 0 {
                            TrafficReport::from_transport("t", 1, 2)
                        } else {
                            TrafficReport::from_user("user", 1, 2)
                        };
                        store.report(report);
                    }
                });
            }
        });

        assert_eq!(store.get_user_stats(false), vec![usage("user", 8_000, 16_000)]);
        assert_eq!(store.user_details()[0].connections, 8_000);
    }

    #[test]
    fn draining_reads_race_reports_without_loss() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        const REPORTERS: usize = 4;
        const REPORTS_EACH: u64 = 2_000;

        fn user_totals(rows: &[UserUsage]) -> (u64, u64) {
            rows.iter()
                .fold((0, 0), |(up, down), row| (up + row.uplink, down + row.downlink))
        }

        fn class_totals(rows: &[ClassUsage]) -> (u64, u64) {
            rows.iter()
                .fold((0, 0), |(up, down), row| (up + row.uplink, down + row.downlink))
        }

        let store = TrafficStore::default();
        let running = AtomicUsize::new(REPORTERS);

        let (mut users, mut ingress, mut egress) = ((0, 0), (0, 0), (0, 0));
        std::thread::scope(|scope| {
            for worker in 0..REPORTERS {
                let (store, running) = (&store, &running);
                scope.spawn(move || {
                    for _ in 0..REPORTS_EACH {
                        store.report(TrafficReport::from_user(format!("u{}", worker % 2), 3, 5));
                    }
                    running.fetch_sub(1, Ordering::SeqCst);
                });
            }

            let mut drain = || {
                let (up, down) = user_totals(&store.get_user_stats(true));
                users = (users.0 + up, users.1 + down);
                let classes = store.get_class_stats(true);
                let (up, down) = class_totals(&classes.ingress);
                ingress = (ingress.0 + up, ingress.1 + down);
                let (up, down) = class_totals(&classes.egress);
                egress = (egress.0 + up, egress.1 + down);
            };
            while running.load(Ordering::SeqCst) > 0 {
                drain();
            }
        });

        let (up, down) = user_totals(&store.get_user_stats(false));
        users = (users.0 + up, users.1 + down);
        let classes = store.get_class_stats(false);
        let (up, down) = class_totals(&classes.ingress);
        ingress = (ingress.0 + up, ingress.1 + down);
        let (up, down) = class_totals(&classes.egress);
        egress = (egress.0 + up, egress.1 + down);

        let total = REPORTERS as u64 * REPORTS_EACH;
        assert_eq!(users, (3 * total, 5 * total));
        assert_eq!(ingress, (3 * total, 5 * total));
        assert_eq!(egress, (3 * total, 5 * total));
    }

    #[test]
    fn dirty_tracks_counters_and_mapping() {
        let store = TrafficStore::default();
        assert!(!store.is_dirty());

        store.report(TrafficReport::from_user("u", 1, 1));
        assert!(store.is_dirty());

        let (_, mark) = store.capture();
        store.mark_saved(mark);
        assert!(!store.is_dirty());

        store.mapping().add_mapping("t", "u");
        assert!(store.is_dirty());
        let (_, mark) = store.capture();
        store.mark_saved(mark);

        // a drain changes the counters too
        store.get_user_stats(true);
        assert!(store.is_dirty());
    }

    #[test]
    fn writes_after_capture_stay_dirty() {
        let store = TrafficStore::default();
        store.report(TrafficReport::from_user("u", 1, 1));
        let (_, mark) = store.capture();
        store.report(TrafficReport::from_user("u", 1, 1));

        store.mark_saved(mark);
        assert!(store.is_dirty());
    }
}
