use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Bidirectional transport-id <-> user-id table.
///
/// Workers only know the transport identifier of a connection (the VLESS
/// UUID); the control plane bills by user id. Transport ids are lower-cased
/// on every entry and lookup, and each side maps to at most one entry on the
/// other side.
#[derive(Default)]
pub struct IdentityMapping {
    table: Mutex<MappingTable>,
}

#[derive(Default)]
struct MappingTable {
    by_transport: HashMap<String, String>,
    by_user: HashMap<String, String>,
    revision: u64,
}

impl MappingTable {
    /// Link a normalised transport id to a user id. Returns false if the pair
    /// was already present.
    fn link(&mut self, transport_id: String, user_id: &str) -> bool {
        if self.by_transport.get(&transport_id).map(String::as_str) == Some(user_id) {
            return false;
        }

        // unlink whatever either side pointed at before
        if let Some(stale_transport) = self.by_user.remove(user_id) {
            self.by_transport.remove(&stale_transport);
        }
        if let Some(stale_user) = self.by_transport.remove(&transport_id) {
            self.by_user.remove(&stale_user);
        }

        self.by_transport
            .insert(transport_id.clone(), user_id.to_string());
        self.by_user.insert(user_id.to_string(), transport_id);
        true
    }
}

impl IdentityMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mapping(&self, transport_id: &str, user_id: &str) {
        let mut table = self.table.lock();
        if table.link(transport_id.to_lowercase(), user_id) {
            table.revision += 1;
        }
    }

    /// The mapped user id, or the normalised transport id when there is none.
    pub fn resolve_user_id(&self, transport_id: &str) -> String {
        let transport_id = transport_id.to_lowercase();
        let table = self.table.lock();
        match table.by_transport.get(&transport_id) {
            Some(user_id) => user_id.clone(),
            None => transport_id,
        }
    }

    pub fn resolve_transport_id(&self, user_id: &str) -> Option<String> {
        self.table.lock().by_user.get(user_id).cloned()
    }

    /// Returns whether a mapping was removed.
    pub fn remove_by_transport_id(&self, transport_id: &str) -> bool {
        let transport_id = transport_id.to_lowercase();
        let mut table = self.table.lock();
        match table.by_transport.remove(&transport_id) {
            Some(user_id) => {
                table.by_user.remove(&user_id);
                table.revision += 1;
                debug!("Removed mapping {} -> {}", transport_id, user_id);
                true
            }
            None => false,
        }
    }

    pub fn snapshot_all(&self) -> BTreeMap<String, String> {
        self.versioned_snapshot().1
    }

    pub fn len(&self) -> usize {
        self.table.lock().by_transport.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bumped on every change; used to tell whether the table needs saving.
    pub(crate) fn revision(&self) -> u64 {
        self.table.lock().revision
    }

    /// The table together with the revision it was taken at.
    pub(crate) fn versioned_snapshot(&self) -> (u64, BTreeMap<String, String>) {
        let table = self.table.lock();
        let entries = table
            .by_transport
            .iter()
            .map(|(transport_id, user_id)| (transport_id.clone(), user_id.clone()))
            .collect();
        (table.revision, entries)
    }

    /// Replace the whole table, e.g. with the persisted one at startup.
    pub(crate) fn replace_all(&self, entries: BTreeMap<String, String>) {
        let mut table = self.table.lock();
        table.by_transport.clear();
        table.by_user.clear();
        for (transport_id, user_id) in entries {
            table.link(transport_id.to_lowercase(), &user_id);
        }
        table.revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmapped_transport_id_resolves_to_itself_lowercased() {
        let mapping = IdentityMapping::new();
        assert_eq!(mapping.resolve_user_id("ABC-Def"), "abc-def");
        assert_eq!(mapping.resolve_transport_id("abc-def"), None);
    }

    #[test]
    fn mapping_resolves_both_ways_case_insensitively() {
        let mapping = IdentityMapping::new();
        mapping.add_mapping("UUID-1", "user-1");

        assert_eq!(mapping.resolve_user_id("uuid-1"), "user-1");
        assert_eq!(mapping.resolve_user_id("UUID-1"), "user-1");
        assert_eq!(mapping.resolve_transport_id("user-1").as_deref(), Some("uuid-1"));
    }

    #[test]
    fn remapping_a_user_drops_the_stale_transport_id() {
        let mapping = IdentityMapping::new();
        mapping.add_mapping("T1", "U");
        mapping.add_mapping("T2", "U");

        assert_eq!(mapping.resolve_transport_id("U").as_deref(), Some("t2"));
        assert_eq!(mapping.resolve_user_id("T1"), "t1");
        assert_eq!(mapping.len(), 1);
    }

    #[test]
    fn remapping_a_transport_id_drops_the_stale_user() {
        let mapping = IdentityMapping::new();
        mapping.add_mapping("T", "U1");
        mapping.add_mapping("T", "U2");

        assert_eq!(mapping.resolve_user_id("T"), "U2");
        assert_eq!(mapping.resolve_transport_id("U1"), None);
        assert_eq!(mapping.resolve_transport_id("U2").as_deref(), Some("t"));
    }

    #[test]
    fn remove_clears_both_directions() {
        let mapping = IdentityMapping::new();
        mapping.add_mapping("T", "U");

        assert!(mapping.remove_by_transport_id("t"));
        assert_eq!(mapping.resolve_user_id("T"), "t");
        assert_eq!(mapping.resolve_transport_id("U"), None);
        assert!(!mapping.remove_by_transport_id("t"));
    }

    #[test]
    fn revision_only_moves_on_change() {
        let mapping = IdentityMapping::new();
        let start = mapping.revision();

        mapping.add_mapping("T", "U");
        let after_add = mapping.revision();
        assert!(after_add > start);

        mapping.add_mapping("t", "U");
        assert_eq!(mapping.revision(), after_add);

        mapping.remove_by_transport_id("missing");
        assert_eq!(mapping.revision(), after_add);
    }

    #[test]
    fn replace_all_normalises_and_keeps_the_bijection() {
        let mapping = IdentityMapping::new();
        mapping.add_mapping("old", "gone");

        let mut entries = BTreeMap::new();
        entries.insert("AAA".to_string(), "1".to_string());
        entries.insert("bbb".to_string(), "1".to_string());
        mapping.replace_all(entries);

        assert_eq!(mapping.resolve_user_id("old"), "old");
        assert_eq!(mapping.resolve_transport_id("1").as_deref(), Some("bbb"));
        assert_eq!(mapping.len(), 1);
    }

    #[test]
    fn snapshot_is_sorted_by_transport_id() {
        let mapping = IdentityMapping::new();
        mapping.add_mapping("B", "2");
        mapping.add_mapping("A", "1");

        let snapshot: Vec<_> = mapping.snapshot_all().into_iter().collect();
        assert_eq!(
            snapshot,
            vec![("a".to_string(), "1".to_string()), ("b".to_string(), "2".to_string())]
        );
    }
}
