//! Zone resolution: the customer directory cache and the precedence rule
//! for choosing an order's authoritative zone.
//!
//! The precedence chain is the load-bearing invariant of the whole
//! planner: a zone verified in an earlier run must never be clobbered by
//! a lower-confidence source.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

use crate::model::CustomerZone;
use crate::traits::{DeliveryStore, StoreError};

/// Placeholder written when no source yields a zone. Lowest priority in
/// resolution and never allowed to overwrite a real value.
pub const UNRESOLVED_ZONE: &str = "Unresolved";

/// Trims a raw zone value and rejects empty or sentinel-equal input, so
/// the precedence chain only ever sees usable candidates.
pub fn canonical_zone(raw: Option<&str>) -> Option<String> {
    let value = raw?.trim();
    if value.is_empty() || value.eq_ignore_ascii_case(UNRESOLVED_ZONE) {
        return None;
    }
    Some(value.to_string())
}

/// Candidate zone values for one order, one slot per source.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZoneCandidates<'a> {
    /// Value persisted for this order by a previous run.
    pub persisted: Option<&'a str>,
    /// Value carried on the incoming order record.
    pub incoming: Option<&'a str>,
    /// Legacy ingestion field with the same meaning under an older spelling.
    pub legacy: Option<&'a str>,
    /// Location-derived value: customer directory entry or on-demand geocode.
    pub geocoded: Option<&'a str>,
}

/// Picks the authoritative zone for an order.
///
/// Precedence, highest first: persisted, incoming, legacy, geocoded. A
/// persisted sentinel left by an earlier failed resolution does not count
/// as persisted, so fresh data can still fill the gap.
pub fn resolve_zone(candidates: &ZoneCandidates<'_>) -> String {
    canonical_zone(candidates.persisted)
        .or_else(|| canonical_zone(candidates.incoming))
        .or_else(|| canonical_zone(candidates.legacy))
        .or_else(|| canonical_zone(candidates.geocoded))
        .unwrap_or_else(|| UNRESOLVED_ZONE.to_string())
}

/// Read-through cache over the customer directory.
///
/// Lookups batch every missing id into a single store query. When an
/// insert would push the cache past `max_entries` the whole map is
/// dropped and refilled on demand; the directory is small enough that a
/// full reload costs less than tracking per-entry age.
pub struct ZoneDirectory {
    entries: Mutex<HashMap<String, CustomerZone>>,
    max_entries: usize,
}

impl ZoneDirectory {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries,
        }
    }

    /// Resolves a set of customer ids to directory records.
    ///
    /// Ids already cached are served from memory; the rest are fetched in
    /// one batched store read. Ids unknown to the store are absent from
    /// the returned map.
    pub fn lookup<S: DeliveryStore>(
        &self,
        store: &S,
        customer_ids: &[String],
    ) -> Result<HashMap<String, CustomerZone>, StoreError> {
        let mut wanted: Vec<String> = customer_ids.to_vec();
        wanted.sort();
        wanted.dedup();

        let missing: Vec<String> = {
            let entries = self.entries.lock().expect("zone cache lock poisoned");
            wanted
                .iter()
                .filter(|id| !entries.contains_key(*id))
                .cloned()
                .collect()
        };

        if !missing.is_empty() {
            debug!(requested = wanted.len(), fetching = missing.len(), "zone directory batch read");
            let fetched = store.customer_zones(&missing)?;
            let mut entries = self.entries.lock().expect("zone cache lock poisoned");
            if entries.len() + fetched.len() > self.max_entries {
                debug!(size = entries.len(), "zone directory over bound, clearing");
                entries.clear();
            }
            for record in fetched {
                entries.insert(record.customer_id.clone(), record);
            }
        }

        let entries = self.entries.lock().expect("zone cache lock poisoned");
        Ok(wanted
            .iter()
            .filter_map(|id| entries.get(id).map(|record| (id.clone(), record.clone())))
            .collect())
    }

    pub fn get(&self, customer_id: &str) -> Option<CustomerZone> {
        let entries = self.entries.lock().expect("zone cache lock poisoned");
        entries.get(customer_id).cloned()
    }

    pub fn put(&self, record: CustomerZone) {
        let mut entries = self.entries.lock().expect("zone cache lock poisoned");
        if entries.len() >= self.max_entries && !entries.contains_key(&record.customer_id) {
            entries.clear();
        }
        entries.insert(record.customer_id.clone(), record);
    }

    pub fn size(&self) -> usize {
        let entries = self.entries.lock().expect("zone cache lock poisoned");
        entries.len()
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock().expect("zone cache lock poisoned");
        entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::model::{Order, OrderAssignmentRow, OrderStatus, Vehicle, VehicleRouteRow};

    // ========================================================================
    // Precedence chain regression grid
    //
    // The ordering below is specification. Each adjacent pair in the chain
    // gets its own test so a regression names the exact rule it broke.
    // ========================================================================

    #[test]
    fn persisted_beats_incoming() {
        let resolved = resolve_zone(&ZoneCandidates {
            persisted: Some("North"),
            incoming: Some("South"),
            ..Default::default()
        });
        assert_eq!(resolved, "North");
    }

    #[test]
    fn incoming_beats_legacy() {
        let resolved = resolve_zone(&ZoneCandidates {
            incoming: Some("South"),
            legacy: Some("East"),
            ..Default::default()
        });
        assert_eq!(resolved, "South");
    }

    #[test]
    fn legacy_beats_geocoded() {
        let resolved = resolve_zone(&ZoneCandidates {
            legacy: Some("East"),
            geocoded: Some("West"),
            ..Default::default()
        });
        assert_eq!(resolved, "East");
    }

    #[test]
    fn geocoded_beats_sentinel() {
        let resolved = resolve_zone(&ZoneCandidates {
            geocoded: Some("West"),
            ..Default::default()
        });
        assert_eq!(resolved, "West");
    }

    #[test]
    fn no_candidates_yields_sentinel() {
        assert_eq!(resolve_zone(&ZoneCandidates::default()), UNRESOLVED_ZONE);
    }

    #[test]
    fn persisted_sentinel_does_not_shadow_fresh_data() {
        let resolved = resolve_zone(&ZoneCandidates {
            persisted: Some(UNRESOLVED_ZONE),
            incoming: Some("South"),
            ..Default::default()
        });
        assert_eq!(resolved, "South");
    }

    #[test]
    fn geocode_never_overrides_persisted() {
        // The historical failure mode: a generic geocode clobbering a
        // verified zone on re-run.
        let resolved = resolve_zone(&ZoneCandidates {
            persisted: Some("North"),
            geocoded: Some("Central Business District"),
            ..Default::default()
        });
        assert_eq!(resolved, "North");
    }

    #[test]
    fn canonicalization_rejects_blank_and_sentinel() {
        assert_eq!(canonical_zone(None), None);
        assert_eq!(canonical_zone(Some("")), None);
        assert_eq!(canonical_zone(Some("   ")), None);
        assert_eq!(canonical_zone(Some("unresolved")), None);
        assert_eq!(canonical_zone(Some("UNRESOLVED")), None);
        assert_eq!(canonical_zone(Some("  North ")), Some("North".to_string()));
    }

    #[test]
    fn blank_persisted_falls_through() {
        let resolved = resolve_zone(&ZoneCandidates {
            persisted: Some("  "),
            incoming: Some("South"),
            ..Default::default()
        });
        assert_eq!(resolved, "South");
    }

    // ========================================================================
    // Directory cache
    // ========================================================================

    struct CountingStore {
        reads: AtomicUsize,
        records: Vec<CustomerZone>,
    }

    impl CountingStore {
        fn with_records(records: Vec<CustomerZone>) -> Self {
            Self {
                reads: AtomicUsize::new(0),
                records,
            }
        }
    }

    impl DeliveryStore for CountingStore {
        fn customer_zones(&self, customer_ids: &[String]) -> Result<Vec<CustomerZone>, StoreError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .records
                .iter()
                .filter(|record| customer_ids.contains(&record.customer_id))
                .cloned()
                .collect())
        }

        fn vehicles(&self) -> Result<Vec<Vehicle>, StoreError> {
            Ok(Vec::new())
        }

        fn assigned_orders(&self, _: i64, _: &[OrderStatus]) -> Result<Vec<Order>, StoreError> {
            Ok(Vec::new())
        }

        fn upsert_order_assignments(&self, _: &[OrderAssignmentRow]) -> Result<(), StoreError> {
            Ok(())
        }

        fn upsert_vehicle_routes(&self, _: &[VehicleRouteRow]) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn record(customer_id: &str, zone: &str) -> CustomerZone {
        CustomerZone {
            customer_id: customer_id.to_string(),
            zone: zone.to_string(),
            address: format!("{} depot road", customer_id),
            coordinates: Some((-1.28, 36.82)),
        }
    }

    #[test]
    fn lookup_uses_a_single_batched_read() {
        let store = CountingStore::with_records(vec![record("c1", "North"), record("c2", "South")]);
        let directory = ZoneDirectory::new(100);

        let ids = vec!["c1".to_string(), "c2".to_string(), "c1".to_string()];
        let resolved = directory.lookup(&store, &ids).unwrap();

        assert_eq!(store.reads.load(Ordering::SeqCst), 1);
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved["c1"].zone, "North");
    }

    #[test]
    fn cached_ids_skip_the_store() {
        let store = CountingStore::with_records(vec![record("c1", "North")]);
        let directory = ZoneDirectory::new(100);

        directory.lookup(&store, &["c1".to_string()]).unwrap();
        directory.lookup(&store, &["c1".to_string()]).unwrap();

        assert_eq!(store.reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_ids_are_absent_not_errors() {
        let store = CountingStore::with_records(vec![record("c1", "North")]);
        let directory = ZoneDirectory::new(100);

        let resolved = directory
            .lookup(&store, &["c1".to_string(), "ghost".to_string()])
            .unwrap();

        assert_eq!(resolved.len(), 1);
        assert!(!resolved.contains_key("ghost"));
    }

    #[test]
    fn over_bound_insert_clears_wholesale() {
        let directory = ZoneDirectory::new(2);
        directory.put(record("c1", "North"));
        directory.put(record("c2", "South"));
        assert_eq!(directory.size(), 2);

        directory.put(record("c3", "East"));
        // Full invalidation, not partial eviction.
        assert_eq!(directory.size(), 1);
        assert!(directory.get("c1").is_none());
        assert!(directory.get("c3").is_some());
    }

    #[test]
    fn clear_empties_the_cache() {
        let directory = ZoneDirectory::new(10);
        directory.put(record("c1", "North"));
        directory.clear();
        assert_eq!(directory.size(), 0);
    }
}
