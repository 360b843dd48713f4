//! Memoized dispatch to the external route optimizer.
//!
//! Route cost between a fixed set of stops does not depend on the order
//! they were submitted in, so results are cached under an
//! order-insensitive fingerprint of the stop set. Misses go out to the
//! optimizer in bounded-size parallel batches.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::model::{OptimizedRoute, Stop};
use crate::traits::RouteOptimizer;

/// Stable cache key for a stop set: 6-decimal coordinate strings, sorted,
/// joined. Any permutation of the same stops yields the same key.
pub fn stop_set_fingerprint(stops: &[Stop]) -> String {
    let mut keys: Vec<String> = stops
        .iter()
        .map(|stop| format!("{:.6},{:.6}", stop.coordinates.0, stop.coordinates.1))
        .collect();
    keys.sort();
    keys.join(";")
}

/// One vehicle's optimization request.
#[derive(Debug, Clone)]
pub struct OptimizationJob {
    pub stops: Vec<Stop>,
    pub vehicle_capacity_kg: f64,
}

/// Cache of optimizer results keyed by stop-set fingerprint.
///
/// Entries are shared read-only via `Arc`. When the entry count would
/// exceed the bound, the whole cache is cleared; a miss only costs
/// latency, never correctness.
pub struct RouteOptimizationCache {
    entries: Mutex<HashMap<String, Arc<OptimizedRoute>>>,
    max_entries: usize,
}

impl RouteOptimizationCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries,
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<OptimizedRoute>> {
        let entries = self.entries.lock().expect("route cache lock poisoned");
        entries.get(key).cloned()
    }

    pub fn put(&self, key: String, route: OptimizedRoute) -> Arc<OptimizedRoute> {
        let shared = Arc::new(route);
        let mut entries = self.entries.lock().expect("route cache lock poisoned");
        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            debug!(size = entries.len(), "route cache over bound, clearing");
            entries.clear();
        }
        entries.insert(key, shared.clone());
        shared
    }

    pub fn size(&self) -> usize {
        let entries = self.entries.lock().expect("route cache lock poisoned");
        entries.len()
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock().expect("route cache lock poisoned");
        entries.clear();
    }

    /// Resolves one stop set, consulting the cache before the network.
    ///
    /// On a miss the optimizer is invoked, then its separate geometry
    /// endpoint is asked for the ordered waypoints (depot, stops in
    /// optimized order, depot). Geometry failure alone still yields a
    /// cached result without geometry. Optimizer failure yields `None`
    /// and caches nothing, so a later run can retry.
    pub fn resolve<R: RouteOptimizer>(
        &self,
        optimizer: &R,
        depot: (f64, f64),
        stops: &[Stop],
        vehicle_capacity_kg: f64,
    ) -> Option<Arc<OptimizedRoute>> {
        if stops.is_empty() {
            return None;
        }

        let key = stop_set_fingerprint(stops);
        if let Some(hit) = self.get(&key) {
            debug!(stops = stops.len(), "route cache hit");
            return Some(hit);
        }

        let mut route = optimizer.optimize(depot, stops, vehicle_capacity_kg)?;
        if route.geometry.is_none() {
            let mut waypoints = Vec::with_capacity(stops.len() + 2);
            waypoints.push(depot);
            for &index in &route.stop_order {
                waypoints.push(stops.get(index)?.coordinates);
            }
            waypoints.push(depot);
            route.geometry = optimizer.route_geometry(&waypoints);
            if route.geometry.is_none() {
                warn!(stops = stops.len(), "route geometry unavailable, keeping totals only");
            }
        }

        Some(self.put(key, route))
    }

    /// Resolves many stop sets with at most `batch_size` optimizer calls
    /// in flight. Results line up with the input jobs; `None` marks an
    /// optimizer failure for that job.
    ///
    /// All batches complete before this returns, so the caller always
    /// persists a full picture of the run.
    pub fn resolve_batches<R: RouteOptimizer + Sync>(
        &self,
        optimizer: &R,
        depot: (f64, f64),
        jobs: &[OptimizationJob],
        batch_size: usize,
    ) -> Vec<Option<Arc<OptimizedRoute>>> {
        let batch = batch_size.max(1);
        let mut results = Vec::with_capacity(jobs.len());
        for chunk in jobs.chunks(batch) {
            let mut chunk_results: Vec<Option<Arc<OptimizedRoute>>> = chunk
                .par_iter()
                .map(|job| self.resolve(optimizer, depot, &job.stops, job.vehicle_capacity_kg))
                .collect();
            results.append(&mut chunk_results);
        }
        results
    }
}
