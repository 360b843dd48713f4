//! One dispatch run: snapshot, enrich, pack, optimize, persist.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::capacity::CapacityTracker;
use crate::model::{
    Order, OrderStatus, OptimizedRoute, RouteSummary, Stop, Vehicle, VehicleAssignment,
};
use crate::packer::{PackedVehicle, UnassignedOrder, pack};
use crate::persistence::BatchPersistenceWriter;
use crate::route_cache::{OptimizationJob, RouteOptimizationCache};
use crate::traits::{DeliveryStore, Geocoder, RouteOptimizer, StoreError};
use crate::zone::{UNRESOLVED_ZONE, ZoneCandidates, ZoneDirectory, resolve_zone};

/// Tunables for a dispatch run.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Depot coordinates every route starts and ends at (lat, lng).
    pub depot: (f64, f64),
    /// Route optimizer calls in flight at once.
    pub optimizer_batch_size: usize,
    pub zone_cache_max_entries: usize,
    pub route_cache_max_entries: usize,
    /// Statuses that count toward a vehicle's existing load for the date.
    pub active_statuses: Vec<OrderStatus>,
}

impl EngineOptions {
    pub fn new(depot: (f64, f64)) -> Self {
        Self {
            depot,
            ..Self::default()
        }
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            depot: (0.0, 0.0),
            optimizer_batch_size: 3,
            zone_cache_max_entries: 5000,
            route_cache_max_entries: 256,
            active_statuses: vec![
                OrderStatus::Assigned,
                OrderStatus::InProgress,
                OrderStatus::Scheduled,
            ],
        }
    }
}

/// Fatal run failure. Everything recoverable is reported, not raised.
#[derive(Debug)]
pub enum EngineError {
    Store(StoreError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Store(err) => write!(f, "dispatch run aborted: {}", err),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Store(err) => Some(err),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        EngineError::Store(err)
    }
}

/// Outcome of one run. Partial assignment is a normal result, not an error.
#[derive(Debug)]
pub struct RunReport {
    pub scheduled_date: i64,
    pub assignments: Vec<VehicleAssignment>,
    pub unassigned: Vec<UnassignedOrder>,
    /// Orders resolved through the on-demand geocoder.
    pub geocoded: usize,
    /// Orders the geocoder could not resolve either.
    pub geocode_misses: usize,
    pub optimizer_failures: usize,
    pub order_rows: usize,
    pub route_rows: usize,
}

impl RunReport {
    pub fn assigned_order_count(&self) -> usize {
        self.assignments.iter().map(|assignment| assignment.orders.len()).sum()
    }
}

#[derive(Default)]
struct EnrichStats {
    geocoded: usize,
    geocode_misses: usize,
}

/// Assigns a date's pending orders to the fleet and persists the plan.
///
/// Everything runs as a single linear pass except route optimization,
/// which goes out in bounded parallel batches and is fully joined before
/// persistence begins. No writes happen before the final batch step.
pub struct DispatchEngine<S, G, R> {
    store: S,
    geocoder: G,
    optimizer: R,
    zones: ZoneDirectory,
    routes: RouteOptimizationCache,
    options: EngineOptions,
}

impl<S, G, R> DispatchEngine<S, G, R>
where
    S: DeliveryStore,
    G: Geocoder,
    R: RouteOptimizer + Sync,
{
    pub fn new(store: S, geocoder: G, optimizer: R, options: EngineOptions) -> Self {
        let zones = ZoneDirectory::new(options.zone_cache_max_entries);
        let routes = RouteOptimizationCache::new(options.route_cache_max_entries);
        Self {
            store,
            geocoder,
            optimizer,
            zones,
            routes,
            options,
        }
    }

    pub fn zone_directory(&self) -> &ZoneDirectory {
        &self.zones
    }

    pub fn route_cache(&self) -> &RouteOptimizationCache {
        &self.routes
    }

    /// Plans `pending` for the given date and persists the result.
    pub fn run(&self, scheduled_date: i64, pending: Vec<Order>) -> Result<RunReport, EngineError> {
        let orders_in = pending.len();

        let vehicles: Vec<Vehicle> = self
            .store
            .vehicles()?
            .into_iter()
            .filter(|vehicle| vehicle.capacity_kg > 0.0)
            .collect();

        let mut tracker = CapacityTracker::new(&vehicles);
        let existing = self
            .store
            .assigned_orders(scheduled_date, &self.options.active_statuses)?;
        for order in &existing {
            if let Some(vehicle_id) = &order.assigned_vehicle_id {
                tracker.preload(vehicle_id, order.weight_kg);
            }
        }
        debug!(
            vehicles = vehicles.len(),
            existing_orders = existing.len(),
            "fleet snapshot loaded"
        );

        let mut stats = EnrichStats::default();
        let enriched = self.enrich(pending, &mut stats)?;

        let result = pack(enriched, &vehicles, &mut tracker);

        let mut optimizer_failures = 0usize;
        let mut jobs: Vec<OptimizationJob> = Vec::new();
        let mut job_targets: Vec<usize> = Vec::new();
        for (index, packed) in result.packed.iter().enumerate() {
            let stops: Option<Vec<Stop>> = packed
                .orders
                .iter()
                .map(|order| {
                    order.coordinates.map(|coordinates| Stop {
                        coordinates,
                        pickup_kg: order.weight_kg,
                    })
                })
                .collect();
            match stops {
                Some(stops) if !stops.is_empty() => {
                    jobs.push(OptimizationJob {
                        stops,
                        vehicle_capacity_kg: packed.vehicle.capacity_kg,
                    });
                    job_targets.push(index);
                }
                _ => {
                    debug!(
                        vehicle = %packed.vehicle.id,
                        "stops missing coordinates, keeping admission order"
                    );
                }
            }
        }

        let resolved = self.routes.resolve_batches(
            &self.optimizer,
            self.options.depot,
            &jobs,
            self.options.optimizer_batch_size,
        );
        let mut optimized: HashMap<usize, Arc<OptimizedRoute>> = HashMap::new();
        for (job_index, route) in resolved.into_iter().enumerate() {
            match route {
                Some(route) => {
                    optimized.insert(job_targets[job_index], route);
                }
                None => {
                    optimizer_failures += 1;
                    warn!(
                        vehicle = %result.packed[job_targets[job_index]].vehicle.id,
                        "route optimization failed, using admission order"
                    );
                }
            }
        }

        let assignments: Vec<VehicleAssignment> = result
            .packed
            .into_iter()
            .enumerate()
            .map(|(index, packed)| {
                let PackedVehicle { vehicle, mut orders } = packed;
                let mut route_summary = None;
                if let Some(route) = optimized.get(&index) {
                    match apply_stop_order(&orders, &route.stop_order) {
                        Some(reordered) => {
                            orders = reordered;
                            route_summary = Some(RouteSummary {
                                distance_m: route.distance_m,
                                duration_s: route.duration_s,
                                geometry: route.geometry.clone(),
                            });
                        }
                        None => {
                            optimizer_failures += 1;
                            warn!(
                                vehicle = %vehicle.id,
                                "optimizer returned an invalid stop order, keeping admission order"
                            );
                        }
                    }
                }
                let total_weight_kg: f64 = orders.iter().map(|order| order.weight_kg).sum();
                let utilization_pct = tracker.utilization(&vehicle.id);
                VehicleAssignment {
                    vehicle,
                    orders,
                    total_weight_kg,
                    utilization_pct,
                    route: route_summary,
                }
            })
            .collect();

        let writer = BatchPersistenceWriter::new(scheduled_date);
        let summary = writer.persist(&self.store, &assignments)?;

        let report = RunReport {
            scheduled_date,
            assignments,
            unassigned: result.unassigned,
            geocoded: stats.geocoded,
            geocode_misses: stats.geocode_misses,
            optimizer_failures,
            order_rows: summary.order_rows,
            route_rows: summary.route_rows,
        };
        info!(
            scheduled_date,
            orders_in,
            assigned = report.assigned_order_count(),
            unassigned = report.unassigned.len(),
            optimizer_failures = report.optimizer_failures,
            "dispatch run complete"
        );
        Ok(report)
    }

    /// Fills zones and coordinates: one batched directory read for every
    /// customer on the run, then on-demand geocoding only for directory
    /// misses that still lack a zone or coordinates.
    fn enrich(&self, mut orders: Vec<Order>, stats: &mut EnrichStats) -> Result<Vec<Order>, StoreError> {
        let customer_ids: Vec<String> = orders.iter().map(|order| order.customer_id.clone()).collect();
        let directory = self.zones.lookup(&self.store, &customer_ids)?;

        for order in &mut orders {
            let entry = directory.get(&order.customer_id);
            let in_directory = entry.is_some();

            if order.coordinates.is_none() {
                order.coordinates = entry.and_then(|record| record.coordinates);
            }
            let mut geocoded_zone: Option<String> = entry.map(|record| record.zone.clone());

            if !in_directory {
                let candidates = ZoneCandidates {
                    persisted: order.location_group.as_deref(),
                    incoming: order.zone.as_deref(),
                    legacy: order.legacy_zone.as_deref(),
                    geocoded: None,
                };
                let unresolved_without_geocode = resolve_zone(&candidates) == UNRESOLVED_ZONE;
                if unresolved_without_geocode || order.coordinates.is_none() {
                    let query = match &order.address {
                        Some(address) => format!("{}, {}", order.customer_name, address),
                        None => order.customer_name.clone(),
                    };
                    match self.geocoder.geocode(&query) {
                        Some(hit) => {
                            stats.geocoded += 1;
                            if order.coordinates.is_none() {
                                order.coordinates = Some(hit.coordinates);
                            }
                            geocoded_zone = hit.zone;
                        }
                        None => {
                            stats.geocode_misses += 1;
                            warn!(
                                order = %order.id,
                                customer = %order.customer_id,
                                "geocoding failed, order left for manual resolution"
                            );
                        }
                    }
                }
            }

            let resolved = resolve_zone(&ZoneCandidates {
                persisted: order.location_group.as_deref(),
                incoming: order.zone.as_deref(),
                legacy: order.legacy_zone.as_deref(),
                geocoded: geocoded_zone.as_deref(),
            });
            order.location_group = Some(resolved);
            order.needs_geocoding = !in_directory
                && (order.coordinates.is_none()
                    || order.location_group.as_deref() == Some(UNRESOLVED_ZONE));
        }

        Ok(orders)
    }
}

/// Reorders admitted orders by the optimizer's permutation, refusing
/// anything that is not a true permutation of 0..N.
fn apply_stop_order(orders: &[Order], stop_order: &[usize]) -> Option<Vec<Order>> {
    if stop_order.len() != orders.len() {
        return None;
    }
    let mut seen = vec![false; orders.len()];
    for &index in stop_order {
        if index >= orders.len() || seen[index] {
            return None;
        }
        seen[index] = true;
    }
    Some(stop_order.iter().map(|&index| orders[index].clone()).collect())
}
