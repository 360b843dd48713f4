//! Interfaces to the collaborators the planner consumes.
//!
//! The persistent store, geocoder, and route optimizer are owned by the
//! surrounding application; the planner depends only on these contracts.

use std::fmt;

use crate::model::{
    CustomerZone, Order, OrderAssignmentRow, OrderStatus, OptimizedRoute, Stop, Vehicle,
    VehicleRouteRow,
};
use crate::polyline::Polyline;

/// Failure talking to the persistent store. Fatal for the run.
#[derive(Debug)]
pub enum StoreError {
    Read(String),
    Write(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Read(detail) => write!(f, "store read failed: {}", detail),
            StoreError::Write(detail) => write!(f, "store write failed: {}", detail),
        }
    }
}

impl std::error::Error for StoreError {}

/// Batched access to the persistent store.
///
/// Reads are point-in-time snapshots. Writes are bulk upserts keyed by
/// natural identifiers, so replaying a run is idempotent.
pub trait DeliveryStore {
    /// Customer directory records for a set of customer ids, in one
    /// round trip. Unknown ids are simply absent from the result.
    fn customer_zones(&self, customer_ids: &[String]) -> Result<Vec<CustomerZone>, StoreError>;

    /// Vehicles with a declared positive capacity.
    fn vehicles(&self) -> Result<Vec<Vehicle>, StoreError>;

    /// Orders already assigned for the date, filtered by status.
    fn assigned_orders(
        &self,
        scheduled_date: i64,
        statuses: &[OrderStatus],
    ) -> Result<Vec<Order>, StoreError>;

    /// Bulk upsert of order assignment fields, keyed by order id.
    ///
    /// A row with `location_group == None` must leave the stored zone
    /// value as-is.
    fn upsert_order_assignments(&self, rows: &[OrderAssignmentRow]) -> Result<(), StoreError>;

    /// Bulk upsert of route records, keyed by (vehicle_id, scheduled_date).
    fn upsert_vehicle_routes(&self, rows: &[VehicleRouteRow]) -> Result<(), StoreError>;
}

impl<T: DeliveryStore + ?Sized> DeliveryStore for &T {
    fn customer_zones(&self, customer_ids: &[String]) -> Result<Vec<CustomerZone>, StoreError> {
        (**self).customer_zones(customer_ids)
    }

    fn vehicles(&self) -> Result<Vec<Vehicle>, StoreError> {
        (**self).vehicles()
    }

    fn assigned_orders(
        &self,
        scheduled_date: i64,
        statuses: &[OrderStatus],
    ) -> Result<Vec<Order>, StoreError> {
        (**self).assigned_orders(scheduled_date, statuses)
    }

    fn upsert_order_assignments(&self, rows: &[OrderAssignmentRow]) -> Result<(), StoreError> {
        (**self).upsert_order_assignments(rows)
    }

    fn upsert_vehicle_routes(&self, rows: &[VehicleRouteRow]) -> Result<(), StoreError> {
        (**self).upsert_vehicle_routes(rows)
    }
}

/// Best match for a free-text geocode query.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeHit {
    /// (latitude, longitude).
    pub coordinates: (f64, f64),
    /// Delivery-area label derived from the match, when one exists.
    pub zone: Option<String>,
}

/// Forward geocoder for customers missing from the directory.
///
/// `None` covers both "no match" and a failed call; the planner treats
/// either as an unresolved location and carries on.
pub trait Geocoder {
    fn geocode(&self, query: &str) -> Option<GeocodeHit>;
}

impl<T: Geocoder + ?Sized> Geocoder for &T {
    fn geocode(&self, query: &str) -> Option<GeocodeHit> {
        (**self).geocode(query)
    }
}

/// External route optimizer for one vehicle's stop set.
pub trait RouteOptimizer {
    /// Optimized visit order plus totals. `None` on failure; the caller
    /// falls back to its pre-optimization sequence.
    fn optimize(
        &self,
        depot: (f64, f64),
        stops: &[Stop],
        vehicle_capacity_kg: f64,
    ) -> Option<OptimizedRoute>;

    /// Road geometry for an already-ordered waypoint list. Separate from
    /// `optimize` because providers serve it from a different endpoint.
    fn route_geometry(&self, waypoints: &[(f64, f64)]) -> Option<Polyline>;
}

impl<T: RouteOptimizer + ?Sized> RouteOptimizer for &T {
    fn optimize(
        &self,
        depot: (f64, f64),
        stops: &[Stop],
        vehicle_capacity_kg: f64,
    ) -> Option<OptimizedRoute> {
        (**self).optimize(depot, stops, vehicle_capacity_kg)
    }

    fn route_geometry(&self, waypoints: &[(f64, f64)]) -> Option<Polyline> {
        (**self).route_geometry(waypoints)
    }
}
