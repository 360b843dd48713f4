//! Domain model for delivery dispatch planning.

use serde::{Deserialize, Serialize};

use crate::polyline::Polyline;

/// Lifecycle status of a delivery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Assigned,
    InProgress,
    Scheduled,
    Completed,
}

/// A delivery order awaiting (or holding) a vehicle assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub customer_id: String,
    /// Customer display name; combined with `address` for geocode queries.
    pub customer_name: String,
    pub address: Option<String>,
    /// Total order weight in kilograms.
    pub weight_kg: f64,
    pub drum_count: u32,
    pub status: OrderStatus,
    /// Canonical zone persisted by earlier runs. `None` for fresh orders.
    pub location_group: Option<String>,
    /// Zone carried on the incoming order record, if ingestion supplied one.
    pub zone: Option<String>,
    /// Same logical value under the legacy ingestion spelling. Kept until
    /// old order sheets stop carrying it.
    pub legacy_zone: Option<String>,
    /// (latitude, longitude).
    pub coordinates: Option<(f64, f64)>,
    /// Set on orders already assigned in a prior run for the date.
    pub assigned_vehicle_id: Option<String>,
    /// Set when the customer directory has no entry for this order.
    pub needs_geocoding: bool,
}

impl Order {
    pub fn new(
        id: impl Into<String>,
        customer_id: impl Into<String>,
        customer_name: impl Into<String>,
        weight_kg: f64,
    ) -> Self {
        Self {
            id: id.into(),
            customer_id: customer_id.into(),
            customer_name: customer_name.into(),
            address: None,
            weight_kg,
            drum_count: 0,
            status: OrderStatus::Pending,
            location_group: None,
            zone: None,
            legacy_zone: None,
            coordinates: None,
            assigned_vehicle_id: None,
            needs_geocoding: false,
        }
    }
}

/// Customer directory record: pre-resolved zone plus geocode.
///
/// Read-only reference data owned outside the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerZone {
    pub customer_id: String,
    pub zone: String,
    pub address: String,
    pub coordinates: Option<(f64, f64)>,
}

/// A fleet vehicle eligible for assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    pub registration: String,
    /// Declared load capacity in kilograms. Hard ceiling.
    pub capacity_kg: f64,
    /// Preferred delivery area, when the fleet dedicates the vehicle.
    pub zone_affinity: Option<String>,
    pub driver_id: Option<String>,
}

impl Vehicle {
    pub fn new(id: impl Into<String>, registration: impl Into<String>, capacity_kg: f64) -> Self {
        Self {
            id: id.into(),
            registration: registration.into(),
            capacity_kg,
            zone_affinity: None,
            driver_id: None,
        }
    }
}

/// One vehicle's finalized order list for a service date.
#[derive(Debug, Clone)]
pub struct VehicleAssignment {
    pub vehicle: Vehicle,
    /// Orders in delivery sequence; position i is delivery number i + 1.
    pub orders: Vec<Order>,
    pub total_weight_kg: f64,
    pub utilization_pct: f64,
    /// Present when route optimization succeeded for this vehicle.
    pub route: Option<RouteSummary>,
}

/// Optimizer totals attached to an assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteSummary {
    pub distance_m: f64,
    pub duration_s: f64,
    pub geometry: Option<Polyline>,
}

/// A delivery stop submitted to the route optimizer.
#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    /// (latitude, longitude).
    pub coordinates: (f64, f64),
    /// Pickup amount forwarded for the optimizer's own load validation.
    /// Capacity enforcement lives in the planner, not the optimizer.
    pub pickup_kg: f64,
}

/// Result of one optimization call for a stop set.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizedRoute {
    /// Visit order as indexes into the submitted stop slice.
    pub stop_order: Vec<usize>,
    pub distance_m: f64,
    pub duration_s: f64,
    pub geometry: Option<Polyline>,
}

/// Bulk upsert row for order assignment fields, keyed by order id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderAssignmentRow {
    pub order_id: String,
    pub status: OrderStatus,
    pub vehicle_id: String,
    pub driver_id: Option<String>,
    pub scheduled_date: i64,
    /// 1-based position within the vehicle's delivery sequence.
    pub delivery_sequence: u32,
    /// `None` leaves the persisted value untouched; the planner only writes
    /// a zone it actually resolved.
    pub location_group: Option<String>,
}

/// Bulk upsert row for a vehicle's route record.
///
/// Conflict key is (vehicle_id, scheduled_date).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleRouteRow {
    pub vehicle_id: String,
    pub scheduled_date: i64,
    pub geometry: Option<Polyline>,
    pub distance_m: f64,
    pub duration_s: f64,
}
