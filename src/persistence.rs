//! Bulk write-back of a finished plan.
//!
//! Exactly one upsert per affected table, keyed by natural identifiers,
//! so replaying the same plan leaves the store unchanged.

use tracing::info;

use crate::model::{OrderAssignmentRow, OrderStatus, VehicleAssignment, VehicleRouteRow};
use crate::traits::{DeliveryStore, StoreError};
use crate::zone::canonical_zone;

/// Row counts from one persistence pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistSummary {
    pub order_rows: usize,
    pub route_rows: usize,
}

/// Flattens per-vehicle assignments into bulk upsert rows for one date.
pub struct BatchPersistenceWriter {
    scheduled_date: i64,
}

impl BatchPersistenceWriter {
    pub fn new(scheduled_date: i64) -> Self {
        Self { scheduled_date }
    }

    /// Order rows in delivery sequence, 1..N per vehicle with no gaps.
    ///
    /// `location_group` is only carried when the resolved zone is a real
    /// value; a sentinel resolution writes `None`, which the store treats
    /// as "leave the persisted zone alone". Re-runs can therefore never
    /// degrade previously good zone data.
    pub fn order_rows(&self, assignments: &[VehicleAssignment]) -> Vec<OrderAssignmentRow> {
        assignments
            .iter()
            .flat_map(|assignment| {
                assignment.orders.iter().enumerate().map(|(position, order)| {
                    OrderAssignmentRow {
                        order_id: order.id.clone(),
                        status: OrderStatus::Assigned,
                        vehicle_id: assignment.vehicle.id.clone(),
                        driver_id: assignment.vehicle.driver_id.clone(),
                        scheduled_date: self.scheduled_date,
                        delivery_sequence: position as u32 + 1,
                        location_group: canonical_zone(order.location_group.as_deref()),
                    }
                })
            })
            .collect()
    }

    /// One route row per vehicle that carries orders. Failed optimization
    /// still writes the row, with zero totals and no geometry, so the
    /// route table always reflects the latest run for the vehicle/date.
    pub fn route_rows(&self, assignments: &[VehicleAssignment]) -> Vec<VehicleRouteRow> {
        assignments
            .iter()
            .filter(|assignment| !assignment.orders.is_empty())
            .map(|assignment| match &assignment.route {
                Some(route) => VehicleRouteRow {
                    vehicle_id: assignment.vehicle.id.clone(),
                    scheduled_date: self.scheduled_date,
                    geometry: route.geometry.clone(),
                    distance_m: route.distance_m,
                    duration_s: route.duration_s,
                },
                None => VehicleRouteRow {
                    vehicle_id: assignment.vehicle.id.clone(),
                    scheduled_date: self.scheduled_date,
                    geometry: None,
                    distance_m: 0.0,
                    duration_s: 0.0,
                },
            })
            .collect()
    }

    /// Writes the plan: one bulk upsert per table. A failure here is fatal
    /// to the run; nothing was written before this point, so the caller
    /// retries the whole run.
    pub fn persist<S: DeliveryStore>(
        &self,
        store: &S,
        assignments: &[VehicleAssignment],
    ) -> Result<PersistSummary, StoreError> {
        let order_rows = self.order_rows(assignments);
        let route_rows = self.route_rows(assignments);

        store.upsert_order_assignments(&order_rows)?;
        store.upsert_vehicle_routes(&route_rows)?;

        info!(
            scheduled_date = self.scheduled_date,
            order_rows = order_rows.len(),
            route_rows = route_rows.len(),
            "assignment plan persisted"
        );

        Ok(PersistSummary {
            order_rows: order_rows.len(),
            route_rows: route_rows.len(),
        })
    }
}
