//! Greedy zone-first distribution of orders across the fleet.
//!
//! Groups orders by resolved zone and places whole groups where they fit,
//! splitting only when no single vehicle can take the group. Orders are
//! never silently dropped: anything unplaceable comes back with a reason.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::capacity::{Admission, CapacityTracker};
use crate::model::{Order, Vehicle};
use crate::zone::canonical_zone;

/// Why an order was left off every vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnassignedReason {
    /// No source produced a zone; the order needs geocoding or manual triage.
    UnresolvedZone,
    /// Every vehicle's remaining capacity is too small right now.
    NoRemainingCapacity,
    /// The order alone outweighs every vehicle's full capacity.
    ExceedsFleetCapacity,
}

#[derive(Debug, Clone)]
pub struct UnassignedOrder {
    pub order: Order,
    pub reason: UnassignedReason,
}

/// One vehicle's packed order list, in admission order.
#[derive(Debug, Clone)]
pub struct PackedVehicle {
    pub vehicle: Vehicle,
    pub orders: Vec<Order>,
}

#[derive(Debug, Clone, Default)]
pub struct PackResult {
    pub packed: Vec<PackedVehicle>,
    pub unassigned: Vec<UnassignedOrder>,
}

/// Distributes `orders` across `vehicles`, consuming capacity from the
/// tracker as orders are admitted.
///
/// Zone groups are processed largest first (ties broken by zone label) so
/// the hardest groups see the most open fleet. Within a vehicle, delivery
/// sequence is admission order until the optimizer replaces it.
pub fn pack(orders: Vec<Order>, vehicles: &[Vehicle], tracker: &mut CapacityTracker) -> PackResult {
    let mut unassigned: Vec<UnassignedOrder> = Vec::new();
    let mut groups: BTreeMap<String, Vec<Order>> = BTreeMap::new();

    for order in orders {
        match canonical_zone(order.location_group.as_deref()) {
            Some(zone) => groups.entry(zone).or_default().push(order),
            None => unassigned.push(UnassignedOrder {
                order,
                reason: UnassignedReason::UnresolvedZone,
            }),
        }
    }

    let mut ordered_groups: Vec<(String, Vec<Order>)> = groups.into_iter().collect();
    ordered_groups.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(&b.0)));

    // Orders per vehicle, aligned with the input fleet slice.
    let mut loads: Vec<Vec<Order>> = vec![Vec::new(); vehicles.len()];
    let vehicle_index: HashMap<&str, usize> = vehicles
        .iter()
        .enumerate()
        .map(|(index, vehicle)| (vehicle.id.as_str(), index))
        .collect();
    // Which vehicles already carry each zone, for adjacency when splitting.
    let mut zone_vehicles: HashMap<String, Vec<usize>> = HashMap::new();

    for (zone, group) in ordered_groups {
        let total_weight: f64 = group.iter().map(|order| order.weight_kg).sum();

        if let Some(index) = whole_group_vehicle(&zone, total_weight, vehicles, tracker) {
            debug!(zone = %zone, orders = group.len(), vehicle = %vehicles[index].id, "placing whole zone group");
            for order in group {
                match tracker.admit(&vehicles[index].id, order.weight_kg) {
                    Admission::Accepted => loads[index].push(order),
                    Admission::Rejected => unassigned.push(UnassignedOrder {
                        order,
                        reason: UnassignedReason::NoRemainingCapacity,
                    }),
                }
            }
            zone_vehicles.entry(zone).or_default().push(index);
            continue;
        }

        debug!(zone = %zone, orders = group.len(), "splitting zone group across vehicles");
        // Heaviest first: large orders have the fewest viable vehicles, so
        // they claim space before small orders fragment it.
        let mut group = group;
        group.sort_by(|a, b| {
            b.weight_kg
                .partial_cmp(&a.weight_kg)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for order in group {
            let carriers = zone_vehicles.entry(zone.clone()).or_default();
            match split_target(&zone, order.weight_kg, vehicles, tracker, carriers) {
                Some(index) => {
                    if tracker.admit(&vehicles[index].id, order.weight_kg) == Admission::Accepted {
                        loads[index].push(order);
                        if !carriers.contains(&index) {
                            carriers.push(index);
                        }
                    } else {
                        unassigned.push(UnassignedOrder {
                            order,
                            reason: UnassignedReason::NoRemainingCapacity,
                        });
                    }
                }
                None => {
                    let reason = if !vehicles.is_empty()
                        && vehicles.iter().all(|vehicle| order.weight_kg > vehicle.capacity_kg)
                    {
                        UnassignedReason::ExceedsFleetCapacity
                    } else {
                        UnassignedReason::NoRemainingCapacity
                    };
                    unassigned.push(UnassignedOrder { order, reason });
                }
            }
        }
    }

    let packed = vehicles
        .iter()
        .filter_map(|vehicle| {
            let index = vehicle_index[vehicle.id.as_str()];
            if loads[index].is_empty() {
                return None;
            }
            Some(PackedVehicle {
                vehicle: vehicle.clone(),
                orders: std::mem::take(&mut loads[index]),
            })
        })
        .collect();

    PackResult { packed, unassigned }
}

/// Best vehicle that can take the whole group: affinity match first, then
/// tightest sufficient remaining capacity, then vehicle id for determinism.
fn whole_group_vehicle(
    zone: &str,
    total_weight: f64,
    vehicles: &[Vehicle],
    tracker: &CapacityTracker,
) -> Option<usize> {
    let mut candidates: Vec<usize> = (0..vehicles.len())
        .filter(|&index| tracker.fits(&vehicles[index].id, total_weight))
        .collect();
    rank_candidates(&mut candidates, zone, vehicles, tracker, &[]);
    candidates.first().copied()
}

/// Best vehicle for one order of a split group: vehicles already carrying
/// the zone first (keeps the zone adjacent), then affinity, then tightest
/// fit.
fn split_target(
    zone: &str,
    weight: f64,
    vehicles: &[Vehicle],
    tracker: &CapacityTracker,
    carriers: &[usize],
) -> Option<usize> {
    let mut candidates: Vec<usize> = (0..vehicles.len())
        .filter(|&index| tracker.fits(&vehicles[index].id, weight))
        .collect();
    rank_candidates(&mut candidates, zone, vehicles, tracker, carriers);
    candidates.first().copied()
}

fn rank_candidates(
    candidates: &mut [usize],
    zone: &str,
    vehicles: &[Vehicle],
    tracker: &CapacityTracker,
    carriers: &[usize],
) {
    candidates.sort_by(|&a, &b| {
        let carries = |index: usize| carriers.contains(&index);
        let affine = |index: usize| {
            vehicles[index]
                .zone_affinity
                .as_deref()
                .is_some_and(|affinity| affinity.eq_ignore_ascii_case(zone))
        };
        carries(b)
            .cmp(&carries(a))
            .then_with(|| affine(b).cmp(&affine(a)))
            .then_with(|| {
                tracker
                    .remaining(&vehicles[a].id)
                    .partial_cmp(&tracker.remaining(&vehicles[b].id))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| vehicles[a].id.cmp(&vehicles[b].id))
    });
}
