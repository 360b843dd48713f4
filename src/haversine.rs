//! Great-circle fallback optimizer (no network).
//!
//! Orders stops nearest-neighbor from the depot and estimates totals from
//! straight-line distance at an assumed speed. Less accurate than a road
//! optimizer (ignores the road network) but always available.

use crate::model::{OptimizedRoute, Stop};
use crate::polyline::Polyline;
use crate::traits::RouteOptimizer;

/// Average driving speed assumption for duration estimation.
const DEFAULT_SPEED_KMH: f64 = 40.0;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Nearest-neighbor router over great-circle distances.
#[derive(Debug, Clone)]
pub struct HaversineRouter {
    /// Assumed average driving speed in km/h.
    pub speed_kmh: f64,
}

impl Default for HaversineRouter {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
        }
    }
}

impl HaversineRouter {
    pub fn new(speed_kmh: f64) -> Self {
        Self { speed_kmh }
    }

    /// Haversine distance between two points in kilometers.
    fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
        let (lat1, lng1) = from;
        let (lat2, lng2) = to;

        let lat1_rad = lat1.to_radians();
        let lat2_rad = lat2.to_radians();
        let delta_lat = (lat2 - lat1).to_radians();
        let delta_lng = (lng2 - lng1).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();

        EARTH_RADIUS_KM * c
    }
}

impl RouteOptimizer for HaversineRouter {
    fn optimize(
        &self,
        depot: (f64, f64),
        stops: &[Stop],
        _vehicle_capacity_kg: f64,
    ) -> Option<OptimizedRoute> {
        if stops.is_empty() {
            return None;
        }

        let mut remaining: Vec<usize> = (0..stops.len()).collect();
        let mut stop_order = Vec::with_capacity(stops.len());
        let mut position = depot;
        let mut total_km = 0.0;

        while !remaining.is_empty() {
            let (slot, _) = remaining
                .iter()
                .enumerate()
                .min_by(|&(_, &a), &(_, &b)| {
                    Self::haversine_km(position, stops[a].coordinates)
                        .partial_cmp(&Self::haversine_km(position, stops[b].coordinates))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })?;
            let index = remaining.remove(slot);
            total_km += Self::haversine_km(position, stops[index].coordinates);
            position = stops[index].coordinates;
            stop_order.push(index);
        }
        total_km += Self::haversine_km(position, depot);

        let duration_s = (total_km / self.speed_kmh * 3600.0).round();
        Some(OptimizedRoute {
            stop_order,
            distance_m: total_km * 1000.0,
            duration_s,
            geometry: None,
        })
    }

    fn route_geometry(&self, waypoints: &[(f64, f64)]) -> Option<Polyline> {
        if waypoints.len() < 2 {
            return None;
        }
        Some(Polyline::new(waypoints.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop(lat: f64, lng: f64) -> Stop {
        Stop {
            coordinates: (lat, lng),
            pickup_kg: 100.0,
        }
    }

    #[test]
    fn same_point_has_zero_distance() {
        let dist = HaversineRouter::haversine_km((36.1, -115.1), (36.1, -115.1));
        assert!(dist < 0.001, "same point should have ~0 distance");
    }

    #[test]
    fn known_distance() {
        // Las Vegas (36.17, -115.14) to Los Angeles (34.05, -118.24),
        // actual distance ~370 km.
        let dist = HaversineRouter::haversine_km((36.17, -115.14), (34.05, -118.24));
        assert!(dist > 350.0 && dist < 400.0, "LV to LA should be ~370km, got {}", dist);
    }

    #[test]
    fn orders_stops_nearest_first() {
        let router = HaversineRouter::default();
        let stops = vec![stop(0.0, 3.0), stop(0.0, 1.0), stop(0.0, 2.0)];

        let route = router.optimize((0.0, 0.0), &stops, 1000.0).unwrap();

        assert_eq!(route.stop_order, vec![1, 2, 0]);
        assert!(route.distance_m > 0.0);
        assert!(route.duration_s > 0.0);
    }

    #[test]
    fn distance_includes_return_to_depot() {
        let router = HaversineRouter::new(40.0);
        let out_and_back = router.optimize((0.0, 0.0), &[stop(0.0, 1.0)], 1000.0).unwrap();

        let one_way_km = HaversineRouter::haversine_km((0.0, 0.0), (0.0, 1.0));
        let expected_m = one_way_km * 2.0 * 1000.0;
        assert!((out_and_back.distance_m - expected_m).abs() < 1.0);
    }

    #[test]
    fn empty_stop_set_is_a_miss() {
        let router = HaversineRouter::default();
        assert!(router.optimize((0.0, 0.0), &[], 1000.0).is_none());
    }

    #[test]
    fn geometry_is_the_straight_waypoint_line() {
        let router = HaversineRouter::default();
        let waypoints = vec![(0.0, 0.0), (1.0, 1.0), (0.0, 0.0)];
        let polyline = router.route_geometry(&waypoints).unwrap();
        assert_eq!(polyline.points(), &waypoints[..]);
        assert!(router.route_geometry(&[(0.0, 0.0)]).is_none());
    }
}
