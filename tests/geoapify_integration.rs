//! Live smoke tests against the Geoapify API.
//!
//! These hit the real service and need `GEOAPIFY_API_KEY` in the
//! environment. Run with `cargo test -- --ignored`.

use std::env;

use dispatch_planner::geoapify::{GeoapifyClient, GeoapifyConfig};
use dispatch_planner::model::Stop;
use dispatch_planner::traits::{Geocoder, RouteOptimizer};

fn client() -> Option<GeoapifyClient> {
    let api_key = env::var("GEOAPIFY_API_KEY").ok()?;
    let config = GeoapifyConfig {
        api_key,
        ..GeoapifyConfig::default()
    };
    GeoapifyClient::new(config).ok()
}

#[test]
#[ignore = "requires GEOAPIFY_API_KEY and network access"]
fn geocode_returns_coordinates_and_a_zone() {
    let Some(client) = client() else {
        eprintln!("GEOAPIFY_API_KEY not set, skipping");
        return;
    };

    let hit = client
        .geocode("Kenyatta Avenue, Nairobi, Kenya")
        .expect("geocode hit");

    // Nairobi sits just south of the equator.
    assert!(hit.coordinates.0 > -2.0 && hit.coordinates.0 < 0.0);
    assert!(hit.coordinates.1 > 36.0 && hit.coordinates.1 < 38.0);
}

#[test]
#[ignore = "requires GEOAPIFY_API_KEY and network access"]
fn route_planner_orders_a_small_stop_set() {
    let Some(client) = client() else {
        eprintln!("GEOAPIFY_API_KEY not set, skipping");
        return;
    };

    let depot = (-1.3032, 36.8474);
    let stops = vec![
        Stop {
            coordinates: (-1.2864, 36.8172),
            pickup_kg: 200.0,
        },
        Stop {
            coordinates: (-1.2630, 36.8063),
            pickup_kg: 150.0,
        },
        Stop {
            coordinates: (-1.3170, 36.8390),
            pickup_kg: 100.0,
        },
    ];

    let route = client
        .optimize(depot, &stops, 1000.0)
        .expect("route planner result");

    let mut visited = route.stop_order.clone();
    visited.sort();
    assert_eq!(visited, vec![0, 1, 2]);
    assert!(route.distance_m > 0.0);
    assert!(route.duration_s > 0.0);

    let mut waypoints = vec![depot];
    for &index in &route.stop_order {
        waypoints.push(stops[index].coordinates);
    }
    waypoints.push(depot);
    let geometry = client.route_geometry(&waypoints).expect("route geometry");
    assert!(geometry.len() >= waypoints.len());
}
