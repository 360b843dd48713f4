//! Geoapify HTTP adapter: forward geocoding and truck route planning.
//!
//! Every failure path logs and returns `None`; the planner keeps its
//! pre-optimization sequence and the run continues.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::{OptimizedRoute, Stop};
use crate::polyline::Polyline;
use crate::traits::{GeocodeHit, Geocoder, RouteOptimizer};

#[derive(Debug, Clone)]
pub struct GeoapifyConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl Default for GeoapifyConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.geoapify.com".to_string(),
            api_key: String::new(),
            timeout_secs: 20,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeoapifyClient {
    config: GeoapifyConfig,
    client: reqwest::blocking::Client,
}

impl GeoapifyClient {
    pub fn new(config: GeoapifyConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }
}

impl Geocoder for GeoapifyClient {
    fn geocode(&self, query: &str) -> Option<GeocodeHit> {
        let url = format!("{}/v1/geocode/search", self.config.base_url);
        let response = self
            .client
            .get(url)
            .query(&[
                ("text", query),
                ("format", "json"),
                ("limit", "1"),
                ("apiKey", self.config.api_key.as_str()),
            ])
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<GeocodeResponse>());

        match response {
            Ok(body) => body.results.into_iter().next().map(|result| GeocodeHit {
                coordinates: (result.lat, result.lon),
                zone: result.suburb.or(result.district).or(result.city),
            }),
            Err(err) => {
                warn!(error = %err, "geocode request failed");
                None
            }
        }
    }
}

impl RouteOptimizer for GeoapifyClient {
    fn optimize(
        &self,
        depot: (f64, f64),
        stops: &[Stop],
        vehicle_capacity_kg: f64,
    ) -> Option<OptimizedRoute> {
        if stops.is_empty() {
            return None;
        }

        // Locations go over the wire as [lng, lat]. Pickup amounts feed the
        // planner's own load validation; admission control stays with the
        // capacity tracker.
        let body = PlannerRequest {
            mode: "truck",
            kind: "short",
            avoid: vec![PlannerAvoid { kind: "tolls" }],
            agents: vec![PlannerAgent {
                start_location: [depot.1, depot.0],
                end_location: [depot.1, depot.0],
                pickup_capacity: vehicle_capacity_kg,
            }],
            jobs: stops
                .iter()
                .map(|stop| PlannerJob {
                    location: [stop.coordinates.1, stop.coordinates.0],
                    pickup_amount: stop.pickup_kg,
                })
                .collect(),
        };

        let url = format!(
            "{}/v1/routeplanner?apiKey={}",
            self.config.base_url, self.config.api_key
        );
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<PlannerResponse>());

        match response {
            Ok(body) => {
                let agent = body.features.into_iter().next()?;
                let stop_order: Vec<usize> = agent
                    .properties
                    .actions
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|action| action.kind == "job")
                    .filter_map(|action| action.job_index)
                    .collect();
                if stop_order.len() != stops.len() {
                    warn!(
                        expected = stops.len(),
                        planned = stop_order.len(),
                        "route planner left jobs unplanned"
                    );
                    return None;
                }
                Some(OptimizedRoute {
                    stop_order,
                    distance_m: agent.properties.distance.unwrap_or(0.0),
                    duration_s: agent.properties.time.unwrap_or(0.0),
                    geometry: None,
                })
            }
            Err(err) => {
                warn!(error = %err, "route planner request failed");
                None
            }
        }
    }

    fn route_geometry(&self, waypoints: &[(f64, f64)]) -> Option<Polyline> {
        if waypoints.len() < 2 {
            return None;
        }

        let joined = waypoints
            .iter()
            .map(|(lat, lng)| format!("{:.6},{:.6}", lat, lng))
            .collect::<Vec<_>>()
            .join("|");

        let url = format!("{}/v1/routing", self.config.base_url);
        let response = self
            .client
            .get(url)
            .query(&[
                ("waypoints", joined.as_str()),
                ("mode", "truck"),
                ("avoid", "tolls"),
                ("apiKey", self.config.api_key.as_str()),
            ])
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<RoutingResponse>());

        match response {
            Ok(body) => {
                let feature = body.features.into_iter().next()?;
                let segments: Vec<Vec<(f64, f64)>> = feature
                    .geometry
                    .coordinates
                    .into_iter()
                    .map(|leg| leg.into_iter().map(|[lng, lat]| (lat, lng)).collect())
                    .collect();
                let polyline = Polyline::from_segments(segments);
                if polyline.is_empty() { None } else { Some(polyline) }
            }
            Err(err) => {
                warn!(error = %err, "routing request failed");
                None
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    lat: f64,
    lon: f64,
    suburb: Option<String>,
    district: Option<String>,
    city: Option<String>,
}

#[derive(Debug, Serialize)]
struct PlannerRequest {
    mode: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    avoid: Vec<PlannerAvoid>,
    agents: Vec<PlannerAgent>,
    jobs: Vec<PlannerJob>,
}

#[derive(Debug, Serialize)]
struct PlannerAvoid {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct PlannerAgent {
    start_location: [f64; 2],
    end_location: [f64; 2],
    pickup_capacity: f64,
}

#[derive(Debug, Serialize)]
struct PlannerJob {
    location: [f64; 2],
    pickup_amount: f64,
}

#[derive(Debug, Deserialize)]
struct PlannerResponse {
    #[serde(default)]
    features: Vec<PlannerFeature>,
}

#[derive(Debug, Deserialize)]
struct PlannerFeature {
    properties: PlannerAgentProperties,
}

#[derive(Debug, Deserialize)]
struct PlannerAgentProperties {
    distance: Option<f64>,
    time: Option<f64>,
    actions: Option<Vec<PlannerAction>>,
}

#[derive(Debug, Deserialize)]
struct PlannerAction {
    #[serde(rename = "type")]
    kind: String,
    job_index: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RoutingResponse {
    #[serde(default)]
    features: Vec<RoutingFeature>,
}

#[derive(Debug, Deserialize)]
struct RoutingFeature {
    geometry: RoutingGeometry,
}

#[derive(Debug, Deserialize)]
struct RoutingGeometry {
    #[serde(default)]
    coordinates: Vec<Vec<[f64; 2]>>,
}
