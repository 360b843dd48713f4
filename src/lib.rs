//! dispatch-planner core
//!
//! Assigns pending delivery orders to capacity-constrained vehicles for a
//! service date and produces an optimized stop sequence per vehicle.

pub mod capacity;
pub mod engine;
pub mod geoapify;
pub mod haversine;
pub mod model;
pub mod packer;
pub mod persistence;
pub mod polyline;
pub mod route_cache;
pub mod traits;
pub mod zone;
