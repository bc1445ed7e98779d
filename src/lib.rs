//! delivery-planner core
//!
//! Single-driver pickup and delivery sequencing with multi-criteria scoring,
//! plus a controller that re-solves monitored routes as live events arrive.

pub mod analysis;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod events;
pub mod haversine;
pub mod matrix;
pub mod model;
pub mod osrm;
pub mod reoptimize;
pub mod route_builder;
pub mod scoring;
pub mod solver;
pub mod state;
pub mod traffic;
pub mod traits;
