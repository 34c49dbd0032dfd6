//! HTTP API handlers for insureguard-ai

pub mod analyze;
pub mod health;

pub use analyze::analyze_routes;
pub use health::health_routes;
