//! HTTP API handlers for fp-api

pub mod auth;
pub mod health;
pub mod middleware;
pub mod scenarios;

pub use auth::BearerToken;
pub use health::health_routes;
pub use middleware::{handle_errors, handle_panic, track_metrics};
pub use scenarios::scenario_routes;
