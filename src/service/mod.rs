//! Service wiring: application state, command routing, background tasks
//! and the health/metrics HTTP endpoint

pub mod app;
pub mod health;

pub use app::{AppState, ServiceCommandRouter};
pub use health::{HealthServer, HealthServerConfig};
