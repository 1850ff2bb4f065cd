//! HTTP adapters - request/response boundary endpoints.

pub mod health;
pub mod progress;

pub use health::{health_router, HealthState};
pub use progress::{progress_router, ProgressState};
