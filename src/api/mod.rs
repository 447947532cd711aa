//! Galactic Hustlers REST API Module
//! Drives the race state machine over HTTP

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod types;

pub use handlers::AppState;
pub use middleware::{start_cleanup_task, RateLimitConfig, RateLimiter};
pub use routes::create_router;
pub use types::*;
