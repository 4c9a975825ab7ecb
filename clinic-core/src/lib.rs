//! clinic-core: Shared infrastructure for the clinic back-office services.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;

pub use axum;
pub use serde_json;
pub use tracing;
pub use validator;
