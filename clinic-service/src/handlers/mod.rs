pub mod appointments;
pub mod auth;
pub mod dashboard;
pub mod health;
pub mod inventory;
pub mod invoices;
pub mod patients;
pub mod staff;
pub mod treatments;

pub use health::{health_check, metrics_handler, readiness_check};
