//! Route modules.

pub mod auth;
pub mod employees;
pub mod health;
pub mod index;
pub mod me;

use gatehouse_common::error::GatehouseError;

/// Fallback for paths no router claims. Only reached past the gate.
pub async fn not_found() -> GatehouseError {
    GatehouseError::not_found("Route")
}
