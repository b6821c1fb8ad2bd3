//! Domain layer - Pure business abstractions
//!
//! This layer contains NO framework dependencies (no Axum).
//! Only trait definitions, lifecycle vocabularies and domain error types.

pub mod errors;
pub mod repositories;
pub mod status;

pub use errors::DomainError;
pub use repositories::*;
pub use status::{InvoiceStatus, Role, TripAction, TripStatus};
