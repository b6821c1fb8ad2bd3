//! Services Layer
//!
//! Business logic extracted from HTTP handlers. Handlers validate the session,
//! call into a service and turn the result into JSON.

pub mod account_service;
pub mod dashboard_service;
pub mod invoice_service;
pub mod message_service;
pub mod notification_service;
pub mod trip_service;

pub use notification_service::Notifier;
