//! Outbound services: payment charging, push notifications, email.

pub mod email;
pub mod payment;
pub mod push;

pub use email::Mailer;
pub use payment::{ChargeOutcome, ChargeRequest, HttpPaymentGateway, PaymentGateway};
pub use push::PushClient;
