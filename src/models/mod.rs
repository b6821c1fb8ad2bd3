pub mod conversation;
pub mod facility;
pub mod invoice;
pub mod managed_client;
pub mod message;
pub mod notification;
pub mod profile;
pub mod push_token;
pub mod trip;

pub use profile::ProfileDto;
