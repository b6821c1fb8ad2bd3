//! Repository implementations using SeaORM

pub mod profile_repository;
pub mod trip_repository;

pub use profile_repository::SeaOrmProfileRepository;
pub use trip_repository::SeaOrmTripRepository;
