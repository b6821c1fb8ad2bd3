//! Repository trait definitions
//!
//! These traits define the contract for data access.
//! Implementations live in the infrastructure layer.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use super::{DomainError, Role};
use crate::models::{profile, trip};

/// Filter criteria for trip queries
#[derive(Debug, Default, Clone, Deserialize)]
pub struct TripFilter {
    pub status: Option<String>,
    pub driver_id: Option<i32>,
    pub facility_id: Option<i32>,
    pub user_id: Option<i32>,
    pub managed_client_id: Option<i32>,
    /// Inclusive lower bound on pickup_time (RFC 3339 or YYYY-MM-DD)
    pub from: Option<String>,
    /// Inclusive upper bound on pickup_time
    pub to: Option<String>,
    pub limit: Option<u64>,
}

/// Trip row enriched with display names for the dispatcher tables
#[derive(Debug, Clone, Serialize)]
pub struct TripView {
    #[serde(flatten)]
    pub trip: trip::Model,
    pub rider_name: Option<String>,
    pub driver_name: Option<String>,
    pub facility_name: Option<String>,
}

/// Input for creating a trip
#[derive(Debug, Clone, Deserialize)]
pub struct NewTrip {
    pub user_id: Option<i32>,
    pub managed_client_id: Option<i32>,
    pub facility_id: Option<i32>,
    pub pickup_address: String,
    pub destination_address: String,
    pub pickup_time: String,
    pub return_pickup_time: Option<String>,
    #[serde(default)]
    pub is_round_trip: bool,
    pub wheelchair_type: Option<String>,
    #[serde(default)]
    pub additional_passengers: i32,
    pub distance_miles: Option<f64>,
    pub price: Option<f64>,
    pub payment_method_id: Option<String>,
    pub notes: Option<String>,
}

/// Input for updating the editable fields of a trip.
/// `Some(None)` clears a nullable column.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TripUpdate {
    pub pickup_address: Option<String>,
    pub destination_address: Option<String>,
    pub pickup_time: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub return_pickup_time: Option<Option<String>>,
    pub is_round_trip: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub wheelchair_type: Option<Option<String>>,
    pub additional_passengers: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    pub distance_miles: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub price: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

/// Repository trait for Trip entity
#[async_trait]
pub trait TripRepository: Send + Sync {
    /// Find all trips matching the filter, newest pickup first
    async fn find_all(&self, filter: TripFilter) -> Result<Vec<TripView>, DomainError>;

    /// Find a single trip by ID
    async fn find_by_id(&self, id: i32) -> Result<Option<trip::Model>, DomainError>;

    /// Create a new trip in the given initial status
    async fn create(&self, input: NewTrip, status: &str) -> Result<trip::Model, DomainError>;

    /// Update an existing trip
    async fn update(&self, id: i32, input: TripUpdate) -> Result<trip::Model, DomainError>;

    /// Delete a trip by ID
    async fn delete(&self, id: i32) -> Result<(), DomainError>;
}

/// Input for creating an account
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub facility_id: Option<i32>,
    pub address: Option<String>,
    pub vehicle: Option<String>,
    pub license_number: Option<String>,
}

/// Input for updating an account
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub facility_id: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub vehicle: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub license_number: Option<Option<String>>,
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
pub(crate) fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

/// Repository trait for Profile entity
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find_by_id(&self, id: i32) -> Result<Option<profile::Model>, DomainError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<profile::Model>, DomainError>;

    /// List accounts with the given role, optionally filtered by status
    async fn list_by_role(
        &self,
        role: Role,
        status: Option<String>,
    ) -> Result<Vec<profile::Model>, DomainError>;

    async fn create(&self, input: NewProfile) -> Result<profile::Model, DomainError>;

    async fn update(&self, id: i32, input: ProfileUpdate) -> Result<profile::Model, DomainError>;

    /// Soft delete: the row stays for trip history, the account can no longer sign in
    async fn deactivate(&self, id: i32) -> Result<profile::Model, DomainError>;
}
