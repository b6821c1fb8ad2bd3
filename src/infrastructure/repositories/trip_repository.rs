//! SeaORM implementation of TripRepository

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use std::collections::HashMap;

use crate::domain::{DomainError, NewTrip, TripFilter, TripRepository, TripUpdate, TripView};
use crate::models::facility::Entity as FacilityEntity;
use crate::models::managed_client::Entity as ManagedClientEntity;
use crate::models::profile::{self, Entity as ProfileEntity};
use crate::models::trip::{self, ActiveModel, Column, Entity as TripEntity};

/// SeaORM-based implementation of TripRepository
pub struct SeaOrmTripRepository {
    db: DatabaseConnection,
}

impl SeaOrmTripRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Resolve rider, driver and facility names in three batched queries.
    async fn attach_names(&self, trips: Vec<trip::Model>) -> Result<Vec<TripView>, DomainError> {
        let mut profile_ids: Vec<i32> = trips
            .iter()
            .flat_map(|t| [t.user_id, t.driver_id])
            .flatten()
            .collect();
        profile_ids.sort_unstable();
        profile_ids.dedup();

        let client_ids: Vec<i32> = trips.iter().filter_map(|t| t.managed_client_id).collect();
        let facility_ids: Vec<i32> = trips.iter().filter_map(|t| t.facility_id).collect();

        let mut profile_names: HashMap<i32, String> = HashMap::new();
        if !profile_ids.is_empty() {
            for p in ProfileEntity::find()
                .filter(profile::Column::Id.is_in(profile_ids))
                .all(&self.db)
                .await?
            {
                profile_names.insert(p.id, p.full_name());
            }
        }

        let mut client_names: HashMap<i32, String> = HashMap::new();
        if !client_ids.is_empty() {
            for c in ManagedClientEntity::find()
                .filter(crate::models::managed_client::Column::Id.is_in(client_ids))
                .all(&self.db)
                .await?
            {
                client_names.insert(c.id, c.full_name());
            }
        }

        let mut facility_names: HashMap<i32, String> = HashMap::new();
        if !facility_ids.is_empty() {
            for f in FacilityEntity::find()
                .filter(crate::models::facility::Column::Id.is_in(facility_ids))
                .all(&self.db)
                .await?
            {
                facility_names.insert(f.id, f.name);
            }
        }

        Ok(trips
            .into_iter()
            .map(|trip| {
                let rider_name = trip
                    .user_id
                    .and_then(|id| profile_names.get(&id).cloned())
                    .or_else(|| {
                        trip.managed_client_id
                            .and_then(|id| client_names.get(&id).cloned())
                    });
                let driver_name = trip.driver_id.and_then(|id| profile_names.get(&id).cloned());
                let facility_name = trip
                    .facility_id
                    .and_then(|id| facility_names.get(&id).cloned());
                TripView {
                    trip,
                    rider_name,
                    driver_name,
                    facility_name,
                }
            })
            .collect())
    }
}

/// Date-only upper bounds cover the whole day.
fn upper_bound(to: &str) -> (String, bool) {
    match NaiveDate::parse_from_str(to, "%Y-%m-%d") {
        Ok(date) => match date.checked_add_days(Days::new(1)) {
            Some(next) => (next.format("%Y-%m-%d").to_string(), false),
            None => (to.to_string(), true),
        },
        Err(_) => (to.to_string(), true),
    }
}

#[async_trait]
impl TripRepository for SeaOrmTripRepository {
    async fn find_all(&self, filter: TripFilter) -> Result<Vec<TripView>, DomainError> {
        let mut query = TripEntity::find();

        if let Some(status) = &filter.status
            && !status.is_empty()
        {
            let statuses: Vec<&str> = status.split(',').map(str::trim).collect();
            query = query.filter(Column::Status.is_in(statuses));
        }
        if let Some(driver_id) = filter.driver_id {
            query = query.filter(Column::DriverId.eq(driver_id));
        }
        if let Some(facility_id) = filter.facility_id {
            query = query.filter(Column::FacilityId.eq(facility_id));
        }
        if let Some(user_id) = filter.user_id {
            query = query.filter(Column::UserId.eq(user_id));
        }
        if let Some(client_id) = filter.managed_client_id {
            query = query.filter(Column::ManagedClientId.eq(client_id));
        }
        if let Some(from) = &filter.from
            && !from.is_empty()
        {
            query = query.filter(Column::PickupTime.gte(from.as_str()));
        }
        if let Some(to) = &filter.to
            && !to.is_empty()
        {
            let (bound, inclusive) = upper_bound(to);
            query = if inclusive {
                query.filter(Column::PickupTime.lte(bound))
            } else {
                query.filter(Column::PickupTime.lt(bound))
            };
        }

        query = query
            .order_by_desc(Column::PickupTime)
            .order_by_desc(Column::Id);
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }

        let trips = query.all(&self.db).await?;
        self.attach_names(trips).await
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<trip::Model>, DomainError> {
        Ok(TripEntity::find_by_id(id).one(&self.db).await?)
    }

    async fn create(&self, input: NewTrip, status: &str) -> Result<trip::Model, DomainError> {
        let now = chrono::Utc::now().to_rfc3339();

        let new_trip = ActiveModel {
            user_id: Set(input.user_id),
            managed_client_id: Set(input.managed_client_id),
            facility_id: Set(input.facility_id),
            driver_id: Set(None),
            pickup_address: Set(input.pickup_address),
            destination_address: Set(input.destination_address),
            pickup_time: Set(input.pickup_time),
            return_pickup_time: Set(input.return_pickup_time),
            is_round_trip: Set(input.is_round_trip),
            wheelchair_type: Set(input.wheelchair_type),
            additional_passengers: Set(input.additional_passengers),
            distance_miles: Set(input.distance_miles),
            price: Set(input.price),
            status: Set(status.to_string()),
            payment_method_id: Set(input.payment_method_id),
            payment_status: Set(None),
            payment_intent_id: Set(None),
            payment_note: Set(None),
            cancellation_reason: Set(None),
            notes: Set(input.notes),
            approved_at: Set(None),
            completed_at: Set(None),
            cancelled_at: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        Ok(new_trip.insert(&self.db).await?)
    }

    async fn update(&self, id: i32, input: TripUpdate) -> Result<trip::Model, DomainError> {
        let existing = TripEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(DomainError::NotFound("Trip"))?;

        let mut active: ActiveModel = existing.into();

        if let Some(pickup) = input.pickup_address {
            active.pickup_address = Set(pickup);
        }
        if let Some(destination) = input.destination_address {
            active.destination_address = Set(destination);
        }
        if let Some(time) = input.pickup_time {
            active.pickup_time = Set(time);
        }
        if let Some(time) = input.return_pickup_time {
            active.return_pickup_time = Set(time);
        }
        if let Some(round_trip) = input.is_round_trip {
            active.is_round_trip = Set(round_trip);
        }
        if let Some(wheelchair) = input.wheelchair_type {
            active.wheelchair_type = Set(wheelchair);
        }
        if let Some(passengers) = input.additional_passengers {
            active.additional_passengers = Set(passengers);
        }
        if let Some(distance) = input.distance_miles {
            active.distance_miles = Set(distance);
        }
        if let Some(price) = input.price {
            active.price = Set(price);
        }
        if let Some(notes) = input.notes {
            active.notes = Set(notes);
        }
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        Ok(active.update(&self.db).await?)
    }

    async fn delete(&self, id: i32) -> Result<(), DomainError> {
        let result = TripEntity::delete_by_id(id).exec(&self.db).await?;

        if result.rows_affected == 0 {
            return Err(DomainError::NotFound("Trip"));
        }

        Ok(())
    }
}
