//! SeaORM implementation of ProfileRepository

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::domain::{DomainError, NewProfile, ProfileRepository, ProfileUpdate, Role};
use crate::models::profile::{self, ActiveModel, Column, Entity as ProfileEntity};

/// SeaORM-based implementation of ProfileRepository
pub struct SeaOrmProfileRepository {
    db: DatabaseConnection,
}

impl SeaOrmProfileRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProfileRepository for SeaOrmProfileRepository {
    async fn find_by_id(&self, id: i32) -> Result<Option<profile::Model>, DomainError> {
        Ok(ProfileEntity::find_by_id(id).one(&self.db).await?)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<profile::Model>, DomainError> {
        Ok(ProfileEntity::find()
            .filter(Column::Email.eq(email.trim().to_lowercase()))
            .one(&self.db)
            .await?)
    }

    async fn list_by_role(
        &self,
        role: Role,
        status: Option<String>,
    ) -> Result<Vec<profile::Model>, DomainError> {
        let mut query = ProfileEntity::find().filter(Column::Role.eq(role.as_str()));

        if let Some(status) = status
            && !status.is_empty()
        {
            query = query.filter(Column::Status.eq(status));
        }

        Ok(query
            .order_by_asc(Column::LastName)
            .order_by_asc(Column::FirstName)
            .all(&self.db)
            .await?)
    }

    async fn create(&self, input: NewProfile) -> Result<profile::Model, DomainError> {
        let email = input.email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(DomainError::Validation("A valid email is required".to_string()));
        }
        if self.find_by_email(&email).await?.is_some() {
            return Err(DomainError::Conflict(format!(
                "An account with email {} already exists",
                email
            )));
        }

        let now = chrono::Utc::now().to_rfc3339();
        let new_profile = ActiveModel {
            email: Set(email),
            password_hash: Set(input.password_hash),
            first_name: Set(input.first_name.trim().to_string()),
            last_name: Set(input.last_name.trim().to_string()),
            phone: Set(input.phone),
            role: Set(input.role.as_str().to_string()),
            status: Set("active".to_string()),
            facility_id: Set(input.facility_id),
            address: Set(input.address),
            vehicle: Set(input.vehicle),
            license_number: Set(input.license_number),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        Ok(new_profile.insert(&self.db).await?)
    }

    async fn update(&self, id: i32, input: ProfileUpdate) -> Result<profile::Model, DomainError> {
        let existing = ProfileEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(DomainError::NotFound("Profile"))?;

        let mut active: ActiveModel = existing.into();

        if let Some(first_name) = input.first_name {
            active.first_name = Set(first_name.trim().to_string());
        }
        if let Some(last_name) = input.last_name {
            active.last_name = Set(last_name.trim().to_string());
        }
        if let Some(phone) = input.phone {
            active.phone = Set(phone);
        }
        if let Some(status) = input.status {
            if status != "active" && status != "inactive" {
                return Err(DomainError::Validation(
                    "Invalid status. Must be 'active' or 'inactive'".to_string(),
                ));
            }
            active.status = Set(status);
        }
        if let Some(facility_id) = input.facility_id {
            active.facility_id = Set(facility_id);
        }
        if let Some(address) = input.address {
            active.address = Set(address);
        }
        if let Some(vehicle) = input.vehicle {
            active.vehicle = Set(vehicle);
        }
        if let Some(license) = input.license_number {
            active.license_number = Set(license);
        }
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        Ok(active.update(&self.db).await?)
    }

    async fn deactivate(&self, id: i32) -> Result<profile::Model, DomainError> {
        self.update(
            id,
            ProfileUpdate {
                status: Some("inactive".to_string()),
                ..Default::default()
            },
        )
        .await
    }
}
