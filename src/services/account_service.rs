//! Account Service - dispatcher-managed driver and client accounts

use sea_orm::*;
use serde::{Deserialize, Serialize};

use crate::auth::{generate_temporary_password, hash_password};
use crate::domain::{DomainError, NewProfile, ProfileUpdate, Role, TripStatus};
use crate::infrastructure::AppState;
use crate::models::ProfileDto;
use crate::models::facility::Entity as Facility;
use crate::models::trip::{self, Entity as Trip};

/// Payload for creating a driver, client or facility account
#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub facility_id: Option<i32>,
    pub address: Option<String>,
    pub vehicle: Option<String>,
    pub license_number: Option<String>,
}

/// The created account plus the password to hand to its owner. Shown once.
#[derive(Debug, Serialize)]
pub struct CreatedAccount {
    pub profile: ProfileDto,
    pub temporary_password: String,
}

pub async fn create_account(
    state: &AppState,
    role: Role,
    input: NewAccount,
) -> Result<CreatedAccount, DomainError> {
    if input.first_name.trim().is_empty() || input.last_name.trim().is_empty() {
        return Err(DomainError::Validation(
            "first_name and last_name are required".to_string(),
        ));
    }

    match role {
        Role::Facility => {
            let facility_id = input.facility_id.ok_or_else(|| {
                DomainError::Validation("facility_id is required for facility accounts".to_string())
            })?;
            Facility::find_by_id(facility_id)
                .one(state.db())
                .await?
                .ok_or(DomainError::NotFound("Facility"))?;
        }
        Role::Dispatcher => {
            return Err(DomainError::Validation(
                "Dispatcher accounts cannot be created here".to_string(),
            ));
        }
        Role::Driver | Role::Client => {}
    }

    let temporary_password = generate_temporary_password();
    let password_hash = hash_password(&temporary_password).map_err(DomainError::External)?;

    let profile = state
        .profile_repo
        .create(NewProfile {
            email: input.email,
            password_hash,
            first_name: input.first_name,
            last_name: input.last_name,
            phone: input.phone,
            role,
            facility_id: if role == Role::Facility {
                input.facility_id
            } else {
                None
            },
            address: input.address,
            vehicle: if role == Role::Driver { input.vehicle } else { None },
            license_number: if role == Role::Driver {
                input.license_number
            } else {
                None
            },
        })
        .await?;

    tracing::info!("Created {} account {}", role.as_str(), profile.id);

    Ok(CreatedAccount {
        profile: profile.into(),
        temporary_password,
    })
}

/// Load a profile and check it has the expected role, so `/drivers/:id`
/// cannot be used to read a client.
pub async fn find_with_role(
    state: &AppState,
    id: i32,
    role: Role,
    label: &'static str,
) -> Result<crate::models::profile::Model, DomainError> {
    state
        .profile_repo
        .find_by_id(id)
        .await?
        .filter(|p| p.role == role.as_str())
        .ok_or(DomainError::NotFound(label))
}

fn open_statuses() -> Vec<&'static str> {
    TripStatus::ALL
        .into_iter()
        .filter(|s| !s.is_terminal())
        .map(|s| s.as_str())
        .collect()
}

/// Soft delete a driver. Drivers still assigned to open trips must be unassigned first.
async fn ensure_no_open_trips(state: &AppState, driver_id: i32) -> Result<(), DomainError> {
    let open_trips = Trip::find()
        .filter(trip::Column::DriverId.eq(driver_id))
        .filter(trip::Column::Status.is_in(open_statuses()))
        .count(state.db())
        .await?;
    if open_trips > 0 {
        return Err(DomainError::InvalidState(format!(
            "Driver has {} open trip(s). Reassign them before deactivating",
            open_trips
        )));
    }
    Ok(())
}

/// Edit a driver profile. Setting the status to inactive goes through the
/// same open-trip check as deactivation.
pub async fn update_driver(
    state: &AppState,
    id: i32,
    update: ProfileUpdate,
) -> Result<ProfileDto, DomainError> {
    let driver = find_with_role(state, id, Role::Driver, "Driver").await?;
    if let Some(status) = update.status.as_deref() {
        if status != "active" && status != "inactive" {
            return Err(DomainError::Validation(format!(
                "Unknown profile status '{}'",
                status
            )));
        }
        if status == "inactive" && driver.status != "inactive" {
            ensure_no_open_trips(state, id).await?;
        }
    }
    Ok(state.profile_repo.update(id, update).await?.into())
}

pub async fn deactivate_driver(state: &AppState, id: i32) -> Result<ProfileDto, DomainError> {
    find_with_role(state, id, Role::Driver, "Driver").await?;
    ensure_no_open_trips(state, id).await?;

    let profile = state.profile_repo.deactivate(id).await?;
    tracing::info!("Driver {} deactivated", id);
    Ok(profile.into())
}

pub async fn deactivate_client(state: &AppState, id: i32) -> Result<ProfileDto, DomainError> {
    find_with_role(state, id, Role::Client, "Client").await?;
    let profile = state.profile_repo.deactivate(id).await?;
    tracing::info!("Client {} deactivated", id);
    Ok(profile.into())
}

#[cfg(test)]
mod tests {
    use super::open_statuses;

    #[test]
    fn open_statuses_exclude_terminal() {
        let open = open_statuses();
        assert_eq!(open.len(), 4);
        assert!(!open.contains(&"completed"));
        assert!(!open.contains(&"cancelled"));
    }
}
