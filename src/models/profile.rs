use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Every account (dispatcher, driver, client, facility staff) is a profile row.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "profiles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: String,   // 'dispatcher', 'driver', 'client', 'facility'
    pub status: String, // 'active', 'inactive'
    pub facility_id: Option<i32>,
    pub address: Option<String>,
    pub vehicle: Option<String>,
    pub license_number: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::facility::Entity",
        from = "Column::FacilityId",
        to = "super::facility::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Facility,
}

impl Related<super::facility::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Facility.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

// DTO for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileDto {
    pub id: i32,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: String,
    pub status: String,
    pub facility_id: Option<i32>,
    pub address: Option<String>,
    pub vehicle: Option<String>,
    pub license_number: Option<String>,
    pub created_at: String,
}

impl From<Model> for ProfileDto {
    fn from(model: Model) -> Self {
        Self {
            full_name: model.full_name(),
            id: model.id,
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
            phone: model.phone,
            role: model.role,
            status: model.status,
            facility_id: model.facility_id,
            address: model.address,
            vehicle: model.vehicle,
            license_number: model.license_number,
            created_at: model.created_at,
        }
    }
}
