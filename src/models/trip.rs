use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "trips")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: Option<i32>,
    pub managed_client_id: Option<i32>,
    pub facility_id: Option<i32>,
    pub driver_id: Option<i32>,
    pub pickup_address: String,
    pub destination_address: String,
    pub pickup_time: String,
    pub return_pickup_time: Option<String>,
    pub is_round_trip: bool,
    pub wheelchair_type: Option<String>,
    pub additional_passengers: i32,
    pub distance_miles: Option<f64>,
    pub price: Option<f64>,
    // 'pending', 'upcoming', 'approved_pending_payment', 'paid_in_progress', 'completed', 'cancelled'
    pub status: String,
    pub payment_method_id: Option<String>,
    pub payment_status: Option<String>, // 'paid', 'pending'
    pub payment_intent_id: Option<String>,
    pub payment_note: Option<String>,
    pub cancellation_reason: Option<String>,
    pub notes: Option<String>,
    pub approved_at: Option<String>,
    pub completed_at: Option<String>,
    pub cancelled_at: Option<String>,
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
    #[sea_orm(
        belongs_to = "super::managed_client::Entity",
        from = "Column::ManagedClientId",
        to = "super::managed_client::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    ManagedClient,
    #[sea_orm(
        belongs_to = "super::profile::Entity",
        from = "Column::UserId",
        to = "super::profile::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Rider,
    #[sea_orm(
        belongs_to = "super::profile::Entity",
        from = "Column::DriverId",
        to = "super::profile::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Driver,
}

impl Related<super::facility::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Facility.def()
    }
}

impl Related<super::managed_client::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ManagedClient.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Individual riders with a saved card and a priced trip are charged on approval;
    /// facility trips are invoiced.
    pub fn is_payment_eligible(&self) -> bool {
        self.user_id.is_some()
            && self.facility_id.is_none()
            && self.price.is_some_and(|p| p > 0.0)
            && self
                .payment_method_id
                .as_deref()
                .is_some_and(|pm| !pm.trim().is_empty())
    }
}
