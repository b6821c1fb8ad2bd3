use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub invoice_number: String,
    pub facility_id: Option<i32>,
    pub user_id: Option<i32>,
    pub amount: f64,
    pub status: String, // 'pending', 'paid', 'overdue', 'cancelled'
    pub period_start: Option<String>,
    pub period_end: Option<String>,
    pub due_date: String,
    pub trip_ids: String, // JSON array of trip ids
    pub payment_reference: Option<String>,
    pub payment_claimed_at: Option<String>,
    pub payment_verified_at: Option<String>,
    pub verified_by: Option<i32>,
    pub verification_notes: Option<String>,
    pub notes: Option<String>,
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
    pub fn trip_id_list(&self) -> Vec<i32> {
        serde_json::from_str(&self.trip_ids).unwrap_or_default()
    }
}
