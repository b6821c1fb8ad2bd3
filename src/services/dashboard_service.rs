//! Dashboard Service - headline numbers for the dispatcher home page

use chrono::{Days, NaiveDate};
use sea_orm::*;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::domain::{DomainError, InvoiceStatus, Role, TripStatus};
use crate::models::facility::{self, Entity as Facility};
use crate::models::invoice::{self, Entity as Invoice};
use crate::models::profile::{self, Entity as Profile};
use crate::models::trip::{self, Entity as Trip};
use crate::services::invoice_service;

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub trips_by_status: BTreeMap<&'static str, u64>,
    pub trips_today: u64,
    pub pending_approvals: u64,
    pub active_drivers: u64,
    pub active_facilities: u64,
    pub outstanding_invoices: u64,
    pub outstanding_amount: f64,
    pub revenue: f64,
    pub payments_awaiting_verification: u64,
}

pub async fn stats(db: &DatabaseConnection, today: NaiveDate) -> Result<DashboardStats, DomainError> {
    let mut trips_by_status = BTreeMap::new();
    for status in TripStatus::ALL {
        let count = Trip::find()
            .filter(trip::Column::Status.eq(status.as_str()))
            .count(db)
            .await?;
        trips_by_status.insert(status.as_str(), count);
    }

    let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
    let trips_today = Trip::find()
        .filter(trip::Column::PickupTime.gte(today.format("%Y-%m-%d").to_string()))
        .filter(trip::Column::PickupTime.lt(tomorrow.format("%Y-%m-%d").to_string()))
        .filter(trip::Column::Status.ne(TripStatus::Cancelled.as_str()))
        .count(db)
        .await?;

    let active_drivers = Profile::find()
        .filter(profile::Column::Role.eq(Role::Driver.as_str()))
        .filter(profile::Column::Status.eq("active"))
        .count(db)
        .await?;

    let active_facilities = Facility::find()
        .filter(facility::Column::IsActive.eq(true))
        .count(db)
        .await?;

    let invoices = Invoice::find()
        .filter(invoice::Column::Status.is_in([
            InvoiceStatus::Pending.as_str(),
            InvoiceStatus::Overdue.as_str(),
            InvoiceStatus::Paid.as_str(),
        ]))
        .all(db)
        .await?;

    let (paid, outstanding): (Vec<_>, Vec<_>) = invoices
        .iter()
        .partition(|i| i.status == InvoiceStatus::Paid.as_str());

    let payments_awaiting_verification = invoice_service::awaiting_verification()
        .count(db)
        .await?;

    Ok(DashboardStats {
        pending_approvals: trips_by_status
            .get(TripStatus::Pending.as_str())
            .copied()
            .unwrap_or_default(),
        trips_by_status,
        trips_today,
        active_drivers,
        active_facilities,
        outstanding_invoices: outstanding.len() as u64,
        outstanding_amount: outstanding.iter().map(|i| i.amount).sum(),
        revenue: paid.iter().map(|i| i.amount).sum(),
        payments_awaiting_verification,
    })
}
