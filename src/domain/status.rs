//! Lifecycle vocabularies stored as text columns.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Pending,
    Upcoming,
    ApprovedPendingPayment,
    PaidInProgress,
    Completed,
    Cancelled,
}

impl TripStatus {
    pub const ALL: [TripStatus; 6] = [
        TripStatus::Pending,
        TripStatus::Upcoming,
        TripStatus::ApprovedPendingPayment,
        TripStatus::PaidInProgress,
        TripStatus::Completed,
        TripStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Pending => "pending",
            TripStatus::Upcoming => "upcoming",
            TripStatus::ApprovedPendingPayment => "approved_pending_payment",
            TripStatus::PaidInProgress => "paid_in_progress",
            TripStatus::Completed => "completed",
            TripStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TripStatus::Completed | TripStatus::Cancelled)
    }

    /// Whether `action` may be applied to a trip currently in this status.
    pub fn allows(&self, action: TripAction) -> bool {
        match action {
            TripAction::Approve => matches!(self, TripStatus::Pending),
            TripAction::Complete => {
                matches!(self, TripStatus::PaidInProgress | TripStatus::Upcoming)
            }
            TripAction::Reject => matches!(
                self,
                TripStatus::Pending | TripStatus::Upcoming | TripStatus::ApprovedPendingPayment
            ),
        }
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TripStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TripStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::Validation(format!("Unknown trip status '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripAction {
    Approve,
    Reject,
    Complete,
}

impl TripAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripAction::Approve => "approve",
            TripAction::Reject => "reject",
            TripAction::Complete => "complete",
        }
    }
}

impl FromStr for TripAction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(TripAction::Approve),
            "reject" => Ok(TripAction::Reject),
            "complete" => Ok(TripAction::Complete),
            other => Err(DomainError::Validation(format!(
                "Invalid action '{}'. Must be 'approve', 'reject' or 'complete'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Dispatcher,
    Driver,
    Client,
    Facility,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Dispatcher => "dispatcher",
            Role::Driver => "driver",
            Role::Client => "client",
            Role::Facility => "facility",
        }
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dispatcher" => Ok(Role::Dispatcher),
            "driver" => Ok(Role::Driver),
            "client" => Ok(Role::Client),
            "facility" => Ok(Role::Facility),
            other => Err(DomainError::Validation(format!("Unknown role '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for InvoiceStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InvoiceStatus::Pending),
            "paid" => Ok(InvoiceStatus::Paid),
            "overdue" => Ok(InvoiceStatus::Overdue),
            "cancelled" => Ok(InvoiceStatus::Cancelled),
            other => Err(DomainError::Validation(format!(
                "Invalid invoice status '{}'. Must be 'pending', 'paid', 'overdue' or 'cancelled'",
                other
            ))),
        }
    }
}
