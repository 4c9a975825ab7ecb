//! Treatment model.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Treatment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreatmentStatus {
    Planned,
    InProgress,
    Completed,
    Cancelled,
}

impl TreatmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TreatmentStatus::Planned => "planned",
            TreatmentStatus::InProgress => "in_progress",
            TreatmentStatus::Completed => "completed",
            TreatmentStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for TreatmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planned" => Ok(TreatmentStatus::Planned),
            "in_progress" => Ok(TreatmentStatus::InProgress),
            "completed" => Ok(TreatmentStatus::Completed),
            "cancelled" => Ok(TreatmentStatus::Cancelled),
            other => Err(format!("Unknown treatment status: {}", other)),
        }
    }
}

/// Treatment joined with patient and dentist names.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Treatment {
    pub treatment_id: Uuid,
    pub patient_id: Uuid,
    pub dentist_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub treatment_name: String,
    pub tooth_number: Option<i16>,
    pub description: Option<String>,
    pub cost: Decimal,
    pub status: String,
    pub treatment_date: NaiveDate,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
    pub patient_name: String,
    pub dentist_name: String,
}

/// Resolved values written by create and update.
#[derive(Debug, Clone)]
pub struct TreatmentRecord {
    pub patient_id: Uuid,
    pub dentist_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub treatment_name: String,
    pub tooth_number: Option<i16>,
    pub description: Option<String>,
    pub cost: Decimal,
    pub status: TreatmentStatus,
    pub treatment_date: NaiveDate,
    pub notes: Option<String>,
}

/// Filter parameters for listing treatments.
#[derive(Debug, Clone, Default)]
pub struct ListTreatmentsFilter {
    pub patient_id: Option<Uuid>,
    pub dentist_id: Option<Uuid>,
    pub status: Option<TreatmentStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}
