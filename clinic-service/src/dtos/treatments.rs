use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::empty_string_as_none;
use crate::models::{ListTreatmentsFilter, TreatmentStatus};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TreatmentRequest {
    pub patient_id: Uuid,
    pub dentist_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200, message = "Treatment name is required"))]
    pub treatment_name: String,
    #[validate(range(min = 1, max = 85, message = "Tooth number must be 1 to 85"))]
    pub tooth_number: Option<i16>,
    pub description: Option<String>,
    #[serde(default)]
    pub cost: Decimal,
    pub status: Option<TreatmentStatus>,
    /// Defaults to today.
    pub treatment_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListTreatmentsQuery {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub patient_id: Option<Uuid>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub dentist_id: Option<Uuid>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub status: Option<TreatmentStatus>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub from: Option<NaiveDate>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub to: Option<NaiveDate>,
}

impl From<ListTreatmentsQuery> for ListTreatmentsFilter {
    fn from(q: ListTreatmentsQuery) -> Self {
        Self {
            patient_id: q.patient_id,
            dentist_id: q.dentist_id,
            status: q.status,
            from: q.from,
            to: q.to,
        }
    }
}
