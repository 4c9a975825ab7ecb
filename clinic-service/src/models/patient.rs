//! Patient records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::{Appointment, Invoice, Treatment};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Patient {
    pub patient_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub medical_history: Option<String>,
    pub allergies: Option<String>,
    pub insurance_provider: Option<String>,
    pub insurance_number: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Filter parameters for listing patients.
#[derive(Debug, Clone)]
pub struct ListPatientsFilter {
    pub search: Option<String>,
    pub page: i64,
    pub page_size: i64,
}

impl Default for ListPatientsFilter {
    fn default() -> Self {
        Self {
            search: None,
            page: 1,
            page_size: 25,
        }
    }
}

impl ListPatientsFilter {
    pub fn limit(&self) -> i64 {
        self.page_size.clamp(1, 100)
    }

    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1).saturating_mul(self.limit())
    }
}

/// Everything recorded for one patient, as shown on the chart screen.
#[derive(Debug, Serialize)]
pub struct PatientHistory {
    pub patient: Patient,
    pub appointments: Vec<Appointment>,
    pub treatments: Vec<Treatment>,
    pub invoices: Vec<Invoice>,
}
