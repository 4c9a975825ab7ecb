use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::empty_string_as_none;
use crate::models::{AppointmentStatus, ListAppointmentsFilter};

/// Body for booking and rescheduling.
///
/// `dentist_id` may be omitted by dentists (they book for themselves) and on
/// update (keeps the current dentist).
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AppointmentRequest {
    pub patient_id: Uuid,
    pub dentist_id: Option<Uuid>,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    #[validate(range(min = 5, max = 480, message = "Duration must be 5 to 480 minutes"))]
    pub duration_minutes: i32,
    pub status: Option<AppointmentStatus>,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAppointmentStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListAppointmentsQuery {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub from: Option<NaiveDate>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub to: Option<NaiveDate>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub dentist_id: Option<Uuid>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub patient_id: Option<Uuid>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub status: Option<AppointmentStatus>,
}

impl From<ListAppointmentsQuery> for ListAppointmentsFilter {
    fn from(q: ListAppointmentsQuery) -> Self {
        Self {
            date: q.date,
            from: q.from,
            to: q.to,
            dentist_id: q.dentist_id,
            patient_id: q.patient_id,
            status: q.status,
        }
    }
}
