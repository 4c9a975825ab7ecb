use chrono::NaiveDate;
use serde::Deserialize;
use validator::Validate;

use super::empty_string_as_none;
use crate::models::ListPatientsFilter;

/// Body for both create and update; update replaces every editable column.
#[derive(Debug, Deserialize, Validate)]
pub struct PatientRequest {
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    #[validate(length(max = 20))]
    pub gender: Option<String>,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub address: Option<String>,
    pub medical_history: Option<String>,
    pub allergies: Option<String>,
    #[validate(length(max = 200))]
    pub insurance_provider: Option<String>,
    #[validate(length(max = 100))]
    pub insurance_number: Option<String>,
    #[validate(length(max = 200))]
    pub emergency_contact_name: Option<String>,
    #[validate(length(max = 40))]
    pub emergency_contact_phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListPatientsQuery {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub search: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub page: Option<i64>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub page_size: Option<i64>,
}

impl From<ListPatientsQuery> for ListPatientsFilter {
    fn from(q: ListPatientsQuery) -> Self {
        let defaults = ListPatientsFilter::default();
        Self {
            search: q.search,
            page: q.page.unwrap_or(defaults.page),
            page_size: q.page_size.unwrap_or(defaults.page_size),
        }
    }
}
