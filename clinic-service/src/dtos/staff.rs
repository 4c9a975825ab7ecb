use serde::Deserialize;
use validator::Validate;

use super::empty_string_as_none;
use crate::models::{ListStaffFilter, Role};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateStaffRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    pub role: Role,
    #[validate(length(max = 200))]
    pub specialization: Option<String>,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateStaffRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    pub role: Option<Role>,
    #[validate(length(max = 200))]
    pub specialization: Option<String>,
    pub active: Option<bool>,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListStaffQuery {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub role: Option<Role>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub active: Option<bool>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub search: Option<String>,
}

impl From<ListStaffQuery> for ListStaffFilter {
    fn from(q: ListStaffQuery) -> Self {
        Self {
            role: q.role,
            active: q.active,
            search: q.search,
        }
    }
}
