//! Staff accounts and roles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Staff role. Stored as lower-case text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Dentist,
    Receptionist,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Dentist => "dentist",
            Role::Receptionist => "receptionist",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "dentist" => Ok(Role::Dentist),
            "receptionist" => Ok(Role::Receptionist),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// Staff member. The password hash is neither serialized nor printed.
#[derive(Clone, Serialize, FromRow)]
pub struct Staff {
    pub staff_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: String,
    pub specialization: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub active: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl fmt::Debug for Staff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Staff")
            .field("staff_id", &self.staff_id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("phone", &self.phone)
            .field("role", &self.role)
            .field("specialization", &self.specialization)
            .field("password_hash", &"***")
            .field("active", &self.active)
            .field("created_utc", &self.created_utc)
            .field("updated_utc", &self.updated_utc)
            .finish()
    }
}

/// Filter parameters for listing staff.
#[derive(Debug, Clone, Default)]
pub struct ListStaffFilter {
    pub role: Option<Role>,
    pub active: Option<bool>,
    pub search: Option<String>,
}
