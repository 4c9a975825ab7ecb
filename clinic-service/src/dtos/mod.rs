//! Request and response bodies for the HTTP API.

pub mod appointments;
pub mod auth;
pub mod inventory;
pub mod invoices;
pub mod patients;
pub mod staff;
pub mod treatments;

use clinic_core::error::AppError;
use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;

use crate::models::max_money;

/// Query-string helper: `?dentist_id=` from an untouched form field means "no filter".
pub fn empty_string_as_none<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let opt = Option::<String>::deserialize(de)?;
    match opt.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse::<T>().map(Some).map_err(de::Error::custom),
    }
}

/// Money must be non-negative, fit `NUMERIC(12, 2)` and have at most two decimal places.
pub fn check_amount(field: &str, value: Decimal) -> Result<Decimal, AppError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "{} must not be negative",
            field
        )));
    }
    if value > max_money() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "{} must not exceed {}",
            field,
            max_money()
        )));
    }
    if value.scale() > 2 && value.round_dp(2) != value {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "{} must have at most two decimal places",
            field
        )));
    }
    Ok(value.round_dp(2))
}

/// Trim and drop blank optional text so the database stores NULL, not "".
pub fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
