//! Appointment model and the slot arithmetic used for double-booking checks.

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Appointment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }

    /// Whether an appointment in this status occupies the dentist's chair.
    pub fn occupies_slot(&self) -> bool {
        !matches!(
            self,
            AppointmentStatus::Cancelled | AppointmentStatus::NoShow
        )
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(AppointmentStatus::Scheduled),
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            "no_show" => Ok(AppointmentStatus::NoShow),
            other => Err(format!("Unknown appointment status: {}", other)),
        }
    }
}

/// Appointment joined with patient and dentist names.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Appointment {
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub dentist_id: Uuid,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: i32,
    pub status: String,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
    pub patient_name: String,
    pub dentist_name: String,
}

/// Resolved values written by create and full update.
#[derive(Debug, Clone)]
pub struct AppointmentRecord {
    pub patient_id: Uuid,
    pub dentist_id: Uuid,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: i32,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

impl AppointmentRecord {
    pub fn slot(&self) -> ScheduleSlot {
        ScheduleSlot::new(self.start_time, self.duration_minutes)
    }
}

/// Half-open `[start, start + duration)` interval within one day, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleSlot {
    start: u32,
    end: u32,
}

impl ScheduleSlot {
    pub fn new(start_time: NaiveTime, duration_minutes: i32) -> Self {
        let start = start_time.hour() * 60 + start_time.minute();
        let end = start + duration_minutes.max(0) as u32;
        Self { start, end }
    }

    /// False when the slot runs past midnight.
    pub fn fits_in_day(&self) -> bool {
        self.end <= MINUTES_PER_DAY
    }

    pub fn overlaps(&self, other: &ScheduleSlot) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Filter parameters for listing appointments.
#[derive(Debug, Clone, Default)]
pub struct ListAppointmentsFilter {
    pub date: Option<NaiveDate>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub dentist_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(h: u32, m: u32, duration: i32) -> ScheduleSlot {
        ScheduleSlot::new(NaiveTime::from_hms_opt(h, m, 0).unwrap(), duration)
    }

    #[test]
    fn overlapping_slots_conflict() {
        assert!(slot(9, 0, 60).overlaps(&slot(9, 30, 30)));
        assert!(slot(9, 30, 30).overlaps(&slot(9, 0, 60)));
        assert!(slot(9, 0, 120).overlaps(&slot(9, 30, 15)));
    }

    #[test]
    fn back_to_back_slots_do_not_conflict() {
        assert!(!slot(9, 0, 30).overlaps(&slot(9, 30, 30)));
        assert!(!slot(10, 0, 30).overlaps(&slot(9, 30, 30)));
    }

    #[test]
    fn slot_past_midnight_does_not_fit() {
        assert!(!slot(23, 30, 60).fits_in_day());
        assert!(slot(23, 0, 60).fits_in_day());
    }

    #[test]
    fn cancelled_and_no_show_free_the_slot() {
        assert!(AppointmentStatus::Scheduled.occupies_slot());
        assert!(AppointmentStatus::Completed.occupies_slot());
        assert!(!AppointmentStatus::Cancelled.occupies_slot());
        assert!(!AppointmentStatus::NoShow.occupies_slot());
        assert_eq!("no_show".parse(), Ok(AppointmentStatus::NoShow));
    }
}
