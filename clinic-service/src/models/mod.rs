//! Domain models for clinic-service.

mod appointment;
mod dashboard;
mod inventory;
mod invoice;
mod patient;
mod staff;
mod treatment;

pub use appointment::{
    Appointment, AppointmentRecord, AppointmentStatus, ListAppointmentsFilter, ScheduleSlot,
    MINUTES_PER_DAY,
};
pub use dashboard::DashboardSummary;
pub use inventory::{InventoryItem, ListInventoryFilter};
pub use invoice::{
    invoice_number, line_amount, max_money, Invoice, InvoiceDetail, InvoiceItem, InvoiceStatus,
    InvoiceTotals, ListInvoicesFilter, Payment, PaymentMethod,
};
pub use patient::{ListPatientsFilter, Patient, PatientHistory};
pub use staff::{ListStaffFilter, Role, Staff};
pub use treatment::{ListTreatmentsFilter, Treatment, TreatmentRecord, TreatmentStatus};

use serde::Serialize;

/// One page of a list endpoint.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}
