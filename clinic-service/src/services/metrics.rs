//! Prometheus recorder and the domain metrics recorded by handlers and queries.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder. Safe to call more than once.
///
/// If another recorder is already installed the handle is kept detached so
/// `/metrics` still renders.
pub fn init_metrics() {
    METRICS_HANDLE.get_or_init(|| match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => handle,
        Err(e) => {
            tracing::warn!(error = %e, "Prometheus recorder not installed");
            PrometheusBuilder::new().build_recorder().handle()
        }
    });
}

/// Current metrics in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

/// Records `clinic_db_query_duration_seconds` for one operation when dropped.
pub struct QueryTimer {
    operation: &'static str,
    started: Instant,
}

impl QueryTimer {
    pub fn start(operation: &'static str) -> Self {
        Self {
            operation,
            started: Instant::now(),
        }
    }
}

impl Drop for QueryTimer {
    fn drop(&mut self) {
        metrics::histogram!("clinic_db_query_duration_seconds", "operation" => self.operation)
            .record(self.started.elapsed().as_secs_f64());
    }
}

pub fn record_appointment(status: &'static str) {
    metrics::counter!("clinic_appointments_total", "status" => status).increment(1);
}

pub fn record_invoice(status: &'static str) {
    metrics::counter!("clinic_invoices_total", "status" => status).increment(1);
}

pub fn record_payment(method: &'static str) {
    metrics::counter!("clinic_payments_total", "method" => method).increment(1);
}
