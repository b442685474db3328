//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};
use prometheus::core::Collector;

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Lifecycle Metrics
    pub static ref LIFECYCLE_TRANSITIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("questboard_lifecycle_transitions_total", "Total number of successful quest lifecycle transitions"),
        &["transition"]
    ).expect("metric can be created");
    pub static ref LIFECYCLE_REJECTIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("questboard_lifecycle_rejections_total", "Total number of lifecycle operations refused by a business rule"),
        &["reason"]
    ).expect("metric can be created");

    // Database Metrics
    pub static ref DB_QUERY_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "questboard_db_query_duration_seconds",
            "Database query duration in seconds"
        ).buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        &["operation"]
    ).expect("metric can be created");

    // Scheduler Metrics
    pub static ref SCHEDULER_RUNS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("questboard_scheduler_runs_total", "Total number of scheduler checks"),
        &["check", "status"]
    ).expect("metric can be created");
    pub static ref DEADLINE_EVENTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("questboard_deadline_events_total", "Total number of deadline warnings, expirations and recurring instances"),
        &["event"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("questboard_errors_total", "Total number of error responses"),
        &["error_type"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
///
/// Safe to call more than once; collectors already registered are skipped.
pub fn init_metrics() {
    let collectors: [(&str, Box<dyn Collector>); 6] = [
        (
            "LIFECYCLE_TRANSITIONS_TOTAL",
            Box::new(LIFECYCLE_TRANSITIONS_TOTAL.clone()),
        ),
        (
            "LIFECYCLE_REJECTIONS_TOTAL",
            Box::new(LIFECYCLE_REJECTIONS_TOTAL.clone()),
        ),
        (
            "DB_QUERY_DURATION_SECONDS",
            Box::new(DB_QUERY_DURATION_SECONDS.clone()),
        ),
        ("SCHEDULER_RUNS_TOTAL", Box::new(SCHEDULER_RUNS_TOTAL.clone())),
        ("DEADLINE_EVENTS_TOTAL", Box::new(DEADLINE_EVENTS_TOTAL.clone())),
        ("ERRORS_TOTAL", Box::new(ERRORS_TOTAL.clone())),
    ];

    for (name, collector) in collectors {
        match REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(error) => tracing::warn!(metric = name, %error, "Failed to register metric"),
        }
    }

    tracing::info!("Metrics registry initialized");
}

/// Record the latency of one store operation.
pub fn observe_db_query(operation: &str, elapsed: Duration) {
    DB_QUERY_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(elapsed.as_secs_f64());
}

/// Count a successful lifecycle transition (accept, submit, approve, reject).
pub fn record_transition(transition: &str) {
    LIFECYCLE_TRANSITIONS_TOTAL
        .with_label_values(&[transition])
        .inc();
}

/// Count a lifecycle operation refused by a business rule.
pub fn record_rejection(reason: &str) {
    LIFECYCLE_REJECTIONS_TOTAL.with_label_values(&[reason]).inc();
}

pub fn record_scheduler_run(check: &str, status: &str) {
    SCHEDULER_RUNS_TOTAL.with_label_values(&[check, status]).inc();
}

pub fn record_deadline_event(event: &str) {
    DEADLINE_EVENTS_TOTAL.with_label_values(&[event]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_metrics_is_repeatable() {
        init_metrics();
        init_metrics();

        record_transition("accept");
        let families = REGISTRY.gather();
        assert!(
            families
                .iter()
                .any(|family| family.get_name() == "questboard_lifecycle_transitions_total")
        );
    }
}
