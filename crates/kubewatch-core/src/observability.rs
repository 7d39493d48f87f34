//! Observability for the engine
//!
//! Provides:
//! - Prometheus metrics (cycle latency, alerts by severity, rule failures, history size)
//! - Structured logging of cycle outcomes with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    register_int_gauge_vec, Histogram, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
};
use std::sync::OnceLock;
use tracing::{debug, error, info, warn};

use crate::alert::{Alert, Severity};
use crate::rules::RuleError;

/// Histogram buckets for cycle latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

struct EngineMetricsInner {
    cycle_latency_seconds: Histogram,
    cycles_total: IntCounter,
    alerts_current: IntGaugeVec,
    rule_failures: IntCounterVec,
    history_entries: IntGauge,
    deployments_scored: IntGauge,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            cycle_latency_seconds: register_histogram!(
                "kubewatch_cycle_latency_seconds",
                "Time spent evaluating one snapshot",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_latency_seconds"),

            cycles_total: register_int_counter!(
                "kubewatch_cycles_total",
                "Total number of evaluation cycles run"
            )
            .expect("Failed to register cycles_total"),

            alerts_current: register_int_gauge_vec!(
                "kubewatch_alerts_current",
                "Alerts produced by the latest cycle",
                &["severity"]
            )
            .expect("Failed to register alerts_current"),

            rule_failures: register_int_counter_vec!(
                "kubewatch_rule_failures_total",
                "Rule evaluations that failed and were skipped",
                &["rule"]
            )
            .expect("Failed to register rule_failures"),

            history_entries: register_int_gauge!(
                "kubewatch_alert_history_entries",
                "Alerts currently retained in history"
            )
            .expect("Failed to register history_entries"),

            deployments_scored: register_int_gauge!(
                "kubewatch_deployments_scored",
                "Deployments scored in the latest cycle"
            )
            .expect("Failed to register deployments_scored"),
        }
    }
}

/// Engine metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance; clones share the
/// same collectors.
#[derive(Clone)]
pub struct EngineMetrics {
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EngineMetricsInner {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new)
    }

    pub fn observe_cycle(&self, duration_secs: f64) {
        self.inner().cycle_latency_seconds.observe(duration_secs);
        self.inner().cycles_total.inc();
    }

    /// Replace the per-severity alert gauges with the latest cycle's counts
    pub fn set_current_alerts(&self, alerts: &[Alert]) {
        for severity in [Severity::Critical, Severity::Warning, Severity::Info] {
            let count = alerts.iter().filter(|a| a.severity == severity).count();
            let label = severity.to_string();
            self.inner()
                .alerts_current
                .with_label_values(&[label.as_str()])
                .set(count as i64);
        }
    }

    pub fn inc_rule_failure(&self, rule: &str) {
        self.inner().rule_failures.with_label_values(&[rule]).inc();
    }

    pub fn set_history_entries(&self, entries: usize) {
        self.inner().history_entries.set(entries as i64);
    }

    pub fn set_deployments_scored(&self, count: usize) {
        self.inner().deployments_scored.set(count as i64);
    }
}

/// Structured logger for engine events
#[derive(Clone)]
pub struct StructuredLogger {
    cluster: String,
}

impl StructuredLogger {
    pub fn new(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
        }
    }

    /// Log the outcome of one evaluation cycle
    pub fn log_cycle(
        &self,
        alerts: &[Alert],
        deployments_scored: usize,
        failed_rules: usize,
        elapsed_ms: u128,
    ) {
        let critical = alerts
            .iter()
            .filter(|a| a.severity == Severity::Critical)
            .count();

        info!(
            event = "cycle_completed",
            cluster = %self.cluster,
            alerts = alerts.len(),
            critical = critical,
            deployments_scored = deployments_scored,
            failed_rules = failed_rules,
            elapsed_ms = elapsed_ms as u64,
            "Evaluation cycle complete"
        );
    }

    /// Log an alert emitted by the latest cycle
    pub fn log_alert(&self, alert: &Alert) {
        match alert.severity {
            Severity::Critical => {
                warn!(
                    event = "alert_emitted",
                    cluster = %self.cluster,
                    alert_type = %alert.kind,
                    severity = %alert.severity,
                    namespace = ?alert.subject.namespace,
                    pod = ?alert.subject.pod,
                    deployment = ?alert.subject.deployment,
                    object = ?alert.subject.object,
                    message = %alert.message,
                    "Critical alert"
                );
            }
            _ => {
                debug!(
                    event = "alert_emitted",
                    cluster = %self.cluster,
                    alert_type = %alert.kind,
                    severity = %alert.severity,
                    message = %alert.message,
                    "Alert"
                );
            }
        }
    }

    /// Log a rule that failed and was left out of the cycle
    pub fn log_rule_failure(&self, err: &RuleError) {
        error!(
            event = "rule_failed",
            cluster = %self.cluster,
            rule = %err.rule(),
            error = %err,
            "Rule evaluation failed, continuing with remaining rules"
        );
    }
}
