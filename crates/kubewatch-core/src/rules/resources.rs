//! Resource usage rules
//!
//! Usage is compared against the pod's declared limit. Pods without a
//! usable limit or without a usable metrics sample are skipped.

use tracing::debug;

use super::{classify_share, RuleContext};
use crate::alert::{Alert, AlertKind, Subject};
use crate::models::{PodMetricSample, PodView};
use crate::quantity::{parse_cpu_millicores, parse_memory_bytes};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

pub(super) fn high_cpu(ctx: &RuleContext<'_>) -> Vec<Alert> {
    let warn = ctx.config.cpu_warn_pct;
    let crit = ctx.config.cpu_crit_pct;

    ctx.snapshot
        .pods
        .iter()
        .filter_map(|pod| {
            let limit = declared_limit(pod, pod.cpu_limit.as_deref(), parse_cpu_millicores)?;
            let sample = usable_sample(ctx.metrics, pod)?;
            let usage = sample.cpu_usage_millicores as f64;
            let severity = classify_share(usage, limit as f64, warn, crit)?;
            let pct = usage / limit as f64 * 100.0;

            Some(Alert::new(
                severity,
                AlertKind::HighCpu,
                Subject::pod(&pod.namespace, &pod.name),
                format!(
                    "Pod {} CPU at {:.0}% of limit ({}m/{}m)",
                    pod.name, pct, sample.cpu_usage_millicores, limit
                ),
                sample.timestamp.unwrap_or(ctx.snapshot.captured_at),
            ))
        })
        .collect()
}

pub(super) fn high_memory(ctx: &RuleContext<'_>) -> Vec<Alert> {
    let warn = ctx.config.memory_warn_pct;
    let crit = ctx.config.memory_crit_pct;

    ctx.snapshot
        .pods
        .iter()
        .filter_map(|pod| {
            let limit = declared_limit(pod, pod.memory_limit.as_deref(), parse_memory_bytes)?;
            let sample = usable_sample(ctx.metrics, pod)?;
            let usage_bytes = sample.memory_usage_mb as f64 * BYTES_PER_MB;
            let severity = classify_share(usage_bytes, limit as f64, warn, crit)?;
            let limit_mb = limit as f64 / BYTES_PER_MB;
            let pct = usage_bytes / limit as f64 * 100.0;

            Some(Alert::new(
                severity,
                AlertKind::HighMemory,
                Subject::pod(&pod.namespace, &pod.name),
                format!(
                    "Pod {} memory at {:.0}% of limit ({}MB/{:.0}MB)",
                    pod.name, pct, sample.memory_usage_mb, limit_mb
                ),
                sample.timestamp.unwrap_or(ctx.snapshot.captured_at),
            ))
        })
        .collect()
}

/// Parsed, non-zero limit for a pod
fn declared_limit<E: std::fmt::Display>(
    pod: &PodView,
    raw: Option<&str>,
    parse: fn(&str) -> Result<u64, E>,
) -> Option<u64> {
    let raw = raw?;
    match parse(raw) {
        Ok(0) => None,
        Ok(limit) => Some(limit),
        Err(e) => {
            debug!(
                pod_name = %pod.name,
                namespace = %pod.namespace,
                error = %e,
                "Skipping pod with unparseable resource limit"
            );
            None
        }
    }
}

/// First sample for `pod`, unless that sample reports an error
fn usable_sample<'a>(metrics: &'a [PodMetricSample], pod: &PodView) -> Option<&'a PodMetricSample> {
    metrics
        .iter()
        .find(|sample| sample.matches(pod))
        .filter(|sample| sample.is_usable())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::Severity;
    use crate::config::EngineConfig;
    use crate::models::fixtures::*;
    use crate::models::{ClusterSnapshot, PodStatus};

    fn limited_pod(name: &str, cpu: Option<&str>, memory: Option<&str>) -> PodView {
        let mut p = pod(name, PodStatus::Running);
        p.cpu_limit = cpu.map(str::to_string);
        p.memory_limit = memory.map(str::to_string);
        p
    }

    fn eval(
        rule: fn(&RuleContext<'_>) -> Vec<Alert>,
        snapshot: &ClusterSnapshot,
        metrics: &[PodMetricSample],
    ) -> Vec<Alert> {
        eval_with(&EngineConfig::default(), rule, snapshot, metrics)
    }

    fn eval_with(
        config: &EngineConfig,
        rule: fn(&RuleContext<'_>) -> Vec<Alert>,
        snapshot: &ClusterSnapshot,
        metrics: &[PodMetricSample],
    ) -> Vec<Alert> {
        rule(&RuleContext {
            snapshot,
            metrics,
            config,
        })
    }

    #[test]
    fn test_cpu_warning_at_75_percent() {
        let mut snap = snapshot();
        snap.pods = vec![limited_pod("web-1", Some("1000m"), None)];

        let alerts = eval(high_cpu, &snap, &[sample("web-1", 750, 0)]);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Warning);
        assert!(alerts[0].message.contains("75%"));
    }

    #[test]
    fn test_cpu_critical_only_once() {
        let mut snap = snapshot();
        snap.pods = vec![limited_pod("web-1", Some("1"), None)];

        let alerts = eval(high_cpu, &snap, &[sample("web-1", 950, 0)]);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Critical);
    }

    #[test]
    fn test_cpu_without_limit_skipped() {
        let mut snap = snapshot();
        snap.pods = vec![
            limited_pod("no-limit", None, None),
            limited_pod("zero-limit", Some("0"), None),
            limited_pod("garbage", Some("lots"), None),
        ];
        let metrics = [
            sample("no-limit", 5000, 0),
            sample("zero-limit", 5000, 0),
            sample("garbage", 5000, 0),
        ];

        assert!(eval(high_cpu, &snap, &metrics).is_empty());
    }

    #[test]
    fn test_errored_sample_only_skips_its_pod() {
        let mut snap = snapshot();
        snap.pods = vec![
            limited_pod("broken", Some("100m"), None),
            limited_pod("busy", Some("100m"), None),
        ];
        let mut broken = sample("broken", 99, 0);
        broken.error = Some("metrics unavailable".to_string());

        let alerts = eval(high_cpu, &snap, &[broken, sample("busy", 99, 0)]);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].subject.pod.as_deref(), Some("busy"));
    }

    #[test]
    fn test_missing_sample_skipped() {
        let mut snap = snapshot();
        snap.pods = vec![limited_pod("web-1", Some("100m"), None)];
        assert!(eval(high_cpu, &snap, &[]).is_empty());
    }

    #[test]
    fn test_sample_timestamp_preferred() {
        let mut snap = snapshot();
        snap.pods = vec![limited_pod("web-1", Some("100m"), None)];
        let mut s = sample("web-1", 95, 0);
        let observed = t0() - chrono::Duration::seconds(5);
        s.timestamp = Some(observed);

        let alerts = eval(high_cpu, &snap, &[s]);
        assert_eq!(alerts[0].timestamp, observed);
    }

    #[test]
    fn test_memory_thresholds() {
        let mut snap = snapshot();
        snap.pods = vec![
            limited_pod("cache", None, Some("1Gi")),
            limited_pod("db", None, Some("512Mi")),
            limited_pod("idle", None, Some("512Mi")),
        ];
        let metrics = [
            sample("cache", 0, 800),
            sample("db", 0, 480),
            sample("idle", 0, 100),
        ];

        let alerts = eval(high_memory, &snap, &metrics);
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].subject.pod.as_deref(), Some("cache"));
        assert_eq!(alerts[0].severity, Severity::Warning);
        assert_eq!(alerts[1].subject.pod.as_deref(), Some("db"));
        assert_eq!(alerts[1].severity, Severity::Critical);
    }

    #[test]
    fn test_cpu_exactly_at_custom_threshold() {
        let config = EngineConfig {
            cpu_warn_pct: 57.0,
            ..Default::default()
        };
        let mut snap = snapshot();
        snap.pods = vec![
            limited_pod("web-1", Some("100m"), None),
            limited_pod("web-2", Some("100m"), None),
        ];

        let alerts = eval_with(
            &config,
            high_cpu,
            &snap,
            &[sample("web-1", 57, 0), sample("web-2", 56, 0)],
        );
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].subject.pod.as_deref(), Some("web-1"));
        assert_eq!(alerts[0].severity, Severity::Warning);

        let config = EngineConfig {
            cpu_warn_pct: 58.0,
            ..Default::default()
        };
        snap.pods = vec![limited_pod("web-1", Some("50m"), None)];
        let alerts = eval_with(&config, high_cpu, &snap, &[sample("web-1", 29, 0)]);
        assert_eq!(alerts.len(), 1);
    }

    #[test]
    fn test_memory_exactly_at_custom_threshold() {
        let config = EngineConfig {
            memory_warn_pct: 57.0,
            ..Default::default()
        };
        let mut snap = snapshot();
        snap.pods = vec![limited_pod("cache", None, Some("100Mi"))];

        let alerts = eval_with(&config, high_memory, &snap, &[sample("cache", 0, 57)]);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Warning);
    }
}
