//! Pod and container state rules

use super::{classify, RuleContext, CRASH_LOOP_REASON, IMAGE_PULL_REASONS};
use crate::alert::{Alert, AlertKind, Severity, Subject};
use crate::models::{ContainerView, PodStatus, PodView};

pub(super) fn pod_failed(ctx: &RuleContext<'_>) -> Vec<Alert> {
    ctx.snapshot
        .pods
        .iter()
        .filter(|pod| pod.status == PodStatus::Failed)
        .map(|pod| {
            Alert::new(
                Severity::Critical,
                AlertKind::PodFailed,
                Subject::pod(&pod.namespace, &pod.name),
                format!("Pod {} has FAILED", pod.name),
                ctx.snapshot.captured_at,
            )
        })
        .collect()
}

/// Pods still Pending once the grace period has elapsed. A pod with no
/// known creation time is treated as past the grace period.
pub(super) fn pod_pending(ctx: &RuleContext<'_>) -> Vec<Alert> {
    let now = ctx.snapshot.captured_at;
    let grace_secs = i64::try_from(ctx.config.pending_grace_seconds).unwrap_or(i64::MAX);

    ctx.snapshot
        .pods
        .iter()
        .filter(|pod| pod.status == PodStatus::Pending)
        .filter(|pod| pod.age_at(now).map_or(true, |age| age.num_seconds() >= grace_secs))
        .map(|pod| {
            let message = match pod.age_at(now) {
                Some(age) => format!(
                    "Pod {} is stuck in Pending state ({}s)",
                    pod.name,
                    age.num_seconds().max(0)
                ),
                None => format!("Pod {} is stuck in Pending state", pod.name),
            };
            Alert::new(
                Severity::Warning,
                AlertKind::PodPending,
                Subject::pod(&pod.namespace, &pod.name),
                message,
                now,
            )
        })
        .collect()
}

pub(super) fn crash_loop(ctx: &RuleContext<'_>) -> Vec<Alert> {
    waiting_containers(ctx, |c| c.is_waiting_with(CRASH_LOOP_REASON))
        .map(|(pod, container)| {
            Alert::new(
                Severity::Critical,
                AlertKind::CrashLoop,
                Subject::container(&pod.namespace, &pod.name, &container.name),
                format!(
                    "Container {} in {} is in CrashLoopBackOff",
                    container.name, pod.name
                ),
                ctx.snapshot.captured_at,
            )
        })
        .collect()
}

pub(super) fn image_pull_error(ctx: &RuleContext<'_>) -> Vec<Alert> {
    let is_pull_failure = |c: &ContainerView| {
        IMAGE_PULL_REASONS
            .iter()
            .any(|reason| c.is_waiting_with(reason))
    };

    waiting_containers(ctx, is_pull_failure)
        .map(|(pod, container)| {
            Alert::new(
                Severity::Critical,
                AlertKind::ImagePullError,
                Subject::container(&pod.namespace, &pod.name, &container.name),
                format!(
                    "Container {} in {} cannot pull image {} ({})",
                    container.name,
                    pod.name,
                    container.image,
                    container.waiting_reason.as_deref().unwrap_or_default()
                ),
                ctx.snapshot.captured_at,
            )
        })
        .collect()
}

pub(super) fn high_restarts(ctx: &RuleContext<'_>) -> Vec<Alert> {
    let warn = ctx.config.restart_warn_threshold;
    let crit = ctx.config.restart_crit_threshold;

    ctx.snapshot
        .pods
        .iter()
        .filter_map(|pod| {
            let severity = classify(
                f64::from(pod.restart_count),
                f64::from(warn),
                f64::from(crit),
            )?;
            let (label, threshold) = match severity {
                Severity::Critical => ("critical", crit),
                _ => ("warning", warn),
            };
            Some(Alert::new(
                severity,
                AlertKind::HighRestarts,
                Subject::pod(&pod.namespace, &pod.name),
                format!(
                    "Pod {} has restarted {} times ({} threshold: {})",
                    pod.name, pod.restart_count, label, threshold
                ),
                ctx.snapshot.captured_at,
            ))
        })
        .collect()
}

fn waiting_containers<'a>(
    ctx: &'a RuleContext<'_>,
    predicate: fn(&ContainerView) -> bool,
) -> impl Iterator<Item = (&'a PodView, &'a ContainerView)> + 'a {
    ctx.snapshot.pods.iter().flat_map(move |pod| {
        pod.containers
            .iter()
            .filter(move |c| predicate(c))
            .map(move |c| (pod, c))
    })
}
