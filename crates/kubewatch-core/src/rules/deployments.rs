//! Deployment replica rules

use super::RuleContext;
use crate::alert::{Alert, AlertKind, Severity, Subject};

pub(super) fn deployment_down(ctx: &RuleContext<'_>) -> Vec<Alert> {
    ctx.snapshot
        .deployments
        .iter()
        .filter(|dep| dep.replicas_desired > 0 && dep.replicas_ready == 0)
        .map(|dep| {
            Alert::new(
                Severity::Critical,
                AlertKind::DeploymentDown,
                Subject::deployment(&dep.namespace, &dep.name),
                format!(
                    "Deployment {} has 0/{} replicas ready - SERVICE DOWN",
                    dep.name, dep.replicas_desired
                ),
                ctx.snapshot.captured_at,
            )
        })
        .collect()
}

pub(super) fn deployment_degraded(ctx: &RuleContext<'_>) -> Vec<Alert> {
    ctx.snapshot
        .deployments
        .iter()
        .filter(|dep| dep.replicas_ready > 0 && dep.replicas_ready < dep.replicas_desired)
        .map(|dep| {
            Alert::new(
                Severity::Warning,
                AlertKind::DeploymentDegraded,
                Subject::deployment(&dep.namespace, &dep.name),
                format!(
                    "Deployment {} has {}/{} replicas ready - DEGRADED",
                    dep.name, dep.replicas_ready, dep.replicas_desired
                ),
                ctx.snapshot.captured_at,
            )
        })
        .collect()
}
