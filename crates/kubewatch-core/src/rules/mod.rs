//! Rule evaluators
//!
//! Each [`Rule`] detects one failure pattern in a snapshot and its metrics
//! sample. Rules are a closed set: adding a detector means adding a variant
//! here and a match arm in [`Rule::evaluate`].

mod cluster;
mod deployments;
mod pods;
mod resources;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::alert::{Alert, AlertKind, Severity};
use crate::config::EngineConfig;
use crate::models::{ClusterSnapshot, PodMetricSample};

/// Waiting reason reported for a crash-looping container
pub const CRASH_LOOP_REASON: &str = "CrashLoopBackOff";

/// Waiting reasons reported when an image cannot be pulled
pub const IMAGE_PULL_REASONS: &[&str] = &["ImagePullBackOff", "ErrImagePull"];

/// Longest event message carried into an alert, in characters
pub const EVENT_MESSAGE_CHARS: usize = 120;

/// Failure while evaluating a single rule
///
/// The built-in rules skip input they cannot judge (missing limits, errored
/// samples) instead of failing, so in practice the engine sees `Panicked`.
/// `Failed` is the explicit form an evaluator uses to give up on a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("rule {rule} failed: {reason}")]
    Failed { rule: Rule, reason: String },

    #[error("rule {rule} panicked: {message}")]
    Panicked { rule: Rule, message: String },
}

impl RuleError {
    pub fn rule(&self) -> Rule {
        match self {
            RuleError::Failed { rule, .. } | RuleError::Panicked { rule, .. } => *rule,
        }
    }
}

/// Everything a rule may look at during one cycle
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub snapshot: &'a ClusterSnapshot,
    pub metrics: &'a [PodMetricSample],
    pub config: &'a EngineConfig,
}

/// The detectors run on every cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    PodFailed,
    PodPending,
    CrashLoop,
    ImagePullError,
    DeploymentDown,
    DeploymentDegraded,
    HighRestarts,
    HighCpu,
    HighMemory,
    NodeNotReady,
    K8sWarningEvent,
}

impl Rule {
    /// All rules, in evaluation order
    pub const ALL: [Rule; 11] = [
        Rule::PodFailed,
        Rule::PodPending,
        Rule::CrashLoop,
        Rule::ImagePullError,
        Rule::DeploymentDown,
        Rule::DeploymentDegraded,
        Rule::HighRestarts,
        Rule::HighCpu,
        Rule::HighMemory,
        Rule::NodeNotReady,
        Rule::K8sWarningEvent,
    ];

    /// Alert type this rule emits
    pub fn kind(self) -> AlertKind {
        match self {
            Rule::PodFailed => AlertKind::PodFailed,
            Rule::PodPending => AlertKind::PodPending,
            Rule::CrashLoop => AlertKind::CrashLoop,
            Rule::ImagePullError => AlertKind::ImagePullError,
            Rule::DeploymentDown => AlertKind::DeploymentDown,
            Rule::DeploymentDegraded => AlertKind::DeploymentDegraded,
            Rule::HighRestarts => AlertKind::HighRestarts,
            Rule::HighCpu => AlertKind::HighCpu,
            Rule::HighMemory => AlertKind::HighMemory,
            Rule::NodeNotReady => AlertKind::NodeNotReady,
            Rule::K8sWarningEvent => AlertKind::K8sWarningEvent,
        }
    }

    /// Produce candidate alerts for this rule
    ///
    /// Every built-in rule is total over any snapshot and returns `Ok`. The
    /// engine still isolates each call, so a panic inside a rule costs only
    /// that rule's alerts for the cycle.
    pub fn evaluate(self, ctx: &RuleContext<'_>) -> Result<Vec<Alert>, RuleError> {
        let alerts = match self {
            Rule::PodFailed => pods::pod_failed(ctx),
            Rule::PodPending => pods::pod_pending(ctx),
            Rule::CrashLoop => pods::crash_loop(ctx),
            Rule::ImagePullError => pods::image_pull_error(ctx),
            Rule::HighRestarts => pods::high_restarts(ctx),
            Rule::DeploymentDown => deployments::deployment_down(ctx),
            Rule::DeploymentDegraded => deployments::deployment_degraded(ctx),
            Rule::HighCpu => resources::high_cpu(ctx),
            Rule::HighMemory => resources::high_memory(ctx),
            Rule::NodeNotReady => cluster::node_not_ready(ctx),
            Rule::K8sWarningEvent => cluster::k8s_warning_event(ctx),
        };
        Ok(alerts)
    }
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.kind().fmt(f)
    }
}

/// Map a value onto a two-level threshold; critical wins over warning
fn classify(value: f64, warn: f64, crit: f64) -> Option<Severity> {
    if value >= crit {
        Some(Severity::Critical)
    } else if value >= warn {
        Some(Severity::Warning)
    } else {
        None
    }
}

/// Classify `usage` as a share of `limit` against percentage thresholds
///
/// Compares `usage * 100` with `pct * limit` rather than a divided ratio, so
/// usage landing exactly on a threshold is never rounded below it.
fn classify_share(usage: f64, limit: f64, warn_pct: f64, crit_pct: f64) -> Option<Severity> {
    let scaled = usage * 100.0;
    if scaled >= crit_pct * limit {
        Some(Severity::Critical)
    } else if scaled >= warn_pct * limit {
        Some(Severity::Warning)
    } else {
        None
    }
}
