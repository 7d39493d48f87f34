//! Deployment health scoring
//!
//! Scores each deployment from 0 to 100 using replica readiness and the
//! restart pressure of the pods it owns. The resulting status uses the
//! display vocabulary (healthy/degraded/critical), which is separate from
//! alert [`Severity`](crate::alert::Severity).

use serde::{Deserialize, Serialize};

use crate::models::{DeploymentView, PodView};

/// Highest penalty restarts alone can apply
pub const MAX_RESTART_PENALTY: u64 = 30;

/// Penalty per restart across owned pods
pub const RESTART_PENALTY_PER_RESTART: u64 = 2;

/// Minimum score considered healthy
pub const HEALTHY_THRESHOLD: u8 = 80;

/// Minimum score considered degraded
pub const DEGRADED_THRESHOLD: u8 = 50;

/// Health bucket of a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Score of 80 or more
    Healthy,
    /// Score from 50 to 79
    Degraded,
    /// Score below 50
    Critical,
}

impl HealthStatus {
    pub fn from_score(score: u8) -> Self {
        if score >= HEALTHY_THRESHOLD {
            HealthStatus::Healthy
        } else if score >= DEGRADED_THRESHOLD {
            HealthStatus::Degraded
        } else {
            HealthStatus::Critical
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Critical => write!(f, "critical"),
        }
    }
}

/// Ready and desired replica counts, serialized as `"ready/desired"`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicaCount {
    pub ready: u32,
    pub desired: u32,
}

impl std::fmt::Display for ReplicaCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.ready, self.desired)
    }
}

impl Serialize for ReplicaCount {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ReplicaCount {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        let raw = String::deserialize(deserializer)?;
        let (ready, desired) = raw
            .split_once('/')
            .ok_or_else(|| D::Error::custom(format!("expected 'ready/desired', got '{raw}'")))?;
        Ok(Self {
            ready: ready.trim().parse().map_err(D::Error::custom)?,
            desired: desired.trim().parse().map_err(D::Error::custom)?,
        })
    }
}

/// Health of one deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthScoreEntry {
    pub namespace: String,
    pub score: u8,
    pub status: HealthStatus,
    pub replicas: ReplicaCount,
    /// Restarts summed over the deployment's pods
    pub restarts: u64,
}

/// Score a deployment from its replica state and owned pods
pub fn score<'a>(
    deployment: &DeploymentView,
    owned_pods: impl IntoIterator<Item = &'a PodView>,
) -> HealthScoreEntry {
    let restarts: u64 = owned_pods
        .into_iter()
        .map(|pod| u64::from(pod.restart_count))
        .sum();

    let readiness_penalty = readiness_penalty(deployment);
    let restart_penalty = restarts
        .saturating_mul(RESTART_PENALTY_PER_RESTART)
        .min(MAX_RESTART_PENALTY);

    let score = 100u64
        .saturating_sub(readiness_penalty)
        .saturating_sub(restart_penalty)
        .min(100) as u8;

    HealthScoreEntry {
        namespace: deployment.namespace.clone(),
        score,
        status: HealthStatus::from_score(score),
        replicas: ReplicaCount {
            ready: deployment.replicas_ready,
            desired: deployment.replicas_desired,
        },
        restarts,
    }
}

/// Share of desired replicas that are not ready, as points out of 100
///
/// A deployment scaled to zero counts as fully ready, as does one that
/// briefly reports more ready replicas than desired.
fn readiness_penalty(deployment: &DeploymentView) -> u64 {
    let desired = u64::from(deployment.replicas_desired);
    if desired == 0 {
        return 0;
    }
    let missing = desired.saturating_sub(u64::from(deployment.replicas_ready));
    100 * missing / desired
}
