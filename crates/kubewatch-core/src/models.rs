//! Snapshot data model consumed by the engine
//!
//! A [`ClusterSnapshot`] is one consistent, point-in-time view of the
//! cluster as produced by an external collector. Metric samples travel
//! alongside it as a separate, possibly partial, sequence.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Pod lifecycle phase as reported by the collector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PodStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
    CrashLoop,
}

/// Container status inside a pod
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerView {
    pub name: String,
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub image: String,
    /// Reason reported by the runtime while the container is waiting
    #[serde(default)]
    pub waiting_reason: Option<String>,
}

impl ContainerView {
    /// Returns true if the container is waiting with exactly this reason
    pub fn is_waiting_with(&self, reason: &str) -> bool {
        self.waiting_reason.as_deref() == Some(reason)
    }
}

/// Pod state for one cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodView {
    pub name: String,
    pub namespace: String,
    pub status: PodStatus,
    /// Restarts summed across containers. Never decreases for the same pod;
    /// a lower value in a later cycle means the pod was replaced.
    #[serde(default)]
    pub restart_count: u32,
    #[serde(default)]
    pub containers: Vec<ContainerView>,
    #[serde(default)]
    pub node: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Owning deployment, when the collector resolved owner references
    #[serde(default)]
    pub owner: Option<String>,
    /// CPU limit in Kubernetes quantity notation (e.g. `500m`, `2`)
    #[serde(default)]
    pub cpu_limit: Option<String>,
    /// Memory limit in Kubernetes quantity notation (e.g. `256Mi`)
    #[serde(default)]
    pub memory_limit: Option<String>,
}

impl PodView {
    /// Age of the pod at `now`, if its creation time is known
    pub fn age_at(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.created_at.map(|created| now - created)
    }

    /// Returns true if this pod could belong to `deployment`
    ///
    /// Resolved owner references take precedence; otherwise the
    /// `<deployment>-` name prefix used by generated ReplicaSet pods is used.
    /// Several deployments can match by prefix; [`ClusterSnapshot::owner_of`]
    /// picks between them.
    pub fn is_owned_by(&self, deployment: &DeploymentView) -> bool {
        if self.namespace != deployment.namespace {
            return false;
        }
        match self.owner.as_deref() {
            Some(owner) => owner == deployment.name,
            None => self
                .name
                .strip_prefix(deployment.name.as_str())
                .is_some_and(|rest| rest.starts_with('-')),
        }
    }
}

/// Deployment replica state for one cycle
///
/// `replicas_ready > replicas_desired` can happen briefly during rollouts
/// and is accepted as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentView {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub replicas_desired: u32,
    #[serde(default)]
    pub replicas_ready: u32,
    #[serde(default)]
    pub replicas_updated: u32,
    #[serde(default)]
    pub replicas_available: u32,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeView {
    pub name: String,
    pub ready: bool,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub kubelet_version: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicePort {
    pub port: u16,
    #[serde(default)]
    pub target_port: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceView {
    pub name: String,
    pub namespace: String,
    #[serde(default, rename = "type")]
    pub service_type: Option<String>,
    #[serde(default)]
    pub cluster_ip: Option<String>,
    #[serde(default)]
    pub ports: Vec<ServicePort>,
    #[serde(default)]
    pub selector: std::collections::BTreeMap<String, String>,
}

/// Kubernetes event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Normal,
    Warning,
}

/// Cluster event, most recent window only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Involved object as `Kind/name`
    pub object: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
    #[serde(default = "default_event_count")]
    pub count: u32,
    pub timestamp: DateTime<Utc>,
}

fn default_event_count() -> u32 {
    1
}

/// Per-pod resource usage sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodMetricSample {
    pub pod: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub cpu_usage_millicores: u64,
    #[serde(default)]
    pub memory_usage_mb: u64,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Set when metrics were unavailable for this pod
    #[serde(default)]
    pub error: Option<String>,
}

impl PodMetricSample {
    /// Returns true if this sample describes `pod`
    ///
    /// Samples without a namespace match on pod name alone.
    pub fn matches(&self, pod: &PodView) -> bool {
        self.pod == pod.name
            && self
                .namespace
                .as_deref()
                .map_or(true, |ns| ns == pod.namespace)
    }

    pub fn is_usable(&self) -> bool {
        self.error.is_none()
    }
}

/// One consistent point-in-time view of cluster state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    /// Time the collector captured the snapshot; used as the observation
    /// time for state-based alerts
    pub captured_at: DateTime<Utc>,
    #[serde(default)]
    pub pods: Vec<PodView>,
    #[serde(default)]
    pub deployments: Vec<DeploymentView>,
    #[serde(default)]
    pub nodes: Vec<NodeView>,
    #[serde(default)]
    pub services: Vec<ServiceView>,
    #[serde(default)]
    pub events: Vec<ClusterEvent>,
}

impl ClusterSnapshot {
    /// Empty snapshot captured at `captured_at`
    pub fn empty(captured_at: DateTime<Utc>) -> Self {
        Self {
            captured_at,
            pods: Vec::new(),
            deployments: Vec::new(),
            nodes: Vec::new(),
            services: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Deployment that owns `pod`
    ///
    /// When several deployments match by name prefix the longest name wins,
    /// so `api-gateway-*` pods never count toward `api`.
    pub fn owner_of(&self, pod: &PodView) -> Option<&DeploymentView> {
        self.deployments
            .iter()
            .filter(|dep| pod.is_owned_by(dep))
            .max_by_key(|dep| dep.name.len())
    }

    /// Pods owned by `deployment`
    pub fn pods_owned_by<'a>(
        &'a self,
        deployment: &'a DeploymentView,
    ) -> impl Iterator<Item = &'a PodView> + 'a {
        self.pods.iter().filter(move |pod| {
            self.owner_of(pod).is_some_and(|owner| {
                owner.name == deployment.name && owner.namespace == deployment.namespace
            })
        })
    }

    /// Owned pods grouped by `(namespace, deployment name)`, in one pass
    pub fn pods_by_owner(&self) -> HashMap<(&str, &str), Vec<&PodView>> {
        let mut owned: HashMap<(&str, &str), Vec<&PodView>> = HashMap::new();
        for pod in &self.pods {
            if let Some(owner) = self.owner_of(pod) {
                owned
                    .entry((owner.namespace.as_str(), owner.name.as_str()))
                    .or_default()
                    .push(pod);
            }
        }
        owned
    }

    /// Aggregate counts for display alongside alerts
    pub fn summary(&self) -> ClusterSummary {
        let count_pods = |status: PodStatus| self.pods.iter().filter(|p| p.status == status).count();

        ClusterSummary {
            total_pods: self.pods.len(),
            running_pods: count_pods(PodStatus::Running),
            failed_pods: count_pods(PodStatus::Failed),
            pending_pods: count_pods(PodStatus::Pending),
            total_nodes: self.nodes.len(),
            ready_nodes: self.nodes.iter().filter(|n| n.ready).count(),
            total_deployments: self.deployments.len(),
            healthy_deployments: self
                .deployments
                .iter()
                .filter(|d| d.replicas_ready == d.replicas_desired)
                .count(),
            total_services: self.services.len(),
            total_restarts: self.pods.iter().map(|p| u64::from(p.restart_count)).sum(),
            warning_events: self
                .events
                .iter()
                .filter(|e| e.event_type == EventType::Warning)
                .count(),
        }
    }
}

/// Cluster-wide counts derived from a snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub total_pods: usize,
    pub running_pods: usize,
    pub failed_pods: usize,
    pub pending_pods: usize,
    pub total_nodes: usize,
    pub ready_nodes: usize,
    pub total_deployments: usize,
    pub healthy_deployments: usize,
    pub total_services: usize,
    pub total_restarts: u64,
    pub warning_events: usize,
}
