//! Alert types emitted by the rule evaluators

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound on alert message length, in characters
pub const MAX_MESSAGE_CHARS: usize = 256;

/// Alert urgency
///
/// Ordered for display: `Critical < Warning < Info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Critical => write!(f, "critical"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// Which rule produced an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AlertKind {
    PodFailed,
    PodPending,
    CrashLoop,
    ImagePullError,
    DeploymentDown,
    DeploymentDegraded,
    HighRestarts,
    #[serde(rename = "HighCPU")]
    HighCpu,
    HighMemory,
    NodeNotReady,
    K8sWarningEvent,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AlertKind::PodFailed => "PodFailed",
            AlertKind::PodPending => "PodPending",
            AlertKind::CrashLoop => "CrashLoop",
            AlertKind::ImagePullError => "ImagePullError",
            AlertKind::DeploymentDown => "DeploymentDown",
            AlertKind::DeploymentDegraded => "DeploymentDegraded",
            AlertKind::HighRestarts => "HighRestarts",
            AlertKind::HighCpu => "HighCPU",
            AlertKind::HighMemory => "HighMemory",
            AlertKind::NodeNotReady => "NodeNotReady",
            AlertKind::K8sWarningEvent => "K8sWarningEvent",
        };
        f.write_str(name)
    }
}

/// What an alert is about
///
/// At least one of `pod`, `deployment` or `object` is set. Field order
/// doubles as the tie-break order when sorting alerts.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Subject {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
}

impl Subject {
    pub fn pod(namespace: &str, pod: &str) -> Self {
        Self {
            namespace: Some(namespace.to_string()),
            pod: Some(pod.to_string()),
            ..Default::default()
        }
    }

    pub fn container(namespace: &str, pod: &str, container: &str) -> Self {
        Self {
            container: Some(container.to_string()),
            ..Self::pod(namespace, pod)
        }
    }

    pub fn deployment(namespace: &str, deployment: &str) -> Self {
        Self {
            namespace: Some(namespace.to_string()),
            deployment: Some(deployment.to_string()),
            ..Default::default()
        }
    }

    pub fn object(namespace: Option<&str>, object: &str) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            object: Some(object.to_string()),
            ..Default::default()
        }
    }

    /// Returns true if at least one of pod, deployment or object is set
    pub fn is_populated(&self) -> bool {
        self.pod.is_some() || self.deployment.is_some() || self.object.is_some()
    }
}

/// Deduplication identity of an alert
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlertKey {
    pub kind: AlertKind,
    pub subject: Subject,
}

/// An actionable finding about the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub severity: Severity,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    #[serde(flatten)]
    pub subject: Subject,
    pub message: String,
    /// When the condition was observed
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    /// Build an alert, bounding the message to [`MAX_MESSAGE_CHARS`]
    pub fn new(
        severity: Severity,
        kind: AlertKind,
        subject: Subject,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            severity,
            kind,
            subject,
            message: truncate_chars(&message.into(), MAX_MESSAGE_CHARS),
            timestamp,
        }
    }

    pub fn key(&self) -> AlertKey {
        AlertKey {
            kind: self.kind,
            subject: self.subject.clone(),
        }
    }
}

/// Truncate to at most `max` characters without splitting a code point
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_severity_display_order() {
        let mut severities = vec![Severity::Info, Severity::Critical, Severity::Warning];
        severities.sort();
        assert_eq!(
            severities,
            vec![Severity::Critical, Severity::Warning, Severity::Info]
        );
    }

    #[test]
    fn test_alert_json_shape() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let alert = Alert::new(
            Severity::Critical,
            AlertKind::HighCpu,
            Subject::pod("default", "web-1"),
            "Pod web-1 CPU at 95% of limit",
            ts,
        );

        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["severity"], "critical");
        assert_eq!(json["type"], "HighCPU");
        assert_eq!(json["pod"], "web-1");
        assert_eq!(json["namespace"], "default");
        assert_eq!(json["timestamp"], "2024-01-01T00:00:00Z");
        assert!(json.get("deployment").is_none());
        assert!(json.get("object").is_none());
    }

    #[test]
    fn test_message_is_bounded() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let alert = Alert::new(
            Severity::Warning,
            AlertKind::K8sWarningEvent,
            Subject::object(None, "Pod/x"),
            "é".repeat(1000),
            ts,
        );
        assert_eq!(alert.message.chars().count(), MAX_MESSAGE_CHARS);
    }

    #[test]
    fn test_truncate_chars_short_input() {
        assert_eq!(truncate_chars("abc", 120), "abc");
        assert_eq!(truncate_chars("abcdef", 3), "abc");
    }
}
