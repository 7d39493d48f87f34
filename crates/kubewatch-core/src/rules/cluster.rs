//! Node readiness and cluster event rules

use super::{RuleContext, EVENT_MESSAGE_CHARS};
use crate::alert::{truncate_chars, Alert, AlertKind, Severity, Subject};
use crate::models::EventType;

pub(super) fn node_not_ready(ctx: &RuleContext<'_>) -> Vec<Alert> {
    ctx.snapshot
        .nodes
        .iter()
        .filter(|node| !node.ready)
        .map(|node| {
            Alert::new(
                Severity::Critical,
                AlertKind::NodeNotReady,
                Subject::object(None, &format!("Node/{}", node.name)),
                format!("Node {} is NotReady", node.name),
                ctx.snapshot.captured_at,
            )
        })
        .collect()
}

/// One alert per Warning event; repeats collapse during aggregation
pub(super) fn k8s_warning_event(ctx: &RuleContext<'_>) -> Vec<Alert> {
    ctx.snapshot
        .events
        .iter()
        .filter(|event| event.event_type == EventType::Warning)
        .map(|event| {
            Alert::new(
                Severity::Warning,
                AlertKind::K8sWarningEvent,
                Subject::object(event.namespace.as_deref(), &event.object),
                format!(
                    "K8s Warning: {} - {}",
                    event.reason,
                    truncate_chars(&event.message, EVENT_MESSAGE_CHARS)
                ),
                event.timestamp,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::models::fixtures::*;
    use crate::models::{ClusterEvent, NodeView};

    fn event(event_type: EventType, object: &str, message: &str) -> ClusterEvent {
        ClusterEvent {
            event_type,
            object: object.to_string(),
            namespace: Some("default".to_string()),
            reason: "BackOff".to_string(),
            message: message.to_string(),
            count: 1,
            timestamp: t0(),
        }
    }

    #[test]
    fn test_only_warning_events_alerted() {
        let mut snap = snapshot();
        snap.events = vec![
            event(EventType::Normal, "Pod/web-1", "Pulled image"),
            event(EventType::Warning, "Pod/web-2", "Back-off restarting failed container"),
        ];
        let config = EngineConfig::default();
        let ctx = RuleContext {
            snapshot: &snap,
            metrics: &[],
            config: &config,
        };

        let alerts = k8s_warning_event(&ctx);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].subject.object.as_deref(), Some("Pod/web-2"));
        assert_eq!(
            alerts[0].message,
            "K8s Warning: BackOff - Back-off restarting failed container"
        );
    }

    #[test]
    fn test_event_message_truncated_to_120_chars() {
        let mut snap = snapshot();
        let long = "x".repeat(500);
        snap.events = vec![event(EventType::Warning, "Pod/web-1", &long)];
        let config = EngineConfig::default();
        let ctx = RuleContext {
            snapshot: &snap,
            metrics: &[],
            config: &config,
        };

        let alerts = k8s_warning_event(&ctx);
        let carried = alerts[0].message.trim_start_matches("K8s Warning: BackOff - ");
        assert_eq!(carried.len(), EVENT_MESSAGE_CHARS);
    }

    #[test]
    fn test_not_ready_node() {
        let mut snap = snapshot();
        snap.nodes = vec![
            NodeView {
                name: "node-1".to_string(),
                ready: true,
                roles: Vec::new(),
                kubelet_version: None,
                created_at: None,
            },
            NodeView {
                name: "node-2".to_string(),
                ready: false,
                roles: Vec::new(),
                kubelet_version: None,
                created_at: None,
            },
        ];
        let config = EngineConfig::default();
        let ctx = RuleContext {
            snapshot: &snap,
            metrics: &[],
            config: &config,
        };

        let alerts = node_not_ready(&ctx);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].subject.object.as_deref(), Some("Node/node-2"));
    }
}
