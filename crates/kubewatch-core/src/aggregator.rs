//! Alert aggregation and history
//!
//! Handles:
//! - Collapsing candidate alerts that share a (type, subject) identity
//! - Ordering alerts for display
//! - A bounded FIFO history of emitted alerts for trend views

use std::collections::{HashMap, VecDeque};

use crate::alert::{Alert, AlertKey};

/// Default number of alerts retained in history
pub const DEFAULT_HISTORY_CAPACITY: usize = 200;

/// Bounded, append-only record of previously emitted alerts
///
/// Oldest entries are evicted once the capacity is exceeded. The history is
/// never consulted when deduplicating or classifying the current cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertHistory {
    entries: VecDeque<Alert>,
    capacity: usize,
}

impl AlertHistory {
    /// Create an empty history holding at most `capacity` alerts
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1_000)),
            capacity,
        }
    }

    /// Append a cycle's alerts, evicting the oldest entries past capacity
    ///
    /// A zero-capacity history retains nothing.
    pub fn record(&mut self, alerts: &[Alert]) {
        if self.capacity == 0 {
            return;
        }
        for alert in alerts {
            if self.entries.len() == self.capacity {
                self.entries.pop_front();
            }
            self.entries.push_back(alert.clone());
        }
    }

    /// Alerts from oldest to newest
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Alert> {
        self.entries.iter()
    }

    /// The `limit` most recent alerts, newest first
    pub fn recent(&self, limit: usize) -> Vec<Alert> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for AlertHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

/// Merge one cycle's candidates and append the result to `history`
///
/// Returns the deduplicated, sorted alerts together with the updated
/// history.
pub fn aggregate(candidates: Vec<Alert>, mut history: AlertHistory) -> (Vec<Alert>, AlertHistory) {
    let current = dedup_and_sort(candidates);
    history.record(&current);
    (current, history)
}

/// Collapse alerts sharing an identity, keeping the most recent one
///
/// When two candidates carry the same timestamp the one seen first is kept.
pub fn dedup_and_sort(candidates: Vec<Alert>) -> Vec<Alert> {
    let mut latest: HashMap<AlertKey, Alert> = HashMap::with_capacity(candidates.len());

    for alert in candidates {
        match latest.get_mut(&alert.key()) {
            Some(existing) => {
                if alert.timestamp > existing.timestamp {
                    *existing = alert;
                }
            }
            None => {
                latest.insert(alert.key(), alert);
            }
        }
    }

    let mut alerts: Vec<Alert> = latest.into_values().collect();
    sort_alerts(&mut alerts);
    alerts
}

/// Severity ascending, then newest first, then subject and type
pub fn sort_alerts(alerts: &mut [Alert]) {
    alerts.sort_by(|a, b| {
        a.severity
            .cmp(&b.severity)
            .then_with(|| b.timestamp.cmp(&a.timestamp))
            .then_with(|| a.subject.cmp(&b.subject))
            .then_with(|| a.kind.cmp(&b.kind))
    });
}
