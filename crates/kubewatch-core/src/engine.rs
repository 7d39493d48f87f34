//! Evaluation cycle orchestration
//!
//! [`Engine`] runs every enabled rule against a snapshot, aggregates the
//! candidates into the current alert list, scores every deployment and
//! appends the alerts to its history. It performs no I/O.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregator::{aggregate, AlertHistory};
use crate::alert::Alert;
use crate::config::{ConfigError, EngineConfig};
use crate::health::{self, HealthScoreEntry};
use crate::models::{ClusterSnapshot, ClusterSummary, PodMetricSample};
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::rules::{Rule, RuleContext, RuleError};

/// A rule left out of a cycle because it failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFailure {
    pub rule: Rule,
    pub error: String,
}

impl From<&RuleError> for RuleFailure {
    fn from(err: &RuleError) -> Self {
        Self {
            rule: err.rule(),
            error: err.to_string(),
        }
    }
}

/// Result of one evaluation cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Deduplicated alerts, most severe first
    pub alerts: Vec<Alert>,
    /// Score per deployment name
    pub health_scores: BTreeMap<String, HealthScoreEntry>,
    pub summary: ClusterSummary,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_rules: Vec<RuleFailure>,
}

/// Alert detection and health scoring engine
///
/// The alert history is the only state kept between cycles. It sits behind
/// a mutex that is held for the whole aggregation step, so appends from
/// concurrent cycles never interleave.
pub struct Engine {
    config: EngineConfig,
    rules: Vec<Rule>,
    history: Mutex<AlertHistory>,
    metrics: EngineMetrics,
    logger: StructuredLogger,
}

impl Engine {
    /// Build an engine, rejecting invalid configuration
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let rules = Rule::ALL
            .into_iter()
            .filter(|rule| config.is_enabled(*rule))
            .collect();

        Ok(Self {
            history: Mutex::new(AlertHistory::new(config.history_capacity)),
            rules,
            config,
            metrics: EngineMetrics::new(),
            logger: StructuredLogger::new("default"),
        })
    }

    /// Set the cluster name attached to log events
    pub fn with_cluster_name(mut self, cluster: impl Into<String>) -> Self {
        self.logger = StructuredLogger::new(cluster);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Rules that run on every cycle, in evaluation order
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Evaluate one snapshot and its metrics sample
    pub fn run_cycle(&self, snapshot: &ClusterSnapshot, metrics: &[PodMetricSample]) -> CycleReport {
        let start = Instant::now();
        let ctx = RuleContext {
            snapshot,
            metrics,
            config: &self.config,
        };

        let (candidates, errors) =
            collect_candidates(&self.rules, self.config.parallel_rules, |rule| {
                rule.evaluate(&ctx)
            });

        for err in &errors {
            self.logger.log_rule_failure(err);
            self.metrics.inc_rule_failure(&err.rule().to_string());
        }
        debug!(candidates = candidates.len(), "Rules evaluated");

        let alerts = {
            let mut history = self.lock_history();
            let (alerts, updated) = aggregate(candidates, std::mem::take(&mut *history));
            *history = updated;
            self.metrics.set_history_entries(history.len());
            alerts
        };

        let health_scores = score_deployments(snapshot);

        let elapsed = start.elapsed();
        self.metrics.observe_cycle(elapsed.as_secs_f64());
        self.metrics.set_current_alerts(&alerts);
        self.metrics.set_deployments_scored(health_scores.len());
        for alert in &alerts {
            self.logger.log_alert(alert);
        }
        self.logger
            .log_cycle(&alerts, health_scores.len(), errors.len(), elapsed.as_millis());

        CycleReport {
            alerts,
            health_scores,
            summary: snapshot.summary(),
            failed_rules: errors.iter().map(RuleFailure::from).collect(),
        }
    }

    /// Alerts retained in history, oldest first
    pub fn history(&self) -> Vec<Alert> {
        self.lock_history().iter().cloned().collect()
    }

    /// The `limit` most recent alerts in history, newest first
    pub fn recent_alerts(&self, limit: usize) -> Vec<Alert> {
        self.lock_history().recent(limit)
    }

    fn lock_history(&self) -> MutexGuard<'_, AlertHistory> {
        // Aggregation never leaves the history half-written, so a poisoned
        // lock still guards a consistent buffer.
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Score every deployment in the snapshot, including ones with no pods
pub fn score_deployments(snapshot: &ClusterSnapshot) -> BTreeMap<String, HealthScoreEntry> {
    let owned = snapshot.pods_by_owner();
    snapshot
        .deployments
        .iter()
        .map(|dep| {
            let pods = owned
                .get(&(dep.namespace.as_str(), dep.name.as_str()))
                .into_iter()
                .flatten()
                .copied();
            (dep.name.clone(), health::score(dep, pods))
        })
        .collect()
}

/// Run `eval` for every rule, isolating failures
///
/// Candidates come back in rule order whether or not the rules ran in
/// parallel. A rule that returns an error or panics contributes no
/// candidates and is reported in the error list instead.
fn collect_candidates<F>(rules: &[Rule], parallel: bool, eval: F) -> (Vec<Alert>, Vec<RuleError>)
where
    F: Fn(Rule) -> Result<Vec<Alert>, RuleError> + Sync,
{
    let results: Vec<Result<Vec<Alert>, RuleError>> = if parallel {
        std::thread::scope(|scope| {
            let eval = &eval;
            let handles: Vec<_> = rules
                .iter()
                .map(|&rule| (rule, scope.spawn(move || eval(rule))))
                .collect();

            handles
                .into_iter()
                .map(|(rule, handle)| {
                    handle
                        .join()
                        .unwrap_or_else(|payload| Err(panicked(rule, payload)))
                })
                .collect()
        })
    } else {
        rules
            .iter()
            .map(|&rule| {
                panic::catch_unwind(AssertUnwindSafe(|| eval(rule)))
                    .unwrap_or_else(|payload| Err(panicked(rule, payload)))
            })
            .collect()
    };

    let mut candidates = Vec::new();
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(alerts) => candidates.extend(alerts),
            Err(err) => errors.push(err),
        }
    }
    (candidates, errors)
}

fn panicked(rule: Rule, payload: Box<dyn Any + Send>) -> RuleError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    RuleError::Panicked { rule, message }
}
