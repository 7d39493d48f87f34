//! Engine configuration
//!
//! Values are validated once when the engine is built. A bad value is a
//! construction error and is never replaced by a default mid-run.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rules::Rule;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be at least 1, got {value}")]
    ZeroThreshold { field: &'static str, value: u32 },

    #[error("{warn_field} ({warn}) must not exceed {crit_field} ({crit})")]
    InvertedThresholds {
        warn_field: &'static str,
        warn: f64,
        crit_field: &'static str,
        crit: f64,
    },

    #[error("{field} must be a finite percentage above 0, got {value}")]
    InvalidPercentage { field: &'static str, value: f64 },

    #[error("history_capacity must be at least 1")]
    ZeroHistoryCapacity,
}

/// Thresholds and limits used by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_restart_warn")]
    pub restart_warn_threshold: u32,

    #[serde(default = "default_restart_crit")]
    pub restart_crit_threshold: u32,

    #[serde(default = "default_cpu_warn")]
    pub cpu_warn_pct: f64,

    #[serde(default = "default_cpu_crit")]
    pub cpu_crit_pct: f64,

    #[serde(default = "default_memory_warn")]
    pub memory_warn_pct: f64,

    #[serde(default = "default_memory_crit")]
    pub memory_crit_pct: f64,

    /// Number of past alerts retained for trend display
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// How long a pod may sit in Pending before it is reported
    #[serde(default)]
    pub pending_grace_seconds: u64,

    /// Evaluate rules on scoped threads
    #[serde(default)]
    pub parallel_rules: bool,

    #[serde(default)]
    pub disabled_rules: Vec<Rule>,
}

fn default_restart_warn() -> u32 {
    5
}

fn default_restart_crit() -> u32 {
    15
}

fn default_cpu_warn() -> f64 {
    70.0
}

fn default_cpu_crit() -> f64 {
    90.0
}

fn default_memory_warn() -> f64 {
    75.0
}

fn default_memory_crit() -> f64 {
    90.0
}

fn default_history_capacity() -> usize {
    200
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            restart_warn_threshold: default_restart_warn(),
            restart_crit_threshold: default_restart_crit(),
            cpu_warn_pct: default_cpu_warn(),
            cpu_crit_pct: default_cpu_crit(),
            memory_warn_pct: default_memory_warn(),
            memory_crit_pct: default_memory_crit(),
            history_capacity: default_history_capacity(),
            pending_grace_seconds: 0,
            parallel_rules: false,
            disabled_rules: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Check every threshold, returning the first problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.restart_warn_threshold == 0 {
            return Err(ConfigError::ZeroThreshold {
                field: "restart_warn_threshold",
                value: self.restart_warn_threshold,
            });
        }
        if self.restart_warn_threshold > self.restart_crit_threshold {
            return Err(ConfigError::InvertedThresholds {
                warn_field: "restart_warn_threshold",
                warn: f64::from(self.restart_warn_threshold),
                crit_field: "restart_crit_threshold",
                crit: f64::from(self.restart_crit_threshold),
            });
        }

        check_pct_pair(
            ("cpu_warn_pct", self.cpu_warn_pct),
            ("cpu_crit_pct", self.cpu_crit_pct),
        )?;
        check_pct_pair(
            ("memory_warn_pct", self.memory_warn_pct),
            ("memory_crit_pct", self.memory_crit_pct),
        )?;

        if self.history_capacity == 0 {
            return Err(ConfigError::ZeroHistoryCapacity);
        }

        Ok(())
    }

    pub fn is_enabled(&self, rule: Rule) -> bool {
        !self.disabled_rules.contains(&rule)
    }
}

fn check_pct_pair(warn: (&'static str, f64), crit: (&'static str, f64)) -> Result<(), ConfigError> {
    for (field, value) in [warn, crit] {
        if !value.is_finite() || value <= 0.0 {
            return Err(ConfigError::InvalidPercentage { field, value });
        }
    }
    if warn.1 > crit.1 {
        return Err(ConfigError::InvertedThresholds {
            warn_field: warn.0,
            warn: warn.1,
            crit_field: crit.0,
            crit: crit.1,
        });
    }
    Ok(())
}
