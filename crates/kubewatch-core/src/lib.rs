//! Alert detection and health scoring for Kubernetes cluster snapshots
//!
//! This crate provides:
//! - A normalized snapshot model of pods, deployments, nodes, services and events
//! - Rule evaluators for common failure patterns (failed pods, crash loops,
//!   image pull errors, replica shortfalls, restart storms, resource pressure)
//! - Alert aggregation with deduplication, ordering and bounded history
//! - Per-deployment health scores
//! - Prometheus metrics and structured logging for each cycle

pub mod aggregator;
pub mod alert;
pub mod config;
pub mod engine;
pub mod health;
pub mod models;
pub mod observability;
pub mod quantity;
pub mod rules;

pub use aggregator::{aggregate, AlertHistory};
pub use alert::{Alert, AlertKind, Severity, Subject};
pub use config::{ConfigError, EngineConfig};
pub use engine::{CycleReport, Engine, RuleFailure};
pub use health::{HealthScoreEntry, HealthStatus, ReplicaCount};
pub use models::*;
pub use observability::{EngineMetrics, StructuredLogger};
pub use rules::{Rule, RuleError};
