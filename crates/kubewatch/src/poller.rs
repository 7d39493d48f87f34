//! Snapshot polling loop
//!
//! Reads the snapshot document written by the collector on a fixed interval,
//! runs one engine cycle per read and publishes the report.

use anyhow::{Context, Result};
use kubewatch_core::{ClusterSnapshot, CycleReport, Engine, PodMetricSample};
use serde::Deserialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// One collector output: a snapshot plus the metrics sampled with it
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotDocument {
    pub snapshot: ClusterSnapshot,
    #[serde(default)]
    pub metrics: Vec<PodMetricSample>,
}

/// Read and parse a snapshot document
pub async fn read_snapshot(path: &Path) -> Result<SnapshotDocument> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    serde_json::from_slice(&raw)
        .with_context(|| format!("Malformed snapshot document {}", path.display()))
}

/// Write a report as pretty JSON to `output`, or to stdout when unset
///
/// File output goes through a temporary sibling and a rename so readers
/// never see a partial report.
pub async fn write_report(report: &CycleReport, output: Option<&Path>) -> Result<()> {
    let mut body = serde_json::to_vec_pretty(report).context("Failed to serialize report")?;
    body.push(b'\n');

    match output {
        Some(path) => {
            let tmp = temp_sibling(path);
            tokio::fs::write(&tmp, &body)
                .await
                .with_context(|| format!("Failed to write {}", tmp.display()))?;
            tokio::fs::rename(&tmp, path)
                .await
                .with_context(|| format!("Failed to replace {}", path.display()))?;
        }
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&body).await?;
            stdout.flush().await?;
        }
    }
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Drives the engine from the snapshot file
pub struct Poller {
    engine: Engine,
    snapshot_path: PathBuf,
    output_path: Option<PathBuf>,
    interval: Duration,
}

impl Poller {
    pub fn new(
        engine: Engine,
        snapshot_path: PathBuf,
        output_path: Option<PathBuf>,
        interval: Duration,
    ) -> Self {
        Self {
            engine,
            snapshot_path,
            output_path,
            interval,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Read the current snapshot, evaluate it and publish the report
    pub async fn poll_once(&self) -> Result<CycleReport> {
        let doc = read_snapshot(&self.snapshot_path).await?;
        debug!(
            pods = doc.snapshot.pods.len(),
            samples = doc.metrics.len(),
            captured_at = %doc.snapshot.captured_at,
            "Snapshot loaded"
        );

        let report = self.engine.run_cycle(&doc.snapshot, &doc.metrics);
        write_report(&report, self.output_path.as_deref()).await?;
        Ok(report)
    }

    /// Poll until `shutdown` resolves
    ///
    /// A failed poll is logged and retried on the next tick; the engine and
    /// its history are left untouched.
    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        info!(
            interval_secs = self.interval.as_secs(),
            snapshot = %self.snapshot_path.display(),
            "Starting snapshot poller"
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        warn!(error = %format!("{e:#}"), "Poll failed, retrying next interval");
                    }
                }
                _ = &mut shutdown => {
                    info!("Shutting down snapshot poller");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubewatch_core::{AlertKind, EngineConfig};

    const DOCUMENT: &str = r#"{
        "snapshot": {
            "captured_at": "2024-01-01T12:00:00Z",
            "pods": [
                {"name": "web-1", "namespace": "default", "status": "Failed"},
                {
                    "name": "api-5f6d-x1", "namespace": "default", "status": "Running",
                    "restart_count": 6, "cpu_limit": "500m"
                }
            ],
            "deployments": [
                {"name": "api", "namespace": "default", "replicas_desired": 2, "replicas_ready": 1}
            ]
        },
        "metrics": [
            {"pod": "api-5f6d-x1", "namespace": "default", "cpu_usage_millicores": 480, "memory_usage_mb": 90}
        ]
    }"#;

    fn poller(dir: &Path, output: Option<PathBuf>) -> Poller {
        Poller::new(
            Engine::new(EngineConfig::default()).unwrap(),
            dir.join("snapshot.json"),
            output,
            Duration::from_millis(10),
        )
    }

    #[tokio::test]
    async fn test_poll_once_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("snapshot.json"), DOCUMENT).unwrap();
        let output = dir.path().join("report.json");

        let report = poller(dir.path(), Some(output.clone()))
            .poll_once()
            .await
            .unwrap();

        let kinds: Vec<_> = report.alerts.iter().map(|a| a.kind).collect();
        assert!(kinds.contains(&AlertKind::PodFailed));
        assert!(kinds.contains(&AlertKind::HighRestarts));
        assert!(kinds.contains(&AlertKind::HighCpu));
        assert!(kinds.contains(&AlertKind::DeploymentDegraded));

        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&output).unwrap()).unwrap();
        assert_eq!(written["health_scores"]["api"]["replicas"], "1/2");
        assert!(!dir.path().join("report.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let poller = poller(dir.path(), Some(dir.path().join("report.json")));

        let err = poller.poll_once().await.unwrap_err();
        assert!(err.to_string().contains("Failed to read snapshot"));
        assert!(poller.engine().history().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("snapshot.json"), "{\"snapshot\": 3}").unwrap();

        let err = poller(dir.path(), None).poll_once().await.unwrap_err();
        assert!(err.to_string().contains("Malformed snapshot document"));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("snapshot.json"), DOCUMENT).unwrap();
        let output = dir.path().join("report.json");

        let poller = poller(dir.path(), Some(output.clone()));
        poller
            .run(tokio::time::sleep(Duration::from_millis(50)))
            .await;

        assert!(output.exists());
    }
}
