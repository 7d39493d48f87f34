//! Poller configuration

use anyhow::{ensure, Context, Result};
use kubewatch_core::EngineConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming an optional configuration file
pub const CONFIG_PATH_ENV: &str = "KUBEWATCH_CONFIG";

/// Poller configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Cluster name attached to log events
    #[serde(default = "default_cluster_name")]
    pub cluster_name: String,

    /// Snapshot document written by the collector
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,

    /// Where to write each cycle report; stdout when unset
    #[serde(default)]
    pub output_path: Option<PathBuf>,

    /// Evaluation interval in seconds
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Run a single cycle and exit
    #[serde(default)]
    pub once: bool,

    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_cluster_name() -> String {
    "default".to_string()
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("/var/lib/kubewatch/snapshot.json")
}

fn default_interval() -> u64 {
    30
}

impl AgentConfig {
    /// Load configuration from the file named by `KUBEWATCH_CONFIG` (if any)
    /// and `KUBEWATCH_`-prefixed environment variables
    pub fn load() -> Result<Self> {
        let file = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        Self::from_sources(file.as_deref(), environment())
    }

    /// Build from an optional file, with `env` taking precedence
    ///
    /// Nested engine settings use a double underscore, e.g.
    /// `KUBEWATCH_ENGINE__CPU_WARN_PCT=80`.
    pub fn from_sources(file: Option<&Path>, env: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(env)
            .build()
            .context("Failed to read configuration")?;
        let config: AgentConfig = settings
            .try_deserialize()
            .context("Invalid configuration")?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(self.interval_secs > 0, "interval_secs must be at least 1");
        self.engine
            .validate()
            .context("Invalid engine configuration")?;
        Ok(())
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix("KUBEWATCH")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("engine.disabled_rules")
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubewatch_core::Rule;
    use std::io::Write;

    fn no_env() -> config::Environment {
        environment().source(Some(config::Map::new()))
    }

    fn env_of(pairs: &[(&str, &str)]) -> config::Environment {
        let vars = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        environment().source(Some(vars))
    }

    fn toml_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_without_sources() {
        let config = AgentConfig::from_sources(None, no_env()).unwrap();
        assert_eq!(config.cluster_name, "default");
        assert_eq!(config.interval_secs, 30);
        assert!(config.output_path.is_none());
        assert!(!config.once);
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn test_file_values() {
        let file = toml_file(
            r#"
cluster_name = "prod-eu"
snapshot_path = "/tmp/snap.json"
interval_secs = 10

[engine]
restart_warn_threshold = 3
cpu_crit_pct = 95.0
disabled_rules = ["k8s_warning_event"]
"#,
        );

        let config = AgentConfig::from_sources(Some(file.path()), no_env()).unwrap();
        assert_eq!(config.cluster_name, "prod-eu");
        assert_eq!(config.snapshot_path, PathBuf::from("/tmp/snap.json"));
        assert_eq!(config.interval_secs, 10);
        assert_eq!(config.engine.restart_warn_threshold, 3);
        assert_eq!(config.engine.restart_crit_threshold, 15);
        assert_eq!(config.engine.cpu_crit_pct, 95.0);
        assert_eq!(config.engine.disabled_rules, vec![Rule::K8sWarningEvent]);
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = toml_file("interval_secs = 10\n");
        let env = env_of(&[
            ("KUBEWATCH_INTERVAL_SECS", "5"),
            ("KUBEWATCH_ENGINE__HISTORY_CAPACITY", "50"),
        ]);

        let config = AgentConfig::from_sources(Some(file.path()), env).unwrap();
        assert_eq!(config.interval_secs, 5);
        assert_eq!(config.engine.history_capacity, 50);
    }

    #[test]
    fn test_malformed_value_is_an_error() {
        let env = env_of(&[("KUBEWATCH_ENGINE__CPU_WARN_PCT", "lots")]);
        assert!(AgentConfig::from_sources(None, env).is_err());
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let file = toml_file("[engine]\nrestart_warn_threshold = 20\nrestart_crit_threshold = 10\n");
        let err = AgentConfig::from_sources(Some(file.path()), no_env()).unwrap_err();
        assert!(format!("{err:#}").contains("restart_warn_threshold"));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let env = env_of(&[("KUBEWATCH_INTERVAL_SECS", "0")]);
        assert!(AgentConfig::from_sources(None, env).is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let path = Path::new("/nonexistent/kubewatch.toml");
        assert!(AgentConfig::from_sources(Some(path), no_env()).is_err());
    }
}
