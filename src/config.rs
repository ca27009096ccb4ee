use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::error::PipelensError;

/// Configuration file structure for Pipelens.
///
/// Holds rule thresholds, monitoring cadence, history sizing and pattern-rule
/// parameters. Configuration files are loaded from the current directory or
/// specified path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Monitoring loop and alert thresholds
    #[serde(default)]
    pub monitoring: MonitoringConfig,

    /// Pipeline sources and analysis scope
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Parameters for history-based pattern rules
    #[serde(default)]
    pub patterns: PatternConfig,

    /// Per-rule threshold overrides keyed by rule id
    #[serde(default)]
    pub rule_overrides: BTreeMap<String, f64>,

    /// Output format preferences
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MonitoringConfig {
    /// Seconds between monitor cycles
    #[serde(default = "default_interval")]
    pub interval: u64,

    /// Upper bound in seconds for a single collection call
    #[serde(default = "default_collection_timeout")]
    pub collection_timeout: u64,

    /// Seconds granted to an in-flight pass once shutdown is requested
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace: u64,

    /// Reliability issue count that must be exceeded to report a systemic problem
    #[serde(default = "default_systemic_threshold")]
    pub systemic_threshold: usize,

    /// Maximum distance in seconds between two correlated issues
    #[serde(default = "default_correlation_window")]
    pub correlation_window: u64,

    /// Consecutive failed cycles after which the monitor stops
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    #[serde(default)]
    pub alert_threshold: AlertThresholds,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AlertThresholds {
    /// Failure ratio for deployment and training failure rules
    #[serde(default = "default_failure_rate")]
    pub failure_rate: f64,

    /// Duration ratio against the recent baseline for regression detection
    #[serde(default = "default_duration_increase")]
    pub duration_increase: f64,

    /// Utilization ratio for build infrastructure CPU and memory rules
    #[serde(default = "default_resource_usage")]
    pub resource_usage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PipelineConfig {
    #[serde(default)]
    pub devops_sources: Vec<String>,

    #[serde(default)]
    pub mlops_sources: Vec<String>,

    /// Snapshots retained per pipeline for pattern rules
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    #[serde(default)]
    pub analysis_depth: AnalysisDepth,

    /// Days of data requested from each collector
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisDepth {
    Basic,
    #[default]
    Detailed,
    Comprehensive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PatternConfig {
    #[serde(default = "default_flaky_window")]
    pub flaky_window: usize,

    #[serde(default = "default_flaky_transitions")]
    pub flaky_transitions: usize,

    #[serde(default = "default_regression_window")]
    pub regression_window: usize,

    #[serde(default = "default_trend_window")]
    pub trend_window: usize,

    #[serde(default = "default_trend_min_rise")]
    pub trend_min_rise: f64,

    #[serde(default = "default_degradation_window")]
    pub degradation_window: usize,

    #[serde(default = "default_degradation_min_drop")]
    pub degradation_min_drop: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,

    /// Pretty-print JSON output
    #[serde(default)]
    pub pretty: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Summary,
    Json,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            collection_timeout: default_collection_timeout(),
            shutdown_grace: default_shutdown_grace(),
            systemic_threshold: default_systemic_threshold(),
            correlation_window: default_correlation_window(),
            max_consecutive_failures: default_max_consecutive_failures(),
            alert_threshold: AlertThresholds::default(),
        }
    }
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            failure_rate: default_failure_rate(),
            duration_increase: default_duration_increase(),
            resource_usage: default_resource_usage(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            devops_sources: Vec::new(),
            mlops_sources: Vec::new(),
            max_history: default_max_history(),
            analysis_depth: AnalysisDepth::default(),
            lookback_days: default_lookback_days(),
        }
    }
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            flaky_window: default_flaky_window(),
            flaky_transitions: default_flaky_transitions(),
            regression_window: default_regression_window(),
            trend_window: default_trend_window(),
            trend_min_rise: default_trend_min_rise(),
            degradation_window: default_degradation_window(),
            degradation_min_drop: default_degradation_min_drop(),
        }
    }
}

fn default_interval() -> u64 {
    300
}

fn default_collection_timeout() -> u64 {
    30
}

fn default_shutdown_grace() -> u64 {
    5
}

fn default_systemic_threshold() -> usize {
    3
}

fn default_correlation_window() -> u64 {
    3600
}

fn default_max_consecutive_failures() -> u32 {
    5
}

fn default_failure_rate() -> f64 {
    0.10
}

fn default_duration_increase() -> f64 {
    1.5
}

fn default_resource_usage() -> f64 {
    0.8
}

fn default_max_history() -> usize {
    100
}

fn default_lookback_days() -> u32 {
    7
}

fn default_flaky_window() -> usize {
    10
}

fn default_flaky_transitions() -> usize {
    2
}

fn default_regression_window() -> usize {
    5
}

fn default_trend_window() -> usize {
    5
}

fn default_trend_min_rise() -> f64 {
    0.05
}

fn default_degradation_window() -> usize {
    5
}

fn default_degradation_min_drop() -> f64 {
    0.05
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./pipelens.toml
    /// 3. ./pipelens.json
    /// 4. ./pipelens.yaml
    /// 5. ./pipelens.yml
    ///
    /// Returns default configuration if no path was given and no file is found.
    /// A path that was given explicitly must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            return Self::load_from_path(path);
        }

        let candidates = [
            "pipelens.toml",
            "pipelens.json",
            "pipelens.yaml",
            "pipelens.yml",
        ];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }

    /// Checks that every threshold and sizing parameter is usable.
    ///
    /// # Errors
    ///
    /// Returns `PipelensError::Config` naming the first offending key.
    pub fn validate(&self) -> crate::error::Result<()> {
        let monitoring = &self.monitoring;
        let thresholds = &monitoring.alert_threshold;
        let patterns = &self.patterns;

        let checks: [(bool, &str); 16] = [
            (monitoring.interval > 0, "monitoring.interval must be positive"),
            (
                monitoring.collection_timeout > 0,
                "monitoring.collection-timeout must be positive",
            ),
            (
                monitoring.systemic_threshold > 0,
                "monitoring.systemic-threshold must be positive",
            ),
            (
                monitoring.correlation_window > 0,
                "monitoring.correlation-window must be positive",
            ),
            (
                monitoring.max_consecutive_failures > 0,
                "monitoring.max-consecutive-failures must be positive",
            ),
            (
                is_ratio(thresholds.failure_rate),
                "monitoring.alert-threshold.failure-rate must be in (0, 1]",
            ),
            (
                is_ratio(thresholds.resource_usage),
                "monitoring.alert-threshold.resource-usage must be in (0, 1]",
            ),
            (
                thresholds.duration_increase.is_finite() && thresholds.duration_increase > 1.0,
                "monitoring.alert-threshold.duration-increase must be greater than 1",
            ),
            (self.pipeline.max_history > 0, "pipeline.max-history must be positive"),
            (self.pipeline.lookback_days > 0, "pipeline.lookback-days must be positive"),
            (patterns.flaky_window >= 2, "patterns.flaky-window must be at least 2"),
            (
                patterns.regression_window > 0,
                "patterns.regression-window must be positive",
            ),
            (patterns.trend_window >= 2, "patterns.trend-window must be at least 2"),
            (
                is_ratio(patterns.trend_min_rise),
                "patterns.trend-min-rise must be in (0, 1]",
            ),
            (
                patterns.degradation_window > 0,
                "patterns.degradation-window must be positive",
            ),
            (
                is_ratio(patterns.degradation_min_drop),
                "patterns.degradation-min-drop must be in (0, 1]",
            ),
        ];

        if let Some((_, message)) = checks.iter().find(|(ok, _)| !ok) {
            return Err(PipelensError::Config((*message).to_string()));
        }

        if let Some((rule, value)) = self.rule_overrides.iter().find(|(_, v)| !v.is_finite()) {
            return Err(PipelensError::Config(format!(
                "rule-overrides.{rule} must be a finite number, got {value}"
            )));
        }

        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.monitoring.interval)
    }

    pub fn collection_timeout(&self) -> Duration {
        Duration::from_secs(self.monitoring.collection_timeout)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.monitoring.shutdown_grace)
    }

    pub fn correlation_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(
            i64::try_from(self.monitoring.correlation_window).unwrap_or(i64::MAX),
        )
    }
}

fn is_ratio(value: f64) -> bool {
    value.is_finite() && value > 0.0 && value <= 1.0
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.monitoring.interval, 300);
        assert_eq!(config.monitoring.systemic_threshold, 3);
        assert_eq!(config.monitoring.alert_threshold.failure_rate, 0.10);
        assert_eq!(config.monitoring.alert_threshold.duration_increase, 1.5);
        assert_eq!(config.monitoring.alert_threshold.resource_usage, 0.8);
        assert_eq!(config.pipeline.max_history, 100);
        assert_eq!(config.pipeline.analysis_depth, AnalysisDepth::Detailed);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_toml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        let toml_content = r#"
[monitoring]
interval = 60
systemic-threshold = 4

[monitoring.alert-threshold]
failure-rate = 0.2

[pipeline]
devops-sources = ["https://ci.example.com/snapshot"]
max-history = 20
analysis-depth = "comprehensive"

[rule-overrides]
build_failure_rate = 0.3

[output]
format = "json"
"#;
        write!(temp_file, "{toml_content}").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.monitoring.interval, 60);
        assert_eq!(config.monitoring.systemic_threshold, 4);
        assert_eq!(config.monitoring.alert_threshold.failure_rate, 0.2);
        assert_eq!(config.monitoring.alert_threshold.resource_usage, 0.8);
        assert_eq!(
            config.pipeline.devops_sources,
            vec!["https://ci.example.com/snapshot".to_string()]
        );
        assert_eq!(config.pipeline.max_history, 20);
        assert_eq!(
            config.pipeline.analysis_depth,
            AnalysisDepth::Comprehensive
        );
        assert_eq!(config.rule_overrides.get("build_failure_rate"), Some(&0.3));
        assert_eq!(config.output.format, OutputFormat::Json);
    }

    #[test]
    fn test_load_yaml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".yaml").unwrap();
        let yaml_content = r"
monitoring:
  interval: 120
pipeline:
  mlops-sources:
    - ./snapshots
  analysis-depth: basic
";
        write!(temp_file, "{yaml_content}").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.monitoring.interval, 120);
        assert_eq!(config.pipeline.mlops_sources, vec!["./snapshots".to_string()]);
        assert_eq!(config.pipeline.analysis_depth, AnalysisDepth::Basic);
    }

    #[test]
    fn test_load_nonexistent_explicit_path_fails() {
        let result = Config::load(Some(Path::new("nonexistent-pipelens.toml")));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not found"));
    }

    #[test]
    fn test_load_malformed_config_fails() {
        let mut temp_file = NamedTempFile::with_suffix(".json").unwrap();
        write!(temp_file, "{{ not json").unwrap();

        assert!(Config::load_from_path(temp_file.path()).is_err());
    }

    #[test]
    fn test_serialized_config_reloads() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("pipelens.toml");

        let mut config = Config::default();
        config.monitoring.interval = 42;
        config.rule_overrides.insert("inference_latency_p95".into(), 250.0);
        std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

        let reloaded = Config::load(Some(&path)).unwrap();
        assert_eq!(reloaded.monitoring.interval, 42);
        assert_eq!(
            reloaded.rule_overrides.get("inference_latency_p95"),
            Some(&250.0)
        );
    }

    mod validate {
        use super::*;

        fn assert_rejected(config: &Config, needle: &str) {
            let err = config.validate().unwrap_err();
            assert!(
                matches!(err, PipelensError::Config(_)),
                "Should be a configuration error"
            );
            assert!(
                err.to_string().contains(needle),
                "Error '{err}' should mention '{needle}'"
            );
        }

        #[test]
        fn rejects_zero_interval() {
            let mut config = Config::default();
            config.monitoring.interval = 0;
            assert_rejected(&config, "monitoring.interval");
        }

        #[test]
        fn rejects_zero_history() {
            let mut config = Config::default();
            config.pipeline.max_history = 0;
            assert_rejected(&config, "max-history");
        }

        #[test]
        fn rejects_failure_rate_above_one() {
            let mut config = Config::default();
            config.monitoring.alert_threshold.failure_rate = 1.5;
            assert_rejected(&config, "failure-rate");
        }

        #[test]
        fn rejects_duration_increase_not_above_one() {
            let mut config = Config::default();
            config.monitoring.alert_threshold.duration_increase = 1.0;
            assert_rejected(&config, "duration-increase");
        }

        #[test]
        fn rejects_non_finite_override() {
            let mut config = Config::default();
            config
                .rule_overrides
                .insert("build_failure_rate".into(), f64::NAN);
            assert_rejected(&config, "rule-overrides.build_failure_rate");
        }
    }
}
