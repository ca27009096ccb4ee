use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PipelensError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineType {
    Devops,
    Mlops,
}

impl PipelineType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Devops => "devops",
            Self::Mlops => "mlops",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Devops => "DevOps",
            Self::Mlops => "MLOps",
        }
    }
}

impl fmt::Display for PipelineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single metric reading. Numbers and categorical labels share one map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Category(String),
}

impl MetricValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Category(_) => None,
        }
    }

    pub fn as_category(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Category(c) => Some(c.as_str()),
        }
    }
}

/// One timestamped bundle of metric readings for one pipeline.
///
/// Snapshots are built once by a collector and then only read; the engine
/// shares them behind `Arc` and never exposes a mutable view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pipeline_type: PipelineType,
    source_id: String,
    captured_at: DateTime<Utc>,
    /// Duplicate metric names are rejected rather than letting the last one win.
    #[serde(default, deserialize_with = "unique_metrics::deserialize")]
    metrics: BTreeMap<String, MetricValue>,
}

mod unique_metrics {
    use std::collections::BTreeMap;
    use std::fmt;

    use serde::de::{Error, MapAccess, Visitor};
    use serde::Deserializer;

    use super::MetricValue;

    struct UniqueKeys;

    impl<'de> Visitor<'de> for UniqueKeys {
        type Value = BTreeMap<String, MetricValue>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of metric names to values")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut metrics = BTreeMap::new();
            while let Some((name, value)) = access.next_entry::<String, MetricValue>()? {
                if metrics.contains_key(&name) {
                    return Err(A::Error::custom(format!("duplicate metric '{name}'")));
                }
                metrics.insert(name, value);
            }
            Ok(metrics)
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<String, MetricValue>, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(UniqueKeys)
    }
}

impl MetricsSnapshot {
    pub fn new(
        pipeline_type: PipelineType,
        source_id: impl Into<String>,
        captured_at: DateTime<Utc>,
        metrics: BTreeMap<String, MetricValue>,
    ) -> Self {
        Self {
            pipeline_type,
            source_id: source_id.into(),
            captured_at,
            metrics,
        }
    }

    pub fn empty(
        pipeline_type: PipelineType,
        source_id: impl Into<String>,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self::new(pipeline_type, source_id, captured_at, BTreeMap::new())
    }

    #[must_use]
    pub fn with_number(mut self, name: &str, value: f64) -> Self {
        self.metrics
            .insert(name.to_string(), MetricValue::Number(value));
        self
    }

    #[must_use]
    pub fn with_category(mut self, name: &str, value: &str) -> Self {
        self.metrics
            .insert(name.to_string(), MetricValue::Category(value.to_string()));
        self
    }

    pub fn pipeline_type(&self) -> PipelineType {
        self.pipeline_type
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn metrics(&self) -> &BTreeMap<String, MetricValue> {
        &self.metrics
    }

    pub fn metric(&self, name: &str) -> Option<&MetricValue> {
        self.metrics.get(name)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.metric(name).and_then(MetricValue::as_number)
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Performance,
    Reliability,
    Security,
    Quality,
    Cost,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Performance => "performance",
            Self::Reliability => "reliability",
            Self::Security => "security",
            Self::Quality => "quality",
            Self::Cost => "cost",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity tiers, declared from least to most severe so `Ord` follows urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const DESCENDING: [Self; 4] = [Self::Critical, Self::High, Self::Medium, Self::Low];

    pub fn tier(self) -> usize {
        self as usize
    }

    pub fn from_tier(tier: usize) -> Self {
        match tier {
            0 => Self::Low,
            1 => Self::Medium,
            2 => Self::High,
            _ => Self::Critical,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub rule_id: String,
    pub title: String,
    pub category: Category,
    pub severity: Severity,
    pub confidence: f64,
    pub affected_component: String,
    pub pipeline_type: PipelineType,
    pub description: String,
    pub impact: String,
    pub recommendation_hint: String,
    pub detected_at: DateTime<Utc>,
    pub evidence: BTreeMap<String, String>,
}

/// An issue describing a relationship between issues of different stages or pipelines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossPipelineIssue {
    #[serde(flatten)]
    pub issue: Issue,
    pub linked_issue_ids: BTreeSet<String>,
    pub pipeline_types: Vec<PipelineType>,
}

impl CrossPipelineIssue {
    /// Links `issue` to its contributors.
    ///
    /// # Errors
    ///
    /// Returns `PipelensError::Invariant` unless the contributors span at least two
    /// pipeline types or two components of the same pipeline.
    pub fn link(issue: Issue, contributors: &[&Issue]) -> Result<Self> {
        let linked_issue_ids: BTreeSet<String> =
            contributors.iter().map(|c| c.id.clone()).collect();
        let pipelines: BTreeSet<PipelineType> =
            contributors.iter().map(|c| c.pipeline_type).collect();
        let components: BTreeSet<(PipelineType, &str)> = contributors
            .iter()
            .map(|c| (c.pipeline_type, c.affected_component.as_str()))
            .collect();

        if linked_issue_ids.is_empty() || (pipelines.len() < 2 && components.len() < 2) {
            return Err(PipelensError::Invariant(format!(
                "cross-pipeline issue '{}' must link issues from two pipelines or two components",
                issue.rule_id
            )));
        }

        Ok(Self {
            issue,
            linked_issue_ids,
            pipeline_types: pipelines.into_iter().collect(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationType {
    Time,
    Cost,
    Reliability,
    Performance,
    Quality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effort {
    Low,
    Medium,
    High,
}

impl Effort {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Optimization {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: OptimizationType,
    pub priority: u8,
    pub effort: Effort,
    pub steps: Vec<String>,
    pub expected_metric_deltas: BTreeMap<String, f64>,
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub number: usize,
    pub name: String,
    pub quick_wins: bool,
    pub optimization_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roadmap {
    pub phases: Vec<Phase>,
}

impl Roadmap {
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    pub fn optimization_ids(&self) -> impl Iterator<Item = &str> {
        self.phases
            .iter()
            .flat_map(|p| p.optimization_ids.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    Analyze,
    Monitor,
    Optimize,
}

impl AnalysisMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Analyze => "analyze",
            Self::Monitor => "monitor",
            Self::Optimize => "optimize",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DataStatus {
    Complete,
    Partial { failures: Vec<String> },
    Missing { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineAnalysis {
    pub pipeline_type: PipelineType,
    pub source_id: String,
    pub data_status: DataStatus,
    pub issues: Vec<Issue>,
}

/// Structured output of one analysis pass, consumed by the report layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub generated_at: DateTime<Utc>,
    pub mode: AnalysisMode,
    pub pipelines: Vec<PipelineAnalysis>,
    pub cross_pipeline_issues: Vec<CrossPipelineIssue>,
    pub optimizations: Vec<Optimization>,
    pub roadmap: Roadmap,
    pub notes: Vec<String>,
}

impl AnalysisReport {
    pub fn all_issues(&self) -> impl Iterator<Item = &Issue> {
        self.pipelines.iter().flat_map(|p| p.issues.iter())
    }

    pub fn total_issues(&self) -> usize {
        self.pipelines.iter().map(|p| p.issues.len()).sum()
    }

    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.all_issues()
            .chain(self.cross_pipeline_issues.iter().map(|c| &c.issue))
            .filter(|i| i.severity == severity)
            .count()
    }
}
