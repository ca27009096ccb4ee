use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use sha2::{Digest, Sha256};

use crate::config::AnalysisDepth;
use crate::insights::{Category, Issue, MetricValue, MetricsSnapshot, PipelineType, Severity};

use super::history::HistoryWindow;
use super::patterns;
use super::rules::{band_tier, PatternRule, RuleCatalog, Threshold, ThresholdRule};
use super::scorer::severity_for;

/// Stable issue id: the first 16 hex digits of SHA-256 over the identifying fields.
pub fn issue_id(
    category: Category,
    component: &str,
    pipeline: PipelineType,
    rule_id: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{category}|{component}|{pipeline}|{rule_id}").as_bytes());
    let mut id = format!("{:x}", hasher.finalize());
    id.truncate(16);
    id
}

/// Evaluates snapshots against the rule catalog.
#[derive(Debug, Clone)]
pub struct Detector {
    catalog: Arc<RuleCatalog>,
    depth: AnalysisDepth,
}

/// Rule fields shared by threshold and pattern rules.
struct RuleOutline<'a> {
    id: &'a str,
    category: Category,
    weight: Severity,
    confidence: f64,
    component: &'a str,
    pipeline: PipelineType,
    title: &'a str,
    impact: &'a str,
    hint: &'a str,
}

impl<'a> From<&'a ThresholdRule> for RuleOutline<'a> {
    fn from(rule: &'a ThresholdRule) -> Self {
        Self {
            id: rule.id,
            category: rule.category,
            weight: rule.weight,
            confidence: rule.confidence,
            component: rule.component,
            pipeline: rule.pipeline,
            title: rule.title,
            impact: rule.impact,
            hint: rule.hint,
        }
    }
}

impl<'a> From<&'a PatternRule> for RuleOutline<'a> {
    fn from(rule: &'a PatternRule) -> Self {
        Self {
            id: rule.id,
            category: rule.category,
            weight: rule.weight,
            confidence: rule.confidence,
            component: rule.component,
            pipeline: rule.pipeline,
            title: rule.title,
            impact: rule.impact,
            hint: rule.hint,
        }
    }
}

impl RuleOutline<'_> {
    fn issue(
        &self,
        extremity: Severity,
        description: String,
        detected_at: DateTime<Utc>,
        evidence: BTreeMap<String, String>,
    ) -> Issue {
        Issue {
            id: issue_id(self.category, self.component, self.pipeline, self.id),
            rule_id: self.id.to_string(),
            title: self.title.to_string(),
            category: self.category,
            severity: severity_for(self.category, self.weight, extremity),
            confidence: self.confidence,
            affected_component: self.component.to_string(),
            pipeline_type: self.pipeline,
            description,
            impact: self.impact.to_string(),
            recommendation_hint: self.hint.to_string(),
            detected_at,
            evidence,
        }
    }
}

impl Detector {
    pub fn new(catalog: Arc<RuleCatalog>, depth: AnalysisDepth) -> Self {
        Self { catalog, depth }
    }

    /// Runs every applicable rule and returns the issues in catalog order.
    ///
    /// The output depends only on `snapshot`, `history` and the catalog, so
    /// repeated calls with the same inputs yield identical issues.
    pub fn detect(&self, snapshot: &MetricsSnapshot, history: &HistoryWindow) -> Vec<Issue> {
        let pipeline = snapshot.pipeline_type();
        let mut issues = Vec::new();

        for rule in self
            .catalog
            .threshold_rules
            .iter()
            .filter(|r| r.pipeline == pipeline)
        {
            if let Some(issue) = apply_threshold(rule, snapshot) {
                issues.push(issue);
            }
        }

        for rule in self
            .catalog
            .pattern_rules
            .iter()
            .filter(|r| r.pipeline == pipeline && r.min_depth <= self.depth)
        {
            if let Some(issue) = self.apply_pattern(rule, snapshot, history) {
                issues.push(issue);
            }
        }

        debug!(
            "{} rules fired for {} snapshot from {}",
            issues.len(),
            pipeline,
            snapshot.source_id()
        );
        issues
    }

    fn apply_pattern(
        &self,
        rule: &PatternRule,
        snapshot: &MetricsSnapshot,
        history: &HistoryWindow,
    ) -> Option<Issue> {
        let finding = patterns::evaluate(rule.kind, &self.catalog.params, snapshot, history)?;
        let extremity = band_tier(rule.bands, false, finding.measure);
        let description = rule
            .description
            .replace("{value}", &rule.unit.format(finding.measure));

        Some(RuleOutline::from(rule).issue(
            extremity,
            description,
            snapshot.captured_at(),
            finding.evidence,
        ))
    }
}

fn apply_threshold(rule: &ThresholdRule, snapshot: &MetricsSnapshot) -> Option<Issue> {
    let value = snapshot.metric(rule.metric)?;

    let Some(firing) = rule.evaluate(value) else {
        let mismatched = matches!(
            (&rule.threshold, value),
            (Threshold::Number(_), MetricValue::Category(_))
                | (Threshold::Category(_), MetricValue::Number(_))
        );
        if mismatched {
            warn!(
                "Skipping rule {}: metric '{}' has an unexpected type ({value:?})",
                rule.id, rule.metric
            );
        }
        return None;
    };

    let shown = match value {
        MetricValue::Number(raw) => rule.unit.format(*raw),
        MetricValue::Category(label) => label.clone(),
    };
    let threshold = rule.threshold_display();
    debug!(
        "Rule {} fired: {} = {shown} {} {threshold}",
        rule.id,
        rule.metric,
        rule.comparison.symbol()
    );

    let mut evidence = BTreeMap::new();
    evidence.insert(rule.metric.to_string(), shown.clone());
    evidence.insert("threshold".to_string(), threshold.clone());
    for name in rule.context {
        if let Some(raw) = snapshot.number(name) {
            evidence.insert((*name).to_string(), rule.unit.format(raw));
        }
    }

    let description = rule
        .description
        .replace("{value}", &shown)
        .replace("{threshold}", &threshold);

    Some(RuleOutline::from(rule).issue(
        rule.extremity(firing),
        description,
        snapshot.captured_at(),
        evidence,
    ))
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::config::Config;
    use chrono::{Duration, TimeZone};

    fn detector(depth: AnalysisDepth) -> Detector {
        Detector::new(Arc::new(RuleCatalog::builtin().unwrap()), depth)
    }

    fn captured() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn devops() -> MetricsSnapshot {
        MetricsSnapshot::empty(PipelineType::Devops, "jenkins", captured())
    }

    fn mlops() -> MetricsSnapshot {
        MetricsSnapshot::empty(PipelineType::Mlops, "mlflow", captured())
    }

    fn only(issues: &[Issue]) -> &Issue {
        assert_eq!(issues.len(), 1, "Expected exactly one issue, got {issues:?}");
        &issues[0]
    }

    mod issue_id {
        use super::*;

        #[test]
        fn is_sixteen_hex_digits() {
            let id = issue_id(
                Category::Reliability,
                "Build Process",
                PipelineType::Devops,
                "build_failure_rate",
            );
            assert_eq!(id.len(), 16);
            assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        }

        #[test]
        fn differs_per_rule() {
            let a = issue_id(
                Category::Performance,
                "Build Infrastructure",
                PipelineType::Devops,
                "build_cpu_pressure",
            );
            let b = issue_id(
                Category::Performance,
                "Build Infrastructure",
                PipelineType::Devops,
                "build_memory_pressure",
            );
            assert_ne!(a, b);
        }
    }

    mod threshold_rules {
        use super::*;

        #[test]
        fn deployment_failure_rate_at_forty_percent_is_critical() {
            let snapshot = devops().with_number("deployment_failure_rate", 0.40);
            let issues = detector(AnalysisDepth::Basic).detect(&snapshot, &HistoryWindow::default());

            let issue = only(&issues);
            assert_eq!(issue.category, Category::Reliability);
            assert_eq!(issue.severity, Severity::Critical);
            assert_eq!(issue.confidence, 0.92);
            assert_eq!(issue.evidence["deployment_failure_rate"], "40.0%");
            assert!(issue.evidence.values().any(|v| v.contains("40.0%")));
        }

        #[test]
        fn build_cpu_peak_above_eighty_percent_is_high() {
            let snapshot = devops()
                .with_number("build_cpu_peak", 93.8)
                .with_number("build_cpu_avg", 68.7);
            let issues = detector(AnalysisDepth::Basic).detect(&snapshot, &HistoryWindow::default());

            let issue = only(&issues);
            assert_eq!(issue.category, Category::Performance);
            assert_eq!(issue.severity, Severity::High);
            assert_eq!(issue.confidence, 0.88);
            assert_eq!(issue.evidence["build_cpu_peak"], "93.8%");
            assert_eq!(issue.evidence["build_cpu_avg"], "68.7%");
            assert_eq!(issue.evidence["threshold"], "80.0%");
        }

        #[test]
        fn healthy_snapshot_yields_nothing() {
            let snapshot = devops()
                .with_number("build_failure_rate", 0.02)
                .with_number("deployment_failure_rate", 0.05)
                .with_number("build_cpu_peak", 45.0)
                .with_category("security_scan_status", "passed");
            let issues = detector(AnalysisDepth::Comprehensive)
                .detect(&snapshot, &HistoryWindow::default());
            assert!(issues.is_empty(), "Unexpected issues: {issues:?}");
        }

        #[test]
        fn value_at_threshold_does_not_fire() {
            let snapshot = devops().with_number("deployment_failure_rate", 0.10);
            let issues = detector(AnalysisDepth::Basic).detect(&snapshot, &HistoryWindow::default());
            assert!(issues.is_empty());
        }

        #[test]
        fn every_threshold_rule_fires_once_past_its_threshold() {
            let catalog = RuleCatalog::builtin().unwrap();
            let detector = Detector::new(Arc::new(catalog.clone()), AnalysisDepth::Basic);

            for rule in &catalog.threshold_rules {
                let base = match rule.pipeline {
                    PipelineType::Devops => devops(),
                    PipelineType::Mlops => mlops(),
                };
                let snapshot = match &rule.threshold {
                    Threshold::Number(limit) => {
                        let past = if rule.comparison.is_descending() {
                            limit * 0.5
                        } else {
                            limit * 1.5 + 1.0
                        };
                        base.with_number(rule.metric, past / rule.scale)
                    }
                    Threshold::Category(label) => base.with_category(rule.metric, label),
                };

                let issues = detector.detect(&snapshot, &HistoryWindow::default());
                let from_rule: Vec<&Issue> =
                    issues.iter().filter(|i| i.rule_id == rule.id).collect();
                assert_eq!(from_rule.len(), 1, "Rule {} should fire exactly once", rule.id);
                assert_eq!(
                    from_rule[0].confidence, rule.confidence,
                    "Rule {} must report its base confidence",
                    rule.id
                );
            }
        }

        #[test]
        fn severity_steps_up_one_tier_per_band() {
            let detector = detector(AnalysisDepth::Basic);
            let severity_at = |rate: f64| {
                let snapshot = devops().with_number("deployment_failure_rate", rate);
                only(&detector.detect(&snapshot, &HistoryWindow::default())).severity
            };

            assert_eq!(severity_at(0.15), Severity::Medium);
            assert_eq!(severity_at(0.30), Severity::High);
            assert_eq!(severity_at(0.45), Severity::Critical);
        }

        #[test]
        fn rules_for_other_pipeline_are_skipped() {
            let snapshot = mlops().with_number("deployment_failure_rate", 0.9);
            let issues = detector(AnalysisDepth::Basic).detect(&snapshot, &HistoryWindow::default());
            assert!(issues.is_empty());
        }

        #[test]
        fn mismatched_metric_type_is_skipped() {
            let snapshot = devops().with_category("deployment_failure_rate", "high");
            let issues = detector(AnalysisDepth::Basic).detect(&snapshot, &HistoryWindow::default());
            assert!(issues.is_empty());
        }

        #[test]
        fn failed_security_scan_fires_categorical_rule() {
            let snapshot = devops().with_category("security_scan_status", "failed");
            let issues = detector(AnalysisDepth::Basic).detect(&snapshot, &HistoryWindow::default());

            let issue = only(&issues);
            assert_eq!(issue.category, Category::Security);
            assert_eq!(issue.severity, Severity::High);
            assert_eq!(issue.evidence["security_scan_status"], "failed");
        }

        #[test]
        fn lower_is_worse_rules_fire_below_threshold() {
            let snapshot = mlops().with_number("model_f1_score", 0.55);
            let issues = detector(AnalysisDepth::Basic).detect(&snapshot, &HistoryWindow::default());

            let issue = only(&issues);
            assert_eq!(issue.severity, Severity::Medium, "Weight caps at medium");
            assert!(issue.description.contains("0.55"));
            assert!(issue.description.contains("0.70"));
        }

        #[test]
        fn override_changes_what_fires() {
            let mut config = Config::default();
            config.rule_overrides.insert("inference_latency_p95".into(), 250.0);
            let detector = Detector::new(
                Arc::new(RuleCatalog::from_config(&config).unwrap()),
                AnalysisDepth::Basic,
            );

            let snapshot = mlops().with_number("inference_latency_p95", 180.0);
            assert!(detector.detect(&snapshot, &HistoryWindow::default()).is_empty());
        }
    }

    mod determinism {
        use super::*;

        #[test]
        fn repeated_detection_is_identical() {
            let snapshot = devops()
                .with_number("build_failure_rate", 0.35)
                .with_number("deployment_failure_rate", 0.2)
                .with_number("failed_pods", 2.0)
                .with_number("build_duration_avg", 1300.0);
            let history = HistoryWindow::from_snapshots(vec![
                devops().with_number("build_duration_avg", 400.0),
            ]);
            let detector = detector(AnalysisDepth::Comprehensive);

            let first = detector.detect(&snapshot, &history);
            let second = detector.detect(&snapshot, &history);
            assert!(!first.is_empty());
            assert_eq!(first, second);
        }

        #[test]
        fn detected_at_follows_snapshot_time() {
            let snapshot = devops().with_number("failed_pods", 1.0);
            let issues = detector(AnalysisDepth::Basic).detect(&snapshot, &HistoryWindow::default());
            assert_eq!(only(&issues).detected_at, captured());
        }
    }

    mod pattern_rules {
        use super::*;

        fn duration_history() -> HistoryWindow {
            HistoryWindow::from_snapshots((1..=3).map(|h| {
                MetricsSnapshot::empty(
                    PipelineType::Devops,
                    "jenkins",
                    captured() - Duration::hours(h),
                )
                .with_number("build_duration_avg", 200.0)
            }))
        }

        #[test]
        fn basic_depth_disables_pattern_rules() {
            let snapshot = devops().with_number("build_duration_avg", 500.0);
            let issues = detector(AnalysisDepth::Basic).detect(&snapshot, &duration_history());
            assert!(issues.is_empty());
        }

        #[test]
        fn detailed_depth_reports_duration_regression() {
            let snapshot = devops().with_number("build_duration_avg", 500.0);
            let issues = detector(AnalysisDepth::Detailed).detect(&snapshot, &duration_history());

            let issue = only(&issues);
            assert_eq!(issue.rule_id, "build_duration_regression");
            assert_eq!(issue.severity, Severity::Medium);
            assert_eq!(issue.evidence["ratio"], "2.50x");
        }

        #[test]
        fn drift_trend_needs_comprehensive_depth() {
            let history = HistoryWindow::from_snapshots(
                [0.01, 0.02, 0.04, 0.06].iter().enumerate().map(|(i, v)| {
                    MetricsSnapshot::empty(
                        PipelineType::Mlops,
                        "mlflow",
                        captured() - Duration::hours(4 - i as i64),
                    )
                    .with_number("data_drift_score", *v)
                }),
            );
            let snapshot = mlops().with_number("data_drift_score", 0.08);

            assert!(detector(AnalysisDepth::Detailed)
                .detect(&snapshot, &history)
                .is_empty());
            let issues = detector(AnalysisDepth::Comprehensive).detect(&snapshot, &history);
            assert_eq!(only(&issues).rule_id, "data_drift_trend");
        }
    }
}
