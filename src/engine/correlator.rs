use std::collections::{BTreeMap, BTreeSet};

use chrono::Duration;
use log::debug;

use crate::error::Result;
use crate::insights::{Category, CrossPipelineIssue, Issue, PipelineType, Severity};

use super::components::{self, Stage, PLATFORM_WIDE};
use super::detector::issue_id;
use super::scorer::combine_confidence;

/// A declared causal relationship between two pipeline stages.
#[derive(Debug, Clone, Copy)]
pub struct StageEdge {
    pub id: &'static str,
    pub from: Stage,
    pub to: Stage,
    /// Upper bound for the severity of the correlated issue.
    pub weight: Severity,
    pub component: &'static str,
    pub title: &'static str,
    pub impact: &'static str,
    pub hint: &'static str,
}

pub const STAGE_GRAPH: &[StageEdge] = &[
    StageEdge {
        id: "cascade.build_deploy",
        from: Stage::Build,
        to: Stage::Deploy,
        weight: Severity::Critical,
        component: "Build → Deploy",
        title: "Cascading Failures Detected",
        impact: "Build failures block deployments, creating a bottleneck in the release process",
        hint: "Fix build issues first: address test failures, resolve dependency conflicts, improve build stability",
    },
    StageEdge {
        id: "cascade.data_model",
        from: Stage::DataQuality,
        to: Stage::ModelPerformance,
        weight: Severity::High,
        component: "Data Quality → Model Performance",
        title: "Data Quality Degrading Model Performance",
        impact: "Poor input data is the likely cause of the model quality regression",
        hint: "Fix the input data problems before retraining or tuning the model",
    },
    StageEdge {
        id: "cascade.infra_build",
        from: Stage::InfraResourcePressure,
        to: Stage::Build,
        weight: Severity::High,
        component: "Infrastructure → Build",
        title: "Resource Constraints Affecting Builds",
        impact: "Resource pressure is creating a bottleneck in the build pipeline",
        hint: "Scale infrastructure, optimize resource allocation, implement resource quotas",
    },
    StageEdge {
        id: "cascade.infra_training",
        from: Stage::InfraResourcePressure,
        to: Stage::Training,
        weight: Severity::High,
        component: "Infrastructure → Training",
        title: "Resource Constraints Affecting Training",
        impact: "Resource pressure is spilling over from shared infrastructure into model training",
        hint: "Isolate training capacity from CI workloads, investigate resource leaks",
    },
];

const SYSTEMIC_ID: &str = "systemic.reliability";
const SYSTEMIC_CONFIDENCE: f64 = 0.75;
const SYSTEMIC_CAP: Severity = Severity::High;

/// Finds causal and compounding relationships across per-pipeline issues.
#[derive(Debug, Clone)]
pub struct Correlator {
    window: Duration,
    systemic_threshold: usize,
}

impl Correlator {
    pub fn new(window: Duration, systemic_threshold: usize) -> Self {
        Self {
            window,
            systemic_threshold,
        }
    }

    /// Links issues across stages and pipelines. Inputs are only read.
    ///
    /// # Errors
    ///
    /// Returns `PipelensError::Invariant` if a correlated issue would link fewer
    /// than two pipelines or components.
    pub fn correlate(&self, devops: &[Issue], mlops: &[Issue]) -> Result<Vec<CrossPipelineIssue>> {
        let all: Vec<&Issue> = devops.iter().chain(mlops).collect();
        let mut correlated = Vec::new();

        for edge in STAGE_GRAPH {
            if let Some(cross) = self.follow_edge(edge, &all)? {
                correlated.push(cross);
            }
        }

        if let Some(cross) = self.systemic(&all)? {
            correlated.push(cross);
        }

        debug!("Correlated {} cross-pipeline issues", correlated.len());
        Ok(correlated)
    }

    fn within_window(&self, a: &Issue, b: &Issue) -> bool {
        (a.detected_at - b.detected_at).num_seconds().abs() <= self.window.num_seconds()
    }

    fn follow_edge(&self, edge: &StageEdge, all: &[&Issue]) -> Result<Option<CrossPipelineIssue>> {
        let upstream = on_stage(all, edge.from);
        let downstream = on_stage(all, edge.to);

        let mut linked_up: BTreeMap<&str, &Issue> = BTreeMap::new();
        let mut linked_down: BTreeMap<&str, &Issue> = BTreeMap::new();
        for &up in &upstream {
            for &down in &downstream {
                if self.within_window(up, down) {
                    linked_up.insert(up.id.as_str(), up);
                    linked_down.insert(down.id.as_str(), down);
                }
            }
        }

        if linked_up.is_empty() || linked_down.is_empty() {
            if !upstream.is_empty() && !downstream.is_empty() {
                debug!(
                    "Edge {} skipped: {} upstream and {} downstream issue(s) are more than {}s apart",
                    edge.id,
                    upstream.len(),
                    downstream.len(),
                    self.window.num_seconds()
                );
            }
            return Ok(None);
        }

        let contributors: Vec<&Issue> = linked_up
            .values()
            .chain(linked_down.values())
            .copied()
            .collect();
        let Some(lead) = lead_contributor(&contributors) else {
            return Ok(None);
        };
        let confidence = combine_confidence(strongest(&linked_up), strongest(&linked_down));

        let description = format!(
            "{} upstream issue(s) ({}) are likely causing {} downstream issue(s) ({})",
            linked_up.len(),
            titles(&linked_up),
            linked_down.len(),
            titles(&linked_down),
        );

        let issue = Issue {
            id: issue_id(lead.category, edge.component, lead.pipeline_type, edge.id),
            rule_id: edge.id.to_string(),
            title: edge.title.to_string(),
            category: lead.category,
            severity: edge.weight.min(max_severity(&contributors)),
            confidence,
            affected_component: edge.component.to_string(),
            pipeline_type: lead.pipeline_type,
            description,
            impact: edge.impact.to_string(),
            recommendation_hint: edge.hint.to_string(),
            detected_at: latest(&contributors),
            evidence: evidence(&contributors),
        };

        CrossPipelineIssue::link(issue, &contributors).map(Some)
    }

    fn systemic(&self, all: &[&Issue]) -> Result<Option<CrossPipelineIssue>> {
        let reliability: Vec<&Issue> = all
            .iter()
            .copied()
            .filter(|i| i.category == Category::Reliability)
            .collect();

        if reliability.len() <= self.systemic_threshold {
            return Ok(None);
        }

        let sources: BTreeSet<(PipelineType, &str)> = reliability
            .iter()
            .map(|i| (i.pipeline_type, i.affected_component.as_str()))
            .collect();
        if sources.len() < 2 {
            debug!(
                "{} reliability issues all come from one component, not systemic",
                reliability.len()
            );
            return Ok(None);
        }

        let Some(lead) = lead_contributor(&reliability) else {
            return Ok(None);
        };
        let pipelines: BTreeSet<&str> = reliability
            .iter()
            .map(|i| i.pipeline_type.label())
            .collect();
        let issue = Issue {
            id: issue_id(Category::Reliability, PLATFORM_WIDE, lead.pipeline_type, SYSTEMIC_ID),
            rule_id: SYSTEMIC_ID.to_string(),
            title: "Systemic Reliability Issues".to_string(),
            category: Category::Reliability,
            severity: SYSTEMIC_CAP.min(max_severity(&reliability)),
            confidence: SYSTEMIC_CONFIDENCE,
            affected_component: PLATFORM_WIDE.to_string(),
            pipeline_type: lead.pipeline_type,
            description: format!(
                "Detected {} reliability issues across {}",
                reliability.len(),
                pipelines.into_iter().collect::<Vec<_>>().join(" and ")
            ),
            impact: "Multiple reliability issues indicate a systemic problem requiring \
                     platform-level attention"
                .to_string(),
            recommendation_hint: "Conduct root cause analysis for reliability issues and \
                                  review platform-level reliability practices"
                .to_string(),
            detected_at: latest(&reliability),
            evidence: evidence(&reliability),
        };

        CrossPipelineIssue::link(issue, &reliability).map(Some)
    }
}

fn on_stage<'a>(issues: &[&'a Issue], stage: Stage) -> Vec<&'a Issue> {
    issues
        .iter()
        .copied()
        .filter(|i| components::stage_of(&i.affected_component) == Some(stage))
        .collect()
}

/// Highest severity, then confidence, then component name.
fn lead_contributor<'a>(contributors: &[&'a Issue]) -> Option<&'a Issue> {
    contributors.iter().copied().min_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| b.confidence.total_cmp(&a.confidence))
            .then_with(|| a.affected_component.cmp(&b.affected_component))
            .then_with(|| a.id.cmp(&b.id))
    })
}

fn strongest(side: &BTreeMap<&str, &Issue>) -> f64 {
    side.values().map(|i| i.confidence).fold(0.0, f64::max)
}

fn max_severity(issues: &[&Issue]) -> Severity {
    issues
        .iter()
        .map(|i| i.severity)
        .max()
        .unwrap_or(Severity::Low)
}

fn latest(issues: &[&Issue]) -> chrono::DateTime<chrono::Utc> {
    issues
        .iter()
        .map(|i| i.detected_at)
        .max()
        .unwrap_or_default()
}

fn titles(side: &BTreeMap<&str, &Issue>) -> String {
    let titles: BTreeSet<&str> = side.values().map(|i| i.title.as_str()).collect();
    titles.into_iter().collect::<Vec<_>>().join(", ")
}

fn evidence(contributors: &[&Issue]) -> BTreeMap<String, String> {
    contributors
        .iter()
        .map(|i| {
            (
                i.id.clone(),
                format!("{} ({}, {})", i.title, i.pipeline_type, i.severity),
            )
        })
        .collect()
}
