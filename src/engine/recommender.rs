use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::error::{PipelensError, Result};
use crate::insights::{Issue, Optimization, Severity};

use super::blueprints::{Blueprint, BLUEPRINTS};
use super::components;

/// Fixed map from issue severity to optimization priority (1 is most urgent).
pub fn severity_to_priority(severity: Severity) -> u8 {
    match severity {
        Severity::Critical => 1,
        Severity::High => 2,
        Severity::Medium => 3,
        Severity::Low => 4,
    }
}

struct Matched<'a> {
    blueprint: &'a Blueprint,
    severity: Severity,
    addresses: BTreeSet<String>,
}

/// Maps surviving issues to optimizations, one per matched blueprint.
///
/// Issues without a matching blueprint produce nothing.
///
/// # Errors
///
/// Returns `PipelensError::Invariant` for an issue naming a component that has
/// no profile.
pub fn recommend<'a>(issues: impl IntoIterator<Item = &'a Issue>) -> Result<Vec<Optimization>> {
    let mut matched: BTreeMap<&str, Matched<'_>> = BTreeMap::new();

    for issue in issues {
        let class = components::class_of(&issue.affected_component).ok_or_else(|| {
            PipelensError::Invariant(format!(
                "issue {} names unknown component '{}'",
                issue.id, issue.affected_component
            ))
        })?;

        for blueprint in BLUEPRINTS.iter().filter(|b| b.matches(issue.category, class)) {
            let entry = matched.entry(blueprint.id).or_insert_with(|| Matched {
                blueprint,
                severity: issue.severity,
                addresses: BTreeSet::new(),
            });
            entry.severity = entry.severity.max(issue.severity);
            entry.addresses.insert(issue.id.clone());
        }
    }

    let mut optimizations: Vec<Optimization> = matched.into_values().map(build).collect();
    optimizations.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| a.effort.cmp(&b.effort))
            .then_with(|| a.id.cmp(&b.id))
    });

    debug!("Recommended {} optimizations", optimizations.len());
    Ok(optimizations)
}

fn build(matched: Matched<'_>) -> Optimization {
    let blueprint = matched.blueprint;
    Optimization {
        id: blueprint.id.to_string(),
        title: blueprint.title.to_string(),
        description: blueprint.description.to_string(),
        kind: blueprint.kind,
        priority: severity_to_priority(matched.severity),
        effort: blueprint.effort,
        steps: blueprint.steps.iter().map(ToString::to_string).collect(),
        expected_metric_deltas: blueprint
            .deltas
            .iter()
            .map(|(metric, delta)| ((*metric).to_string(), *delta))
            .collect(),
        addresses: matched.addresses.into_iter().collect(),
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::insights::{Category, Effort, PipelineType};
    use chrono::{TimeZone, Utc};

    fn issue(id: &str, component: &str, category: Category, severity: Severity) -> Issue {
        Issue {
            id: id.to_string(),
            rule_id: id.to_string(),
            title: id.to_string(),
            category,
            severity,
            confidence: 0.9,
            affected_component: component.to_string(),
            pipeline_type: PipelineType::Devops,
            description: String::new(),
            impact: String::new(),
            recommendation_hint: String::new(),
            detected_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            evidence: BTreeMap::new(),
        }
    }

    mod severity_to_priority {
        use super::*;

        #[test]
        fn is_monotonic_in_severity() {
            let priorities: Vec<u8> = Severity::DESCENDING
                .iter()
                .map(|s| severity_to_priority(*s))
                .collect();
            assert_eq!(priorities, vec![1, 2, 3, 4]);
        }
    }

    mod recommend {
        use super::*;

        #[test]
        fn no_issues_no_optimizations() {
            assert!(recommend(&[]).unwrap().is_empty());
        }

        #[test]
        fn slow_build_maps_to_caching() {
            let issues = vec![issue(
                "slow",
                "CI/CD Pipeline",
                Category::Performance,
                Severity::Medium,
            )];

            let optimizations = recommend(&issues).unwrap();
            assert_eq!(optimizations.len(), 1);
            let caching = &optimizations[0];
            assert_eq!(caching.id, "build-caching");
            assert_eq!(caching.priority, 3);
            assert_eq!(caching.effort, Effort::Medium);
            assert_eq!(caching.expected_metric_deltas["build_duration_avg"], -40.0);
            assert_eq!(caching.addresses, vec!["slow".to_string()]);
        }

        #[test]
        fn issues_sharing_a_blueprint_collapse() {
            let issues = vec![
                issue("pods", "Kubernetes Cluster", Category::Reliability, Severity::Critical),
                issue("pvc", "Kubernetes Storage", Category::Reliability, Severity::High),
            ];

            let optimizations = recommend(&issues).unwrap();
            assert_eq!(optimizations.len(), 1);
            assert_eq!(optimizations[0].id, "kubernetes-best-practices");
            assert_eq!(optimizations[0].addresses.len(), 2);
            assert_eq!(
                optimizations[0].priority, 1,
                "Priority follows the most severe addressed issue"
            );
        }

        #[test]
        fn critical_sources_never_rank_below_medium_sources() {
            let issues = vec![
                issue("scan", "Dependencies/Code", Category::Security, Severity::Critical),
                issue("slow", "CI/CD Pipeline", Category::Performance, Severity::Medium),
            ];

            let optimizations = recommend(&issues).unwrap();
            let priority = |id: &str| {
                optimizations
                    .iter()
                    .find(|o| o.id == id)
                    .map(|o| o.priority)
                    .unwrap()
            };
            assert!(priority("dependency-patching") < priority("build-caching"));
            assert_eq!(optimizations[0].id, "dependency-patching");
        }

        #[test]
        fn unmatched_category_produces_nothing() {
            let issues = vec![issue(
                "odd",
                "Service Mesh",
                Category::Cost,
                Severity::High,
            )];
            assert!(recommend(&issues).unwrap().is_empty());
        }

        #[test]
        fn unknown_component_is_an_invariant_violation() {
            let issues = vec![issue(
                "x",
                "Mainframe",
                Category::Reliability,
                Severity::High,
            )];
            assert!(matches!(
                recommend(&issues),
                Err(PipelensError::Invariant(_))
            ));
        }
    }
}
