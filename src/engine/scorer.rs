use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::insights::{Category, CrossPipelineIssue, Issue, PipelineType, Severity};

const IDENTITY: [Severity; 4] = [
    Severity::Low,
    Severity::Medium,
    Severity::High,
    Severity::Critical,
];

/// Severity lookup indexed by `[category][tier]`.
///
/// Every row is currently the identity mapping; a row can be edited to bias one
/// category without touching the detector.
pub const SEVERITY_TABLE: [[Severity; 4]; 5] = [IDENTITY; 5];

/// Final severity for a firing rule. Confidence plays no part.
pub fn severity_for(category: Category, weight: Severity, extremity: Severity) -> Severity {
    SEVERITY_TABLE[category.index()][weight.min(extremity).tier()]
}

/// Noisy-OR of two independent confidences, rounded to four decimals.
pub fn combine_confidence(first: f64, second: f64) -> f64 {
    let combined = 1.0 - (1.0 - first.clamp(0.0, 1.0)) * (1.0 - second.clamp(0.0, 1.0));
    round4(combined)
}

pub(crate) fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Grouping key used by deduplication.
pub type DedupKey = (Category, String, PipelineType, Vec<PipelineType>);

/// Anything that carries an issue and can be collapsed with its duplicates.
pub trait Scored: Clone {
    fn issue(&self) -> &Issue;

    fn dedup_key(&self) -> DedupKey {
        let issue = self.issue();
        (
            issue.category,
            issue.affected_component.clone(),
            issue.pipeline_type,
            Vec::new(),
        )
    }
}

impl Scored for Issue {
    fn issue(&self) -> &Issue {
        self
    }
}

impl Scored for CrossPipelineIssue {
    fn issue(&self) -> &Issue {
        &self.issue
    }

    fn dedup_key(&self) -> DedupKey {
        let mut pipelines = self.pipeline_types.clone();
        pipelines.sort();
        (
            self.issue.category,
            self.issue.affected_component.clone(),
            self.issue.pipeline_type,
            pipelines,
        )
    }
}

/// Preference inside a duplicate group: `Less` means `a` is kept over `b`.
fn preference(a: &Issue, b: &Issue) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| b.severity.cmp(&a.severity))
        .then_with(|| a.detected_at.cmp(&b.detected_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Ordering consumed by the report layer.
pub fn report_order(a: &Issue, b: &Issue) -> Ordering {
    b.severity
        .cmp(&a.severity)
        .then_with(|| b.confidence.total_cmp(&a.confidence))
        .then_with(|| a.affected_component.cmp(&b.affected_component))
        .then_with(|| a.id.cmp(&b.id))
}

/// Collapses issues sharing a group key to the preferred instance and returns
/// the survivors in report order.
pub fn dedupe<T: Scored>(items: &[T]) -> Vec<T> {
    let mut groups: BTreeMap<DedupKey, &T> = BTreeMap::new();

    for item in items {
        groups
            .entry(item.dedup_key())
            .and_modify(|kept| {
                if preference(item.issue(), kept.issue()) == Ordering::Less {
                    *kept = item;
                }
            })
            .or_insert(item);
    }

    let mut survivors: Vec<T> = groups.into_values().cloned().collect();
    survivors.sort_by(|a, b| report_order(a.issue(), b.issue()));
    survivors
}
