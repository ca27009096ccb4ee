//! History-window evaluation for pattern rules.

use std::collections::BTreeMap;

use crate::insights::{MetricValue, MetricsSnapshot};

use super::history::HistoryWindow;
use super::rules::{PatternKind, PatternParams};

#[derive(Debug, Clone, PartialEq)]
pub struct PatternFinding {
    /// Magnitude used for banding, in the rule's unit.
    pub measure: f64,
    pub evidence: BTreeMap<String, String>,
}

pub fn evaluate(
    kind: PatternKind,
    params: &PatternParams,
    snapshot: &MetricsSnapshot,
    history: &HistoryWindow,
) -> Option<PatternFinding> {
    match kind {
        PatternKind::Flakiness { prefix } => flakiness(prefix, params, snapshot, history),
        PatternKind::Regression { metric } => regression(metric, params, snapshot, history),
        PatternKind::RisingTrend { metric } => rising_trend(metric, params, snapshot, history),
        PatternKind::Degradation { metric } => degradation(metric, params, snapshot, history),
    }
}

/// The last `count` samples ending with `snapshot`, oldest first.
fn window<'a>(
    snapshot: &'a MetricsSnapshot,
    history: &'a HistoryWindow,
    count: usize,
) -> Vec<&'a MetricsSnapshot> {
    let mut samples: Vec<&MetricsSnapshot> =
        history.recent(count.saturating_sub(1)).collect();
    samples.push(snapshot);
    samples
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Pass,
    Fail,
}

fn outcome(value: &MetricValue) -> Option<Outcome> {
    match value.as_category()?.to_ascii_lowercase().as_str() {
        "pass" | "passed" | "success" => Some(Outcome::Pass),
        "fail" | "failed" | "failure" | "error" => Some(Outcome::Fail),
        _ => None,
    }
}

fn flakiness(
    prefix: &str,
    params: &PatternParams,
    snapshot: &MetricsSnapshot,
    history: &HistoryWindow,
) -> Option<PatternFinding> {
    let samples = window(snapshot, history, params.flaky_window);

    let mut outcomes: BTreeMap<&str, Vec<Outcome>> = BTreeMap::new();
    for sample in &samples {
        for (name, value) in sample.metrics() {
            let Some(test_id) = name.strip_prefix(prefix) else {
                continue;
            };
            if let Some(result) = outcome(value) {
                outcomes.entry(test_id).or_default().push(result);
            }
        }
    }

    let mut evidence = BTreeMap::new();
    for (test_id, results) in &outcomes {
        let transitions = results.windows(2).filter(|w| w[0] != w[1]).count();
        if transitions > params.flaky_transitions {
            evidence.insert(
                format!("{prefix}{test_id}"),
                format!("{transitions} transitions in {} runs", results.len()),
            );
        }
    }

    if evidence.is_empty() {
        return None;
    }

    let flaky = evidence.len();
    evidence.insert("flaky_tests".to_string(), flaky.to_string());
    evidence.insert("samples".to_string(), samples.len().to_string());
    Some(PatternFinding {
        measure: flaky as f64,
        evidence,
    })
}

fn regression(
    metric: &str,
    params: &PatternParams,
    snapshot: &MetricsSnapshot,
    history: &HistoryWindow,
) -> Option<PatternFinding> {
    let current = snapshot.number(metric)?;
    let baseline: Vec<f64> = history
        .recent(params.regression_window)
        .filter_map(|s| s.number(metric))
        .collect();

    let mean = mean(&baseline)?;
    if mean <= 0.0 {
        return None;
    }

    let ratio = current / mean;
    if !(ratio.is_finite() && ratio > params.regression_ratio) {
        return None;
    }

    let evidence = BTreeMap::from([
        (metric.to_string(), format!("{current:.0}s")),
        ("baseline".to_string(), format!("{mean:.0}s")),
        ("baseline_samples".to_string(), baseline.len().to_string()),
        ("ratio".to_string(), format!("{ratio:.2}x")),
    ]);
    Some(PatternFinding {
        measure: ratio,
        evidence,
    })
}

fn rising_trend(
    metric: &str,
    params: &PatternParams,
    snapshot: &MetricsSnapshot,
    history: &HistoryWindow,
) -> Option<PatternFinding> {
    let series: Vec<f64> = window(snapshot, history, params.trend_window)
        .into_iter()
        .filter_map(|s| s.number(metric))
        .collect();

    if series.len() < params.trend_window {
        return None;
    }
    if !series.windows(2).all(|w| w[1] > w[0]) {
        return None;
    }

    let (first, last) = (*series.first()?, *series.last()?);
    let rise = last - first;
    if rise <= params.trend_min_rise {
        return None;
    }

    let trail = series
        .iter()
        .map(|v| format!("{v:.3}"))
        .collect::<Vec<_>>()
        .join(" -> ");
    let evidence = BTreeMap::from([
        (metric.to_string(), trail),
        ("rise".to_string(), format!("{rise:.3}")),
    ]);
    Some(PatternFinding {
        measure: rise,
        evidence,
    })
}

fn degradation(
    metric: &str,
    params: &PatternParams,
    snapshot: &MetricsSnapshot,
    history: &HistoryWindow,
) -> Option<PatternFinding> {
    let size = params.degradation_window;
    let series: Vec<f64> = window(snapshot, history, size * 2)
        .into_iter()
        .filter_map(|s| s.number(metric))
        .collect();

    if series.len() <= size {
        return None;
    }
    let (older, recent) = series.split_at(series.len() - size);

    let (older_mean, recent_mean) = (mean(older)?, mean(recent)?);
    let drop = older_mean - recent_mean;
    if drop <= params.degradation_min_drop {
        return None;
    }

    let evidence = BTreeMap::from([
        ("previous_mean".to_string(), format!("{:.2}%", older_mean * 100.0)),
        ("recent_mean".to_string(), format!("{:.2}%", recent_mean * 100.0)),
        ("drop".to_string(), format!("{:.1}%", drop * 100.0)),
    ]);
    Some(PatternFinding {
        measure: drop,
        evidence,
    })
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::insights::PipelineType;
    use chrono::{Duration, TimeZone, Utc};

    fn at(pipeline: PipelineType, step: i64) -> MetricsSnapshot {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        MetricsSnapshot::empty(pipeline, "test", start + Duration::hours(step))
    }

    /// Splits a series into (history, current).
    fn series(
        pipeline: PipelineType,
        metric: &str,
        values: &[f64],
    ) -> (HistoryWindow, MetricsSnapshot) {
        let mut snapshots: Vec<MetricsSnapshot> = values
            .iter()
            .enumerate()
            .map(|(i, v)| at(pipeline, i as i64).with_number(metric, *v))
            .collect();
        let current = snapshots.pop().unwrap();
        (HistoryWindow::from_snapshots(snapshots), current)
    }

    mod flakiness {
        use super::*;

        fn runs(results: &[&str]) -> (HistoryWindow, MetricsSnapshot) {
            let mut snapshots: Vec<MetricsSnapshot> = results
                .iter()
                .enumerate()
                .map(|(i, r)| {
                    at(PipelineType::Devops, i as i64)
                        .with_category("test.checkout_flow", r)
                        .with_category("test.login", "passed")
                })
                .collect();
            let current = snapshots.pop().unwrap();
            (HistoryWindow::from_snapshots(snapshots), current)
        }

        #[test]
        fn alternating_test_is_flaky() {
            let (history, current) = runs(&["passed", "failed", "passed", "failed"]);
            let finding = evaluate(
                PatternKind::Flakiness { prefix: "test." },
                &PatternParams::default(),
                &current,
                &history,
            )
            .expect("three transitions exceed the default of two");

            assert_eq!(finding.measure, 1.0);
            assert!(finding.evidence.contains_key("test.checkout_flow"));
            assert!(
                !finding.evidence.contains_key("test.login"),
                "Stable test must not be listed"
            );
        }

        #[test]
        fn single_failure_and_recovery_is_not_flaky() {
            let (history, current) = runs(&["passed", "failed", "passed"]);
            let finding = evaluate(
                PatternKind::Flakiness { prefix: "test." },
                &PatternParams::default(),
                &current,
                &history,
            );
            assert!(finding.is_none());
        }

        #[test]
        fn transitions_outside_window_are_ignored() {
            let mut results = vec!["passed", "failed", "passed", "failed"];
            results.extend(std::iter::repeat("passed").take(10));
            let (history, current) = runs(&results);

            let finding = evaluate(
                PatternKind::Flakiness { prefix: "test." },
                &PatternParams::default(),
                &current,
                &history,
            );
            assert!(finding.is_none());
        }
    }

    mod regression {
        use super::*;

        #[test]
        fn doubled_duration_regresses() {
            let (history, current) =
                series(PipelineType::Devops, "build_duration_avg", &[300.0, 300.0, 600.0]);
            let finding = evaluate(
                PatternKind::Regression {
                    metric: "build_duration_avg",
                },
                &PatternParams::default(),
                &current,
                &history,
            )
            .unwrap();

            assert_eq!(finding.measure, 2.0);
            assert_eq!(finding.evidence["ratio"], "2.00x");
        }

        #[test]
        fn needs_a_baseline() {
            let (history, current) = series(PipelineType::Devops, "build_duration_avg", &[900.0]);
            let finding = evaluate(
                PatternKind::Regression {
                    metric: "build_duration_avg",
                },
                &PatternParams::default(),
                &current,
                &history,
            );
            assert!(finding.is_none());
        }

        #[test]
        fn small_increase_is_ignored() {
            let (history, current) =
                series(PipelineType::Devops, "build_duration_avg", &[300.0, 400.0]);
            let finding = evaluate(
                PatternKind::Regression {
                    metric: "build_duration_avg",
                },
                &PatternParams::default(),
                &current,
                &history,
            );
            assert!(finding.is_none());
        }
    }

    mod rising_trend {
        use super::*;

        #[test]
        fn strictly_rising_series_fires() {
            let (history, current) = series(
                PipelineType::Mlops,
                "data_drift_score",
                &[0.02, 0.03, 0.05, 0.07, 0.09],
            );
            let finding = evaluate(
                PatternKind::RisingTrend {
                    metric: "data_drift_score",
                },
                &PatternParams::default(),
                &current,
                &history,
            )
            .unwrap();

            assert!((finding.measure - 0.07).abs() < 1e-9);
        }

        #[test]
        fn dip_breaks_the_trend() {
            let (history, current) = series(
                PipelineType::Mlops,
                "data_drift_score",
                &[0.02, 0.06, 0.05, 0.07, 0.09],
            );
            let finding = evaluate(
                PatternKind::RisingTrend {
                    metric: "data_drift_score",
                },
                &PatternParams::default(),
                &current,
                &history,
            );
            assert!(finding.is_none());
        }

        #[test]
        fn short_history_never_fires() {
            let (history, current) =
                series(PipelineType::Mlops, "data_drift_score", &[0.01, 0.2]);
            let finding = evaluate(
                PatternKind::RisingTrend {
                    metric: "data_drift_score",
                },
                &PatternParams::default(),
                &current,
                &history,
            );
            assert!(finding.is_none());
        }
    }

    mod degradation {
        use super::*;

        #[test]
        fn recent_window_below_older_window_fires() {
            let values = [0.92, 0.92, 0.92, 0.92, 0.92, 0.82, 0.82, 0.82, 0.82, 0.82];
            let (history, current) = series(PipelineType::Mlops, "model_accuracy", &values);
            let finding = evaluate(
                PatternKind::Degradation {
                    metric: "model_accuracy",
                },
                &PatternParams::default(),
                &current,
                &history,
            )
            .unwrap();

            assert!((finding.measure - 0.10).abs() < 1e-9);
            assert_eq!(finding.evidence["drop"], "10.0%");
        }

        #[test]
        fn stable_accuracy_does_not_fire() {
            let values = [0.9; 10];
            let (history, current) = series(PipelineType::Mlops, "model_accuracy", &values);
            let finding = evaluate(
                PatternKind::Degradation {
                    metric: "model_accuracy",
                },
                &PatternParams::default(),
                &current,
                &history,
            );
            assert!(finding.is_none());
        }

        #[test]
        fn needs_samples_older_than_the_recent_window() {
            let values = [0.9, 0.5, 0.5, 0.5, 0.5];
            let (history, current) = series(PipelineType::Mlops, "model_accuracy", &values);
            let finding = evaluate(
                PatternKind::Degradation {
                    metric: "model_accuracy",
                },
                &PatternParams::default(),
                &current,
                &history,
            );
            assert!(finding.is_none());
        }
    }
}
