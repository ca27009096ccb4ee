use std::fmt::Write;

use comfy_table::Cell;

use crate::engine::report_order;
use crate::insights::{
    AnalysisMode, AnalysisReport, DataStatus, Issue, PipelineAnalysis, Severity,
};

use super::styling::{bright, bright_green, bright_red, bright_yellow, cyan, dim, severity};
use super::tables::{
    confidence_cell, create_table, cyan_header, effort_cell, priority_cell, severity_cell,
};

const TOP_RECOMMENDATIONS: usize = 5;

/// Prints a human-readable report to stdout.
///
/// Sections, in order:
/// - Executive Summary: counts by severity, data completeness, notes
/// - Issues per pipeline, most severe first
/// - Cross-Pipeline Issues
/// - Priority Recommendations: hints of the five most urgent issues
/// - Optimizations and Roadmap
pub fn print_summary(report: &AnalysisReport) {
    println!("{}", render_summary(report));
}

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{} {}", bright(emoji), bright(title).underlined());
}

fn data_status_label(status: &DataStatus) -> console::StyledObject<String> {
    match status {
        DataStatus::Complete => bright_green("complete"),
        DataStatus::Partial { failures } => {
            bright_yellow(format!("partial ({} source(s) failed)", failures.len()))
        }
        DataStatus::Missing { .. } => bright_red("missing"),
    }
}

fn headline_evidence(issue: &Issue) -> String {
    issue
        .evidence
        .iter()
        .filter(|(key, _)| key.as_str() != "threshold")
        .take(2)
        .map(|(key, value)| format!("{key}: {value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_executive_summary(output: &mut String, report: &AnalysisReport) {
    add_section_header(output, "📊", "Executive Summary");

    let _ = writeln!(
        output,
        "  {} {}\n  {} {}",
        dim("Mode:"),
        cyan(report.mode.as_str()),
        dim("Generated:"),
        dim(report.generated_at.format("%Y-%m-%d %H:%M UTC"))
    );
    for pipeline in &report.pipelines {
        let _ = writeln!(
            output,
            "  {} {} {}",
            dim(format!("{} data:", pipeline.pipeline_type.label())),
            data_status_label(&pipeline.data_status),
            dim(format!("[{}]", pipeline.source_id))
        );
    }

    let total = report.total_issues() + report.cross_pipeline_issues.len();
    if total == 0 {
        let _ = writeln!(
            output,
            "\n  {}\n",
            bright_green("No issues detected. All analyzed pipelines are within thresholds.")
        );
    } else {
        let _ = writeln!(
            output,
            "  {} {}",
            dim("Issues found:"),
            bright_yellow(total)
        );
        for tier in Severity::DESCENDING {
            let count = report.count_by_severity(tier);
            if count > 0 {
                let _ = writeln!(output, "    {} {count}", severity(tier));
            }
        }
        let _ = writeln!(
            output,
            "  {} {}\n  {} {}\n",
            dim("Cross-pipeline issues:"),
            bright_yellow(report.cross_pipeline_issues.len()),
            dim("Optimizations:"),
            bright_yellow(report.optimizations.len())
        );
    }

    for note in &report.notes {
        let _ = writeln!(output, "  {} {}", bright_yellow("⚠"), note);
    }
    if !report.notes.is_empty() {
        output.push('\n');
    }
}

fn render_pipeline_issues(output: &mut String, pipeline: &PipelineAnalysis) {
    add_section_header(
        output,
        "🔎",
        &format!("{} Issues", pipeline.pipeline_type.label()),
    );

    if pipeline.issues.is_empty() {
        let _ = writeln!(output, "  {}\n", dim("No issues detected."));
        return;
    }

    let mut sorted: Vec<&Issue> = pipeline.issues.iter().collect();
    sorted.sort_by(|a, b| report_order(a, b));

    let mut table = create_table();
    table.set_header(cyan_header(&[
        "Severity",
        "Issue",
        "Component",
        "Category",
        "Confidence",
        "Evidence",
    ]));
    for issue in sorted {
        table.add_row(vec![
            severity_cell(issue.severity),
            Cell::new(format!("{}\n{}", issue.title, issue.description)),
            Cell::new(&issue.affected_component),
            Cell::new(issue.category.as_str()),
            confidence_cell(issue.confidence),
            Cell::new(headline_evidence(issue)),
        ]);
    }
    let _ = writeln!(output, "{table}\n");
}

fn render_cross_pipeline(output: &mut String, report: &AnalysisReport) {
    add_section_header(output, "🔗", "Cross-Pipeline Issues");

    if report.cross_pipeline_issues.is_empty() {
        let _ = writeln!(output, "  {}\n", dim("No cross-pipeline relationships found."));
        return;
    }

    let mut table = create_table();
    table.set_header(cyan_header(&[
        "Severity",
        "Issue",
        "Pipelines",
        "Confidence",
        "Linked Issues",
    ]));
    for cross in &report.cross_pipeline_issues {
        let issue = &cross.issue;
        table.add_row(vec![
            severity_cell(issue.severity),
            Cell::new(format!("{}\n{}", issue.title, issue.description)),
            Cell::new(
                cross
                    .pipeline_types
                    .iter()
                    .map(|p| p.label())
                    .collect::<Vec<_>>()
                    .join(" + "),
            ),
            confidence_cell(issue.confidence),
            Cell::new(cross.linked_issue_ids.len()),
        ]);
    }
    let _ = writeln!(output, "{table}\n");
}

fn render_priority_recommendations(output: &mut String, report: &AnalysisReport) {
    add_section_header(output, "🎯", "Priority Recommendations");

    let mut issues: Vec<&Issue> = report
        .all_issues()
        .chain(report.cross_pipeline_issues.iter().map(|c| &c.issue))
        .collect();
    if issues.is_empty() {
        let _ = writeln!(output, "  {}\n", dim("Nothing to act on."));
        return;
    }
    issues.sort_by(|a, b| report_order(a, b));

    for (rank, issue) in issues.iter().take(TOP_RECOMMENDATIONS).enumerate() {
        let _ = writeln!(
            output,
            "  {}. [{}] {}\n     {}\n     {} {}",
            rank + 1,
            severity(issue.severity),
            bright(&issue.title),
            issue.recommendation_hint,
            dim("Impact:"),
            dim(&issue.impact)
        );
    }
    output.push('\n');
}

fn render_optimizations(output: &mut String, report: &AnalysisReport) {
    if report.optimizations.is_empty() {
        return;
    }

    add_section_header(output, "🛠️", "Optimizations");

    let shown = match report.mode {
        AnalysisMode::Optimize => report.optimizations.len(),
        AnalysisMode::Analyze | AnalysisMode::Monitor => TOP_RECOMMENDATIONS,
    };

    let mut table = create_table();
    table.set_header(cyan_header(&["Priority", "Optimization", "Effort", "Expected Impact"]));
    for optimization in report.optimizations.iter().take(shown) {
        let deltas = optimization
            .expected_metric_deltas
            .iter()
            .map(|(metric, delta)| format!("{metric}: {delta:+.0}%"))
            .collect::<Vec<_>>()
            .join("\n");
        let mut text = format!("{}\n{}", optimization.title, optimization.description);
        if report.mode == AnalysisMode::Optimize {
            for (step, instruction) in optimization.steps.iter().enumerate() {
                let _ = write!(text, "\n  {}. {instruction}", step + 1);
            }
        }
        table.add_row(vec![
            priority_cell(optimization.priority),
            Cell::new(text),
            effort_cell(optimization.effort),
            Cell::new(deltas),
        ]);
    }
    let _ = writeln!(output, "{table}");

    if report.optimizations.len() > shown {
        let _ = writeln!(
            output,
            "  {}",
            dim(format!(
                "... and {} more (run `pipelens optimize` for the full list)",
                report.optimizations.len() - shown
            ))
        );
    }
    output.push('\n');
}

fn render_roadmap(output: &mut String, report: &AnalysisReport) {
    if report.roadmap.is_empty() {
        return;
    }

    add_section_header(output, "🗺️", "Roadmap");
    for phase in &report.roadmap.phases {
        let _ = writeln!(
            output,
            "  {}",
            if phase.quick_wins {
                bright_green(&phase.name)
            } else {
                bright_yellow(&phase.name)
            }
        );
        for id in &phase.optimization_ids {
            let title = report
                .optimizations
                .iter()
                .find(|o| &o.id == id)
                .map_or(id.as_str(), |o| o.title.as_str());
            let _ = writeln!(output, "    • {title} {}", dim(format!("({id})")));
        }
    }
}

fn render_summary(report: &AnalysisReport) -> String {
    let mut output = String::new();

    render_executive_summary(&mut output, report);
    for pipeline in &report.pipelines {
        render_pipeline_issues(&mut output, pipeline);
    }
    render_cross_pipeline(&mut output, report);
    render_priority_recommendations(&mut output, report);
    render_optimizations(&mut output, report);
    render_roadmap(&mut output, report);

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::{
        Category, CrossPipelineIssue, Effort, Optimization, OptimizationType, Phase,
        PipelineType, Roadmap,
    };
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn issue(id: &str, pipeline: PipelineType, component: &str, severity: Severity) -> Issue {
        Issue {
            id: id.to_string(),
            rule_id: id.to_string(),
            title: format!("Title {id}"),
            category: Category::Reliability,
            severity,
            confidence: 0.9,
            affected_component: component.to_string(),
            pipeline_type: pipeline,
            description: format!("Description {id}"),
            impact: format!("Impact {id}"),
            recommendation_hint: format!("Hint {id}"),
            detected_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            evidence: BTreeMap::from([("failure_rate".to_string(), "40.0%".to_string())]),
        }
    }

    fn optimization(id: &str, priority: u8) -> Optimization {
        Optimization {
            id: id.to_string(),
            title: format!("Optimize {id}"),
            description: String::new(),
            kind: OptimizationType::Reliability,
            priority,
            effort: Effort::Low,
            steps: vec![format!("First step of {id}")],
            expected_metric_deltas: BTreeMap::from([("failure_rate".to_string(), -50.0)]),
            addresses: Vec::new(),
        }
    }

    fn report(mode: AnalysisMode, issues: Vec<Issue>) -> AnalysisReport {
        AnalysisReport {
            generated_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            mode,
            pipelines: vec![PipelineAnalysis {
                pipeline_type: PipelineType::Devops,
                source_id: "ci".to_string(),
                data_status: DataStatus::Complete,
                issues,
            }],
            cross_pipeline_issues: Vec::new(),
            optimizations: Vec::new(),
            roadmap: Roadmap::default(),
            notes: Vec::new(),
        }
    }

    #[test]
    fn zero_issues_render_a_clean_executive_summary() {
        let output = render_summary(&report(AnalysisMode::Analyze, Vec::new()));

        assert!(output.contains("Executive Summary"));
        assert!(output.contains("No issues detected"));
        assert!(output.contains("Nothing to act on"));
        assert!(!output.contains("Roadmap"), "Empty roadmap is not rendered");
    }

    #[test]
    fn sections_follow_the_fixed_order() {
        let mut report = report(
            AnalysisMode::Analyze,
            vec![issue("a", PipelineType::Devops, "Build Process", Severity::High)],
        );
        report.optimizations = vec![optimization("build-stabilization", 2)];
        report.roadmap = Roadmap {
            phases: vec![Phase {
                number: 1,
                name: "Quick Wins".to_string(),
                quick_wins: true,
                optimization_ids: vec!["build-stabilization".to_string()],
            }],
        };

        let output = render_summary(&report);
        let position = |needle: &str| {
            output
                .find(needle)
                .unwrap_or_else(|| panic!("Missing section {needle}"))
        };

        assert!(position("Executive Summary") < position("DevOps Issues"));
        assert!(position("DevOps Issues") < position("Cross-Pipeline Issues"));
        assert!(position("Cross-Pipeline Issues") < position("Priority Recommendations"));
        assert!(position("Priority Recommendations") < position("Roadmap"));
        assert!(output.contains("Quick Wins"));
    }

    #[test]
    fn priority_recommendations_are_capped_at_five() {
        let issues = (0..7)
            .map(|i| {
                issue(
                    &format!("i{i}"),
                    PipelineType::Devops,
                    "Build Process",
                    Severity::Medium,
                )
            })
            .collect();

        let output = render_summary(&report(AnalysisMode::Analyze, issues));

        assert!(output.contains("5. ["));
        assert!(!output.contains("6. ["));
    }

    #[test]
    fn most_severe_issue_is_recommended_first() {
        let issues = vec![
            issue("minor", PipelineType::Devops, "Build Process", Severity::Low),
            issue("major", PipelineType::Devops, "Deployment Pipeline", Severity::Critical),
        ];

        let output = render_summary(&report(AnalysisMode::Analyze, issues));

        assert!(output.find("Hint major").unwrap() < output.find("Hint minor").unwrap());
    }

    #[test]
    fn optimize_mode_lists_steps() {
        let mut analyze = report(AnalysisMode::Analyze, Vec::new());
        analyze.optimizations = vec![optimization("build-caching", 3)];
        let mut optimize = analyze.clone();
        optimize.mode = AnalysisMode::Optimize;

        assert!(!render_summary(&analyze).contains("First step of build-caching"));
        assert!(render_summary(&optimize).contains("First step of build-caching"));
    }

    #[test]
    fn notes_and_cross_issues_are_shown() {
        let mut report = report(AnalysisMode::Monitor, Vec::new());
        report.notes = vec!["MLOps data is missing".to_string()];
        let cause = issue("b", PipelineType::Devops, "Build Process", Severity::High);
        let effect = issue("d", PipelineType::Devops, "Deployment Pipeline", Severity::High);
        report.cross_pipeline_issues = vec![CrossPipelineIssue::link(
            issue("x", PipelineType::Devops, "Deployment Pipeline", Severity::High),
            &[&cause, &effect],
        )
        .unwrap()];

        let output = render_summary(&report);

        assert!(output.contains("MLOps data is missing"));
        assert!(output.contains("Title x"));
    }
}
