use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, info};

use super::correlator::Correlator;
use super::detector::Detector;
use super::history::History;
use super::rules::RuleCatalog;
use super::{recommender, roadmap, scorer};
use crate::collectors::{Collected, SourceSet};
use crate::config::Config;
use crate::error::Result;
use crate::insights::{
    AnalysisMode, AnalysisReport, DataStatus, Issue, MetricsSnapshot, PipelineAnalysis,
    PipelineType, Severity,
};

/// Steps of one analysis pass, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassStage {
    Collecting,
    Detecting,
    Correlating,
    ScoringDedup,
    Recommending,
    Prioritizing,
}

impl PassStage {
    pub fn label(self) -> &'static str {
        match self {
            Self::Collecting => "Collecting metrics",
            Self::Detecting => "Detecting issues",
            Self::Correlating => "Correlating pipelines",
            Self::ScoringDedup => "Scoring and deduplicating",
            Self::Recommending => "Recommending optimizations",
            Self::Prioritizing => "Building roadmap",
        }
    }
}

/// A finished pass: the report plus the snapshots the caller should append
/// to history.
#[derive(Debug)]
pub struct PassOutcome {
    pub report: AnalysisReport,
    pub snapshots: Vec<Arc<MetricsSnapshot>>,
}

/// Collect, detect, correlate, dedupe, recommend and prioritize, once.
pub struct AnalysisPass {
    detector: Detector,
    correlator: Correlator,
    devops: Option<SourceSet>,
    mlops: Option<SourceSet>,
    lookback_days: u32,
    collection_timeout: Duration,
}

impl AnalysisPass {
    pub fn new(
        config: &Config,
        catalog: Arc<RuleCatalog>,
        devops: Option<SourceSet>,
        mlops: Option<SourceSet>,
    ) -> Self {
        Self {
            detector: Detector::new(catalog, config.pipeline.analysis_depth),
            correlator: Correlator::new(
                config.correlation_window(),
                config.monitoring.systemic_threshold,
            ),
            devops,
            mlops,
            lookback_days: config.pipeline.lookback_days,
            collection_timeout: config.collection_timeout(),
        }
    }

    pub fn pipelines(&self) -> Vec<PipelineType> {
        [self.devops.as_ref(), self.mlops.as_ref()]
            .into_iter()
            .flatten()
            .map(SourceSet::pipeline)
            .collect()
    }

    /// Runs one pass against `history`, reporting each stage to `on_stage`.
    ///
    /// Collection failures never fail the pass; they are recorded in the
    /// pipeline's data status and in the report notes. History is not touched:
    /// the caller appends the returned snapshots once the pass has succeeded.
    ///
    /// # Errors
    ///
    /// Returns `PipelensError::Invariant` when correlation or recommendation
    /// meets an internal inconsistency.
    pub async fn run(
        &self,
        mode: AnalysisMode,
        history: &History,
        mut on_stage: impl FnMut(PassStage),
    ) -> Result<PassOutcome> {
        on_stage(PassStage::Collecting);
        let (devops, mlops) = tokio::join!(
            collect(self.devops.as_ref(), self.lookback_days, self.collection_timeout),
            collect(self.mlops.as_ref(), self.lookback_days, self.collection_timeout),
        );

        on_stage(PassStage::Detecting);
        let mut pipelines = Vec::new();
        let mut snapshots = Vec::new();
        let mut notes = Vec::new();
        for collected in [devops, mlops].into_iter().flatten() {
            let Collected { snapshot, status } = collected;
            let pipeline = snapshot.pipeline_type();
            let window = history.window(pipeline);
            if window.is_empty() {
                debug!("No {} history yet, pattern rules need earlier samples", pipeline.label());
            } else {
                debug!("{} history holds {} samples", pipeline.label(), window.len());
            }
            let issues = self.detector.detect(&snapshot, &window);
            debug!("{} detection produced {} issues", pipeline.label(), issues.len());

            if let Some(note) = status_note(pipeline, &status) {
                info!("{note}");
                notes.push(note);
            }

            pipelines.push(PipelineAnalysis {
                pipeline_type: pipeline,
                source_id: snapshot.source_id().to_string(),
                data_status: status,
                issues,
            });
            if !snapshot.is_empty() {
                snapshots.push(Arc::new(snapshot));
            }
        }

        on_stage(PassStage::Correlating);
        let cross_pipeline_issues = self.correlator.correlate(
            issues_of(&pipelines, PipelineType::Devops),
            issues_of(&pipelines, PipelineType::Mlops),
        )?;

        on_stage(PassStage::ScoringDedup);
        for analysis in &mut pipelines {
            analysis.issues = scorer::dedupe(&analysis.issues);
        }
        let cross_pipeline_issues = scorer::dedupe(&cross_pipeline_issues);

        on_stage(PassStage::Recommending);
        let optimizations = recommender::recommend(
            pipelines
                .iter()
                .flat_map(|p| p.issues.iter())
                .chain(cross_pipeline_issues.iter().map(|c| &c.issue)),
        )?;

        on_stage(PassStage::Prioritizing);
        let roadmap = roadmap::build_roadmap(&optimizations);

        let report = AnalysisReport {
            generated_at: Utc::now(),
            mode,
            pipelines,
            cross_pipeline_issues,
            optimizations,
            roadmap,
            notes,
        };

        info!(
            "Pass complete: {} issues ({} critical, {} high), {} cross-pipeline, {} optimizations in {} phases",
            report.total_issues(),
            report.count_by_severity(Severity::Critical),
            report.count_by_severity(Severity::High),
            report.cross_pipeline_issues.len(),
            report.optimizations.len(),
            report.roadmap.phases.len()
        );

        Ok(PassOutcome { report, snapshots })
    }
}

async fn collect(
    sources: Option<&SourceSet>,
    lookback_days: u32,
    timeout: Duration,
) -> Option<Collected> {
    match sources {
        Some(sources) => Some(sources.collect(lookback_days, timeout).await),
        None => None,
    }
}

fn issues_of(pipelines: &[PipelineAnalysis], pipeline: PipelineType) -> &[Issue] {
    pipelines
        .iter()
        .find(|p| p.pipeline_type == pipeline)
        .map(|p| p.issues.as_slice())
        .unwrap_or_default()
}

fn status_note(pipeline: PipelineType, status: &DataStatus) -> Option<String> {
    match status {
        DataStatus::Complete => None,
        DataStatus::Partial { failures } => Some(format!(
            "{} data is incomplete ({} source(s) failed): {}",
            pipeline.label(),
            failures.len(),
            failures.join("; ")
        )),
        DataStatus::Missing { reason } => Some(format!(
            "{} data is missing, no issues could be detected: {reason}",
            pipeline.label()
        )),
    }
}
