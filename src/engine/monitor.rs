use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::watch;

use super::history::History;
use super::pass::{AnalysisPass, PassStage};
use crate::config::Config;
use crate::error::{PipelensError, Result};
use crate::insights::{AnalysisMode, AnalysisReport, MetricsSnapshot, PipelineType, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Collecting,
    Detecting,
    Correlating,
    ScoringDedup,
    Recommending,
    Prioritizing,
    Reporting,
    Sleeping,
    Stopped,
}

impl From<PassStage> for MonitorState {
    fn from(stage: PassStage) -> Self {
        match stage {
            PassStage::Collecting => Self::Collecting,
            PassStage::Detecting => Self::Detecting,
            PassStage::Correlating => Self::Correlating,
            PassStage::ScoringDedup => Self::ScoringDedup,
            PassStage::Recommending => Self::Recommending,
            PassStage::Prioritizing => Self::Prioritizing,
        }
    }
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MonitorSettings {
    pub interval: Duration,
    pub shutdown_grace: Duration,
    pub max_consecutive_failures: u32,
}

impl From<&Config> for MonitorSettings {
    fn from(config: &Config) -> Self {
        Self {
            interval: config.interval(),
            shutdown_grace: config.shutdown_grace(),
            max_consecutive_failures: config.monitoring.max_consecutive_failures,
        }
    }
}

#[derive(Debug)]
struct StateLog {
    state: MonitorState,
    #[cfg(test)]
    transitions: Vec<MonitorState>,
}

impl StateLog {
    fn transition(&mut self, next: MonitorState) {
        debug!("Monitor state {} -> {next}", self.state);
        self.state = next;
        #[cfg(test)]
        self.transitions.push(next);
    }
}

enum CycleEnd {
    Finished(Result<Vec<Arc<MetricsSnapshot>>>),
    Abandoned,
}

/// Long-running driver that repeats analysis passes every interval.
///
/// The monitor is the only writer of its history. Shutdown is honoured
/// between cycles; a cycle already running gets `shutdown_grace` to finish.
pub struct Monitor {
    pass: AnalysisPass,
    history: History,
    settings: MonitorSettings,
    log: StateLog,
    consecutive_failures: u32,
    cycles: u64,
}

impl Monitor {
    pub fn new(pass: AnalysisPass, history: History, settings: MonitorSettings) -> Self {
        Self {
            pass,
            history,
            settings,
            log: StateLog {
                state: MonitorState::Idle,
                #[cfg(test)]
                transitions: Vec::new(),
            },
            consecutive_failures: 0,
            cycles: 0,
        }
    }

    pub fn state(&self) -> MonitorState {
        self.log.state
    }

    /// Runs cycles until shutdown is requested, publishing each report.
    ///
    /// Returns the number of completed cycles.
    ///
    /// # Errors
    ///
    /// Returns `PipelensError::StateCorruption` once `max_consecutive_failures`
    /// cycles in a row have failed.
    pub async fn run<F>(&mut self, mut shutdown: watch::Receiver<bool>, mut publish: F) -> Result<u64>
    where
        F: FnMut(&AnalysisReport) -> Result<()>,
    {
        info!(
            "Monitoring {} every {}s",
            self.pass
                .pipelines()
                .iter()
                .map(|p| p.label())
                .collect::<Vec<_>>()
                .join(" + "),
            self.settings.interval.as_secs()
        );

        loop {
            if *shutdown.borrow() {
                self.log.transition(MonitorState::Stopped);
                return Ok(self.cycles);
            }

            let end = {
                let cycle = run_cycle(&self.pass, &self.history, &mut self.log, &mut publish);
                tokio::pin!(cycle);
                tokio::select! {
                    result = &mut cycle => CycleEnd::Finished(result),
                    () = shutdown_requested(&mut shutdown) => {
                        info!(
                            "Shutdown requested, waiting up to {}s for the current cycle",
                            self.settings.shutdown_grace.as_secs()
                        );
                        match tokio::time::timeout(self.settings.shutdown_grace, &mut cycle).await {
                            Ok(result) => CycleEnd::Finished(result),
                            Err(_) => CycleEnd::Abandoned,
                        }
                    }
                }
            };

            match end {
                CycleEnd::Finished(Ok(snapshots)) => {
                    for snapshot in snapshots {
                        self.history.append(snapshot);
                    }
                    debug!(
                        "History now holds {} DevOps and {} MLOps samples",
                        self.history.len(PipelineType::Devops),
                        self.history.len(PipelineType::Mlops)
                    );
                    self.consecutive_failures = 0;
                    self.cycles += 1;
                }
                CycleEnd::Finished(Err(e)) => {
                    self.consecutive_failures += 1;
                    error!(
                        "Monitor cycle failed ({}/{}): {e}",
                        self.consecutive_failures, self.settings.max_consecutive_failures
                    );
                    if self.consecutive_failures >= self.settings.max_consecutive_failures {
                        self.log.transition(MonitorState::Stopped);
                        return Err(PipelensError::StateCorruption(format!(
                            "{} consecutive cycles failed, last error: {e}",
                            self.consecutive_failures
                        )));
                    }
                }
                CycleEnd::Abandoned => {
                    warn!("Current cycle did not finish within the shutdown grace period");
                    self.log.transition(MonitorState::Stopped);
                    return Ok(self.cycles);
                }
            }

            self.log.transition(MonitorState::Sleeping);
            tokio::select! {
                () = tokio::time::sleep(self.settings.interval) => {}
                () = shutdown_requested(&mut shutdown) => {}
            }
        }
    }
}

async fn run_cycle<F>(
    pass: &AnalysisPass,
    history: &History,
    log: &mut StateLog,
    publish: &mut F,
) -> Result<Vec<Arc<MetricsSnapshot>>>
where
    F: FnMut(&AnalysisReport) -> Result<()>,
{
    let outcome = pass
        .run(AnalysisMode::Monitor, history, |stage| log.transition(stage.into()))
        .await?;

    log.transition(MonitorState::Reporting);
    alert(&outcome.report);
    publish(&outcome.report)?;

    Ok(outcome.snapshots)
}

/// Resolves once shutdown has been signalled. A dropped sender never resolves.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn alert(report: &AnalysisReport) {
    let urgent = report
        .all_issues()
        .chain(report.cross_pipeline_issues.iter().map(|c| &c.issue))
        .filter(|issue| issue.severity >= Severity::High);

    for issue in urgent {
        warn!(
            "[{}] {} ({}, {} pipeline)",
            issue.severity.as_str().to_uppercase(),
            issue.title,
            issue.affected_component,
            issue.pipeline_type.label()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::{CollectorRegistry, SourceSet};
    use crate::engine::rules::RuleCatalog;
    use tempfile::TempDir;

    fn settings(max_consecutive_failures: u32) -> MonitorSettings {
        MonitorSettings {
            interval: Duration::from_millis(5),
            shutdown_grace: Duration::from_millis(50),
            max_consecutive_failures,
        }
    }

    fn monitor(dir: &TempDir, settings: MonitorSettings) -> Monitor {
        std::fs::write(
            dir.path().join("devops.json"),
            r#"{
                "pipeline_type": "devops",
                "source_id": "ci",
                "captured_at": "2026-03-01T12:00:00Z",
                "metrics": { "deployment_failure_rate": 0.40 }
            }"#,
        )
        .unwrap();

        let config = Config::default();
        let sources = SourceSet::resolve(
            &CollectorRegistry::default(),
            PipelineType::Devops,
            &[dir.path().display().to_string()],
        )
        .unwrap();
        let pass = AnalysisPass::new(
            &config,
            Arc::new(RuleCatalog::from_config(&config).unwrap()),
            Some(sources),
            None,
        );
        Monitor::new(pass, History::new(3), settings)
    }

    #[tokio::test]
    async fn stops_between_cycles_when_shutdown_is_signalled() {
        let dir = TempDir::new().unwrap();
        let mut monitor = monitor(&dir, settings(3));
        let (tx, rx) = watch::channel(false);

        let mut published = 0;
        let cycles = monitor
            .run(rx, |report| {
                published += 1;
                assert_eq!(report.mode, AnalysisMode::Monitor);
                if published == 2 {
                    tx.send(true).ok();
                }
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(cycles, 2);
        assert_eq!(published, 2);
        assert_eq!(monitor.state(), MonitorState::Stopped);
        assert_eq!(monitor.history.len(PipelineType::Devops), 2);
    }

    #[tokio::test]
    async fn walks_every_state_in_order() {
        let dir = TempDir::new().unwrap();
        let mut monitor = monitor(&dir, settings(3));
        let (tx, rx) = watch::channel(false);

        monitor
            .run(rx, |_| {
                tx.send(true).ok();
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(
            monitor.log.transitions,
            vec![
                MonitorState::Collecting,
                MonitorState::Detecting,
                MonitorState::Correlating,
                MonitorState::ScoringDedup,
                MonitorState::Recommending,
                MonitorState::Prioritizing,
                MonitorState::Reporting,
                MonitorState::Sleeping,
                MonitorState::Stopped,
            ]
        );
    }

    #[tokio::test]
    async fn history_stays_bounded_across_cycles() {
        let dir = TempDir::new().unwrap();
        let mut monitor = monitor(&dir, settings(3));
        let (tx, rx) = watch::channel(false);

        let mut published = 0;
        monitor
            .run(rx, |_| {
                published += 1;
                if published == 5 {
                    tx.send(true).ok();
                }
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(monitor.history.len(PipelineType::Devops), 3);
    }

    #[tokio::test]
    async fn repeated_failures_stop_with_state_corruption() {
        let dir = TempDir::new().unwrap();
        let mut monitor = monitor(&dir, settings(2));
        let (_tx, rx) = watch::channel(false);

        let result = monitor
            .run(rx, |_| Err(PipelensError::Invariant("report sink broken".into())))
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, PipelensError::StateCorruption(_)), "Got: {err}");
        assert_eq!(err.exit_code(), 2);
        assert_eq!(monitor.state(), MonitorState::Stopped);
        assert_eq!(
            monitor.history.len(PipelineType::Devops),
            0,
            "Failed cycles never append to history"
        );
    }

    #[tokio::test]
    async fn a_single_failure_is_retried_next_interval() {
        let dir = TempDir::new().unwrap();
        let mut monitor = monitor(&dir, settings(2));
        let (tx, rx) = watch::channel(false);

        let mut calls = 0;
        let cycles = monitor
            .run(rx, |_| {
                calls += 1;
                match calls {
                    1 => Err(PipelensError::Invariant("transient".into())),
                    _ => {
                        tx.send(true).ok();
                        Ok(())
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(calls, 2);
        assert_eq!(cycles, 1);
    }
}
