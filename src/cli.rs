use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

use crate::collectors::{CollectorRegistry, SourceSet};
use crate::config::{Config, OutputFormat};
use crate::engine::{AnalysisPass, History, Monitor, MonitorSettings, RuleCatalog};
use crate::error::PipelensError;
use crate::insights::{AnalysisMode, AnalysisReport, PipelineType};
use crate::output::{export_json, print_summary, write_report_file, PhaseProgress};

#[derive(Parser)]
#[command(name = "pipelens")]
#[command(author, version, about = "DevOps & MLOps pipeline issue detection", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML, JSON or YAML)
    #[arg(short, long, global = true, env = "PIPELENS_CONFIG")]
    config: Option<PathBuf>,

    #[arg(short = 't', long, global = true, value_enum, default_value_t = PipelineSelector::Both)]
    pipeline_type: PipelineSelector,

    /// Metrics source (file, directory or URL); replaces the configured sources
    #[arg(short, long, global = true)]
    source: Vec<String>,

    /// Directory receiving JSON reports
    #[arg(short = 'o', long, global = true, default_value = "reports")]
    report_output: PathBuf,

    /// JSON array of earlier snapshots used as history for pattern rules
    #[arg(long, global = true)]
    history: Option<PathBuf>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect and correlate issues once
    Analyze,
    /// Run analysis passes on an interval until interrupted
    Monitor,
    /// Analyze once and print the full optimization plan
    Optimize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PipelineSelector {
    Devops,
    Mlops,
    Both,
}

impl PipelineSelector {
    fn includes(self, pipeline: PipelineType) -> bool {
        match self {
            Self::Both => true,
            Self::Devops => pipeline == PipelineType::Devops,
            Self::Mlops => pipeline == PipelineType::Mlops,
        }
    }
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())
            .map_err(|e| PipelensError::Config(format!("{e:#}")))?;

        if !self.source.is_empty() {
            if self.pipeline_type.includes(PipelineType::Devops) {
                config.pipeline.devops_sources.clone_from(&self.source);
            }
            if self.pipeline_type.includes(PipelineType::Mlops) {
                config.pipeline.mlops_sources.clone_from(&self.source);
            }
        }
        if self.pretty {
            config.output.pretty = true;
        }

        config.validate()?;
        Ok(config)
    }

    fn build_pass(&self, config: &Config) -> Result<AnalysisPass> {
        let catalog = Arc::new(RuleCatalog::from_config(config)?);
        let registry = CollectorRegistry::default();

        let resolve = |pipeline: PipelineType, sources: &[String]| -> Result<Option<SourceSet>> {
            if self.pipeline_type.includes(pipeline) {
                Ok(Some(SourceSet::resolve(&registry, pipeline, sources)?))
            } else {
                Ok(None)
            }
        };

        let devops = resolve(PipelineType::Devops, &config.pipeline.devops_sources)?;
        let mlops = resolve(PipelineType::Mlops, &config.pipeline.mlops_sources)?;

        Ok(AnalysisPass::new(config, catalog, devops, mlops))
    }

    fn build_history(&self, config: &Config) -> Result<History> {
        let mut history = History::new(config.pipeline.max_history);
        if let Some(path) = &self.history {
            let snapshots = History::load_seed(path)?;
            info!(
                "Seeding history with {} snapshots from {}",
                snapshots.len(),
                path.display()
            );
            history.seed(snapshots);
        }
        Ok(history)
    }

    fn emit(&self, config: &Config, report: &AnalysisReport) -> crate::error::Result<()> {
        match config.output.format {
            OutputFormat::Summary => print_summary(report),
            OutputFormat::Json => {
                export_json(report, config.output.pretty, &mut std::io::stdout().lock())?;
            }
        }
        write_report_file(report, &self.report_output, config.output.pretty)?;
        Ok(())
    }

    async fn execute_once(&self, mode: AnalysisMode) -> Result<()> {
        let config = self.load_config()?;
        let pass = self.build_pass(&config)?;
        let history = self.build_history(&config)?;

        info!(
            "Running {} pass over {}",
            mode.as_str(),
            pass.pipelines()
                .iter()
                .map(|p| p.label())
                .collect::<Vec<_>>()
                .join(" + ")
        );

        let mut progress = PhaseProgress::start();
        let result = pass.run(mode, &history, |stage| progress.advance(stage)).await;
        progress.finish();

        let outcome = result?;
        self.emit(&config, &outcome.report)?;

        Ok(())
    }

    async fn execute_monitor(&self) -> Result<()> {
        let config = self.load_config()?;
        let pass = self.build_pass(&config)?;
        let history = self.build_history(&config)?;

        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            shutdown_signal().await;
            let _ = tx.send(true);
        });

        let mut monitor = Monitor::new(pass, history, MonitorSettings::from(&config));
        let cycles = monitor
            .run(rx, |report| self.emit(&config, report))
            .await?;

        info!("Monitor {} after {cycles} cycles", monitor.state());
        Ok(())
    }

    pub async fn execute(&self) -> Result<()> {
        match &self.command {
            Commands::Analyze => self.execute_once(AnalysisMode::Analyze).await,
            Commands::Optimize => self.execute_once(AnalysisMode::Optimize).await,
            Commands::Monitor => self.execute_monitor().await,
        }
    }
}

/// Resolves on Ctrl+C or, on unix, SIGTERM.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received, finishing the current cycle");
}

#[cfg(test)]
mod tests {
    use super::*;

    mod parse {
        use super::*;

        #[test]
        fn defaults_to_both_pipelines_and_reports_dir() {
            let cli = Cli::try_parse_from(["pipelens", "analyze"]).unwrap();

            assert!(matches!(cli.command, Commands::Analyze));
            assert_eq!(cli.pipeline_type, PipelineSelector::Both);
            assert_eq!(cli.report_output, PathBuf::from("reports"));
            assert!(cli.source.is_empty());
        }

        #[test]
        fn accepts_global_options_after_subcommand() {
            let cli = Cli::try_parse_from([
                "pipelens",
                "monitor",
                "--pipeline-type",
                "mlops",
                "--source",
                "https://mlflow.example.com/metrics",
                "--report-output",
                "/tmp/out",
            ])
            .unwrap();

            assert!(matches!(cli.command, Commands::Monitor));
            assert_eq!(cli.pipeline_type, PipelineSelector::Mlops);
            assert_eq!(cli.source, vec!["https://mlflow.example.com/metrics"]);
            assert_eq!(cli.report_output, PathBuf::from("/tmp/out"));
        }

        #[test]
        fn rejects_unknown_pipeline_type() {
            assert!(Cli::try_parse_from(["pipelens", "analyze", "-t", "dataops"]).is_err());
        }
    }

    mod load_config {
        use super::*;

        #[test]
        fn source_replaces_only_selected_pipelines() {
            let cli = Cli::try_parse_from([
                "pipelens",
                "analyze",
                "-t",
                "devops",
                "-s",
                "./snapshots",
            ])
            .unwrap();

            let config = cli.load_config().unwrap();

            assert_eq!(config.pipeline.devops_sources, vec!["./snapshots"]);
            assert!(config.pipeline.mlops_sources.is_empty());
        }

        #[test]
        fn missing_explicit_config_is_a_config_error() {
            let cli = Cli::try_parse_from([
                "pipelens",
                "analyze",
                "--config",
                "/nonexistent/pipelens.toml",
            ])
            .unwrap();

            let err = cli.load_config().unwrap_err();
            let err = err.downcast_ref::<PipelensError>().unwrap();
            assert_eq!(err.exit_code(), 1);
        }
    }

    mod build_pass {
        use super::*;

        #[test]
        fn unknown_source_type_fails_before_any_pass() {
            let cli =
                Cli::try_parse_from(["pipelens", "analyze", "-s", "ftp://metrics.example.com"])
                    .unwrap();
            let config = cli.load_config().unwrap();

            let err = cli.build_pass(&config).err().unwrap();
            let err = err.downcast_ref::<PipelensError>().unwrap();
            assert_eq!(err.exit_code(), 1);
        }

        #[test]
        fn selector_limits_collected_pipelines() {
            let cli = Cli::try_parse_from(["pipelens", "analyze", "-t", "mlops", "-s", "."])
                .unwrap();
            let config = cli.load_config().unwrap();

            let pass = cli.build_pass(&config).unwrap();
            assert_eq!(pass.pipelines(), vec![PipelineType::Mlops]);
        }
    }
}
