mod file;
mod http;

pub use file::FileCollector;
pub use http::HttpCollector;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use log::{debug, info, warn};
use url::Url;

use crate::error::{PipelensError, Result};
use crate::insights::{DataStatus, MetricsSnapshot, PipelineType};

/// Source of metrics snapshots for one pipeline type.
pub trait Collector: Send + Sync {
    fn kind(&self) -> &'static str;

    /// Fetches one snapshot covering the last `lookback_days` days.
    ///
    /// Failures surface as `PipelensError::Collection` and never abort a pass.
    fn collect<'a>(
        &'a self,
        source: &'a str,
        lookback_days: u32,
    ) -> BoxFuture<'a, Result<MetricsSnapshot>>;
}

pub type CollectorFactory = fn(PipelineType) -> Result<Arc<dyn Collector>>;

/// Collector constructors keyed by source type.
pub struct CollectorRegistry {
    factories: BTreeMap<String, CollectorFactory>,
}

impl Default for CollectorRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("file", FileCollector::factory);
        registry.register("http", HttpCollector::factory);
        registry.register("https", HttpCollector::factory);
        registry
    }
}

impl CollectorRegistry {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, kind: &str, factory: CollectorFactory) {
        self.factories.insert(kind.to_ascii_lowercase(), factory);
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Source type of a source string: its URL scheme, or `file` for plain paths.
    pub fn source_kind(source: &str) -> String {
        if source.contains("://") {
            if let Ok(url) = Url::parse(source) {
                return url.scheme().to_ascii_lowercase();
            }
        }
        "file".to_string()
    }

    /// Builds the collector for `source`.
    ///
    /// # Errors
    ///
    /// Returns `PipelensError::Config` when no collector is registered for the
    /// source type.
    pub fn resolve(&self, pipeline: PipelineType, source: &str) -> Result<Arc<dyn Collector>> {
        let kind = Self::source_kind(source);
        let factory = self.factories.get(&kind).ok_or_else(|| {
            PipelensError::Config(format!(
                "No collector for source type '{kind}' ({source}); known types: {}",
                self.kinds().collect::<Vec<_>>().join(", ")
            ))
        })?;
        factory(pipeline)
    }
}

/// Outcome of collecting every source of one pipeline.
#[derive(Debug, Clone)]
pub struct Collected {
    pub snapshot: MetricsSnapshot,
    pub status: DataStatus,
}

/// The sources of one pipeline type, each bound to its collector.
pub struct SourceSet {
    pipeline: PipelineType,
    bindings: Vec<(String, Arc<dyn Collector>)>,
}

impl SourceSet {
    /// Resolves every source through `registry`.
    ///
    /// # Errors
    ///
    /// Returns `PipelensError::Config` if `sources` is empty or a source type is unknown.
    pub fn resolve(
        registry: &CollectorRegistry,
        pipeline: PipelineType,
        sources: &[String],
    ) -> Result<Self> {
        if sources.is_empty() {
            return Err(PipelensError::Config(format!(
                "No sources configured for the {} pipeline",
                pipeline.label()
            )));
        }

        let bindings = sources
            .iter()
            .map(|source| Ok((source.clone(), registry.resolve(pipeline, source)?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { pipeline, bindings })
    }

    pub fn pipeline(&self) -> PipelineType {
        self.pipeline
    }

    /// Collects all sources concurrently, each bounded by `timeout`, and merges
    /// what arrived. Failures are logged and reported in the returned status.
    pub async fn collect(&self, lookback_days: u32, timeout: Duration) -> Collected {
        let futures: Vec<_> = self
            .bindings
            .iter()
            .map(|(source, collector)| collect_one(source, collector.as_ref(), lookback_days, timeout))
            .collect();

        let results = futures::future::join_all(futures).await;

        let mut snapshots = Vec::new();
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => {
                    warn!("{} collection failed: {e}", self.pipeline.label());
                    failures.push(e.to_string());
                }
            }
        }

        let status = if snapshots.is_empty() {
            DataStatus::Missing {
                reason: failures.join("; "),
            }
        } else if failures.is_empty() {
            DataStatus::Complete
        } else {
            DataStatus::Partial { failures }
        };

        let snapshot = merge(self.pipeline, snapshots);
        info!(
            "Collected {} metrics for {} from {}",
            snapshot.metrics().len(),
            self.pipeline.label(),
            if snapshot.source_id().is_empty() {
                "no source"
            } else {
                snapshot.source_id()
            }
        );

        Collected { snapshot, status }
    }
}

async fn collect_one(
    source: &str,
    collector: &dyn Collector,
    lookback_days: u32,
    timeout: Duration,
) -> Result<MetricsSnapshot> {
    debug!("Collecting {source} with the {} collector", collector.kind());
    match tokio::time::timeout(timeout, collector.collect(source, lookback_days)).await {
        Ok(result) => result,
        Err(_) => Err(PipelensError::collection(
            source,
            format!("timed out after {}s", timeout.as_secs()),
        )),
    }
}

/// Merges snapshots in source order; the first source wins on duplicate keys.
fn merge(pipeline: PipelineType, snapshots: Vec<MetricsSnapshot>) -> MetricsSnapshot {
    let captured_at = snapshots
        .iter()
        .map(MetricsSnapshot::captured_at)
        .max()
        .unwrap_or_else(chrono::Utc::now);
    let source_id = snapshots
        .iter()
        .map(MetricsSnapshot::source_id)
        .collect::<Vec<_>>()
        .join(",");

    let mut metrics = BTreeMap::new();
    for snapshot in &snapshots {
        for (name, value) in snapshot.metrics() {
            metrics.entry(name.clone()).or_insert_with(|| value.clone());
        }
    }

    MetricsSnapshot::new(pipeline, source_id, captured_at, metrics)
}
