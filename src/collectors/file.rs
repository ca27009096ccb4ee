use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::BoxFuture;
use log::debug;

use super::Collector;
use crate::error::{PipelensError, Result};
use crate::insights::{MetricsSnapshot, PipelineType};

/// Reads snapshots from JSON files on disk.
///
/// A source naming a directory resolves to `<dir>/<pipeline>.json`, so one
/// directory can serve both pipeline types.
pub struct FileCollector {
    pipeline: PipelineType,
}

impl FileCollector {
    pub fn new(pipeline: PipelineType) -> Self {
        Self { pipeline }
    }

    pub(super) fn factory(pipeline: PipelineType) -> Result<Arc<dyn Collector>> {
        Ok(Arc::new(Self::new(pipeline)))
    }

    fn resolve_path(&self, source: &str) -> PathBuf {
        let path = Path::new(source.strip_prefix("file://").unwrap_or(source));
        if path.is_dir() {
            path.join(format!("{}.json", self.pipeline.as_str()))
        } else {
            path.to_path_buf()
        }
    }

    async fn read(&self, source: &str) -> Result<MetricsSnapshot> {
        let path = self.resolve_path(source);
        debug!("Reading {} snapshot from {}", self.pipeline.label(), path.display());

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| PipelensError::collection(source, format!("{}: {e}", path.display())))?;

        let snapshot: MetricsSnapshot = serde_json::from_str(&content).map_err(|e| {
            PipelensError::collection(source, format!("invalid snapshot {}: {e}", path.display()))
        })?;

        if snapshot.pipeline_type() != self.pipeline {
            return Err(PipelensError::collection(
                source,
                format!(
                    "snapshot is for the {} pipeline, expected {}",
                    snapshot.pipeline_type().label(),
                    self.pipeline.label()
                ),
            ));
        }

        Ok(snapshot)
    }
}

impl Collector for FileCollector {
    fn kind(&self) -> &'static str {
        "file"
    }

    fn collect<'a>(
        &'a self,
        source: &'a str,
        _lookback_days: u32,
    ) -> BoxFuture<'a, Result<MetricsSnapshot>> {
        Box::pin(self.read(source))
    }
}
