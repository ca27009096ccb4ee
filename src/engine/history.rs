use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use crate::error::{PipelensError, Result};
use crate::insights::{MetricsSnapshot, PipelineType};

type Samples = VecDeque<Arc<MetricsSnapshot>>;

/// Read-only view of one pipeline's history, oldest sample first.
///
/// Cloning is cheap; a window taken before an append keeps seeing the old samples.
#[derive(Debug, Clone, Default)]
pub struct HistoryWindow {
    samples: Arc<Samples>,
}

impl HistoryWindow {
    #[cfg(test)]
    pub fn from_snapshots(snapshots: impl IntoIterator<Item = MetricsSnapshot>) -> Self {
        Self {
            samples: Arc::new(snapshots.into_iter().map(Arc::new).collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricsSnapshot> {
        self.samples.iter().map(AsRef::as_ref)
    }

    /// The last `count` samples, oldest first.
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &MetricsSnapshot> {
        let skip = self.samples.len().saturating_sub(count);
        self.iter().skip(skip)
    }
}

/// Bounded per-pipeline history.
///
/// Appends build a new sample list and swap it in, so readers holding a
/// `HistoryWindow` never observe a half-applied cycle.
#[derive(Debug)]
pub struct HistoryBuffer {
    capacity: usize,
    current: Arc<Samples>,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            current: Arc::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn window(&self) -> HistoryWindow {
        HistoryWindow {
            samples: Arc::clone(&self.current),
        }
    }

    pub fn append(&mut self, snapshot: Arc<MetricsSnapshot>) {
        let mut next: Samples = (*self.current).clone();
        next.push_back(snapshot);
        while next.len() > self.capacity {
            next.pop_front();
        }
        self.current = Arc::new(next);
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }
}

/// History for both pipeline types, owned by whoever drives the passes.
#[derive(Debug)]
pub struct History {
    devops: HistoryBuffer,
    mlops: HistoryBuffer,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            devops: HistoryBuffer::new(capacity),
            mlops: HistoryBuffer::new(capacity),
        }
    }

    fn buffer(&self, pipeline: PipelineType) -> &HistoryBuffer {
        match pipeline {
            PipelineType::Devops => &self.devops,
            PipelineType::Mlops => &self.mlops,
        }
    }

    pub fn window(&self, pipeline: PipelineType) -> HistoryWindow {
        self.buffer(pipeline).window()
    }

    pub fn len(&self, pipeline: PipelineType) -> usize {
        self.buffer(pipeline).len()
    }

    /// Appends to the buffer of the snapshot's own pipeline.
    pub fn append(&mut self, snapshot: Arc<MetricsSnapshot>) {
        match snapshot.pipeline_type() {
            PipelineType::Devops => self.devops.append(snapshot),
            PipelineType::Mlops => self.mlops.append(snapshot),
        }
    }

    /// Seeds history from prior snapshots, oldest first.
    pub fn seed(&mut self, snapshots: impl IntoIterator<Item = MetricsSnapshot>) {
        for snapshot in snapshots {
            self.append(Arc::new(snapshot));
        }
    }

    /// Reads a JSON array of snapshots to seed history with.
    ///
    /// # Errors
    ///
    /// Returns `PipelensError::Config` if the file is unreadable or malformed.
    pub fn load_seed(path: &Path) -> Result<Vec<MetricsSnapshot>> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PipelensError::Config(format!(
                "Failed to read history file {}: {e}",
                path.display()
            ))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            PipelensError::Config(format!(
                "Failed to parse history file {}: {e}",
                path.display()
            ))
        })
    }
}
