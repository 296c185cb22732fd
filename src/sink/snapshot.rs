//! Snapshot file sink

use std::path::PathBuf;

use tracing::info;

use crate::error::Result;
use crate::sink::Sink;
use crate::snapshot;
use crate::state::State;

/// Sink writing a snapshot file for a later run
pub struct SnapshotSink {
    path: PathBuf,
}

impl SnapshotSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Sink for SnapshotSink {
    fn put_state(&mut self, state: &State) -> Result<()> {
        snapshot::write(&self.path, state)?;
        info!(
            path = %self.path.display(),
            schemas = state.subject_schemas.len(),
            "wrote snapshot"
        );
        Ok(())
    }
}
