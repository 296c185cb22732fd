//! Snapshot file source

use std::path::PathBuf;

use tracing::info;

use crate::error::Result;
use crate::snapshot;
use crate::source::Source;
use crate::state::State;

/// Source reading a snapshot written by a previous run
pub struct SnapshotSource {
    path: PathBuf,
}

impl SnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Source for SnapshotSource {
    fn get_state(&self) -> Result<State> {
        let state = snapshot::read(&self.path)?;
        info!(
            path = %self.path.display(),
            schemas = state.subject_schemas.len(),
            "read snapshot"
        );
        Ok(state)
    }
}
