//! State sources
//!
//! A source produces a complete state in one call: from a live registry,
//! from a snapshot file, or from a dump of the registry log topic.

pub mod dump;
pub mod registry;
pub mod snapshot;

pub use dump::{parse_dump, parse_line, LogDumpSource, LogEntry};
pub use registry::{RegistrySource, MAX_FETCH_ATTEMPTS};
pub use snapshot::SnapshotSource;

use crate::client::HttpRegistryClient;
use crate::config::SourceSpec;
use crate::error::Result;
use crate::state::State;

/// Produces a state
pub trait Source {
    fn get_state(&self) -> Result<State>;
}

/// Build the source a declaration describes
pub fn build(spec: SourceSpec) -> Result<Box<dyn Source>> {
    let source: Box<dyn Source> = match spec {
        SourceSpec::Rest(rest) => Box::new(RegistrySource::new(HttpRegistryClient::new(&rest)?)),
        SourceSpec::Snapshot(file) => Box::new(SnapshotSource::new(file.filename)),
        SourceSpec::LogDump(file) => Box::new(LogDumpSource::new(file.filename)),
    };
    Ok(source)
}
