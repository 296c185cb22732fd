//! State sinks
//!
//! A sink consumes one normalized state: a snapshot file, a human-readable
//! dump on stdout, or a replayable registry log topic.

pub mod debug;
pub mod snapshot;
pub mod topic;

pub use debug::DebugSink;
pub use snapshot::SnapshotSink;
pub use topic::{KafkaProducer, RecordProducer, TopicSink};

use crate::config::SinkSpec;
use crate::error::Result;
use crate::state::State;

/// Persists a state
pub trait Sink {
    fn put_state(&mut self, state: &State) -> Result<()>;
}

/// Build the sink a declaration describes
pub fn build(spec: SinkSpec) -> Box<dyn Sink> {
    match spec {
        SinkSpec::Snapshot(file) => Box::new(SnapshotSink::new(file.filename)),
        SinkSpec::Debug => Box::new(DebugSink::stdout()),
        SinkSpec::Topic(topic) => Box::new(TopicSink::new(topic)),
    }
}
