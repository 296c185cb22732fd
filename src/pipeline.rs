//! Operation modes
//!
//! `migrate` reads one source and writes it to one sink; `validate` reads
//! two sources and compares them. Every state passes through the configured
//! processors, then sort and validate, before it is used.

use tracing::info;

use crate::compare;
use crate::error::Result;
use crate::process::{self, Processor};
use crate::sink::Sink;
use crate::source::Source;
use crate::state::State;

/// Read a state and bring it into canonical, validated form
pub fn load(source: &dyn Source, processors: &[Processor]) -> Result<State> {
    let mut state = source.get_state()?;
    process::apply_all(processors, &mut state)?;
    state.normalize()?;
    Ok(state)
}

/// Copy the state of `source` into `sink`
pub fn migrate(source: &dyn Source, sink: &mut dyn Sink, processors: &[Processor]) -> Result<()> {
    let state = load(source, processors)?;
    info!(
        schemas = state.subject_schemas.len(),
        soft_deletions = state.soft_deletions.len(),
        compatibility = state.compatibility_results.len(),
        "state loaded, writing to sink"
    );
    sink.put_state(&state)
}

/// Check that two sources hold equivalent states
pub fn validate(source_a: &dyn Source, source_b: &dyn Source, processors: &[Processor]) -> Result<()> {
    let state_a = load(source_a, processors)?;
    let state_b = load(source_b, processors)?;
    compare::compare(&state_a, &state_b)
}
