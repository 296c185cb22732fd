//! Human-readable dump sink

use std::io::{self, Stdout, Write};

use crate::error::Result;
use crate::sink::Sink;
use crate::snapshot;
use crate::state::State;

/// Sink printing the snapshot encoding of a state
pub struct DebugSink<W = Stdout> {
    out: W,
}

impl DebugSink<Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> DebugSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Sink for DebugSink<W> {
    fn put_state(&mut self, state: &State) -> Result<()> {
        writeln!(self.out, "{}", snapshot::encode(state)?)?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{CompatibilityLevel, CompatibilityResult};

    #[test]
    fn test_prints_snapshot() {
        let state = State {
            compatibility_results: vec![CompatibilityResult::new("user", CompatibilityLevel::None)],
            ..Default::default()
        };
        let mut sink = DebugSink::new(Vec::new());
        sink.put_state(&state).unwrap();

        let printed = String::from_utf8(sink.into_inner()).unwrap();
        assert!(printed.contains("compatibilityLevel: NONE"));
        assert_eq!(snapshot::decode(&printed).unwrap(), state);
    }
}
