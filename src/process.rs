//! State processors
//!
//! Optional steps applied to a freshly read state, before it is sorted and
//! validated.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{MigrateError, Result};
use crate::state::State;

/// A processing step named in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Processor {
    /// Drop schema metadata, for targets that do not accept it
    StripMetadata,
    /// Fail if any schema still carries metadata
    RejectMetadata,
}

impl Processor {
    pub fn apply(&self, state: &mut State) -> Result<()> {
        match self {
            Processor::StripMetadata => {
                let mut stripped = 0;
                for subject_schema in &mut state.subject_schemas {
                    if subject_schema.metadata.take().is_some() {
                        stripped += 1;
                    }
                }
                info!(stripped, "stripped schema metadata");
                Ok(())
            }
            Processor::RejectMetadata => match state.subject_schemas.iter().find(|s| s.metadata.is_some()) {
                Some(found) => Err(MigrateError::MetadataPresent {
                    subject: found.subject.clone(),
                    version: found.version,
                }),
                None => Ok(()),
            },
        }
    }
}

/// Apply processors in order
pub fn apply_all(processors: &[Processor], state: &mut State) -> Result<()> {
    for processor in processors {
        processor.apply(state)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{SchemaMetadata, SchemaType, SubjectSchema};

    fn state_with_metadata() -> State {
        let mut metadata = SchemaMetadata::default();
        metadata.sensitive.push("ssn".to_string());
        State {
            subject_schemas: vec![
                SubjectSchema {
                    subject: "plain".to_string(),
                    version: 1,
                    id: 1,
                    schema_type: SchemaType::Json,
                    schema: "{}".to_string(),
                    references: Vec::new(),
                    metadata: None,
                },
                SubjectSchema {
                    subject: "tagged".to_string(),
                    version: 2,
                    id: 2,
                    schema_type: SchemaType::Json,
                    schema: "{}".to_string(),
                    references: Vec::new(),
                    metadata: Some(metadata),
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_reject_names_offending_version() {
        let mut state = state_with_metadata();
        match Processor::RejectMetadata.apply(&mut state) {
            Err(MigrateError::MetadataPresent { subject, version }) => {
                assert_eq!(subject, "tagged");
                assert_eq!(version, 2);
            }
            other => panic!("Expected MetadataPresent, got {:?}", other),
        }
    }

    #[test]
    fn test_strip_then_reject_passes() {
        let mut state = state_with_metadata();
        apply_all(&[Processor::StripMetadata, Processor::RejectMetadata], &mut state).unwrap();
        assert!(state.subject_schemas.iter().all(|s| s.metadata.is_none()));
    }
}
