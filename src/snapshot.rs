//! Snapshot codec
//!
//! A snapshot is the YAML encoding of a [`State`], field for field.

use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::state::State;

/// Encode a state as a snapshot document
pub fn encode(state: &State) -> Result<String> {
    Ok(serde_yaml::to_string(state)?)
}

/// Decode a snapshot document
pub fn decode(text: &str) -> Result<State> {
    Ok(serde_yaml::from_str(text)?)
}

/// Read a snapshot file
pub fn read(path: impl AsRef<Path>) -> Result<State> {
    let text = fs::read_to_string(path)?;
    decode(&text)
}

/// Write a snapshot file, replacing any existing one
pub fn write(path: impl AsRef<Path>, state: &State) -> Result<()> {
    fs::write(path, encode(state)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{
        CompatibilityLevel, CompatibilityResult, SchemaMetadata, SchemaReference, SchemaType,
        SubjectSchema, SubjectVersion,
    };
    use tempfile::tempdir;

    fn sample() -> State {
        let mut metadata = SchemaMetadata::default();
        metadata.properties.insert("owner".to_string(), "payments".to_string());
        metadata.tags.insert("amount".to_string(), vec!["PII".to_string()]);

        let mut compatibility = CompatibilityResult::new("order", CompatibilityLevel::ForwardTransitive);
        compatibility.normalize = Some(true);

        State {
            subject_schemas: vec![
                SubjectSchema {
                    subject: "customer".to_string(),
                    version: 1,
                    id: 1,
                    schema_type: SchemaType::Protobuf,
                    schema: "syntax = \"proto3\";\nmessage Customer { string id = 1; }".to_string(),
                    references: Vec::new(),
                    metadata: None,
                },
                SubjectSchema {
                    subject: "order".to_string(),
                    version: 3,
                    id: 2,
                    schema_type: SchemaType::Protobuf,
                    schema: "import \"customer.proto\";".to_string(),
                    references: vec![SchemaReference {
                        name: "customer.proto".to_string(),
                        subject: "customer".to_string(),
                        version: 1,
                    }],
                    metadata: Some(metadata),
                },
            ],
            compatibility_results: vec![compatibility],
            soft_deletions: vec![SubjectVersion::new("customer", 1)],
        }
    }

    #[test]
    fn test_snapshot_round_trip() {
        let state = sample();
        let decoded = decode(&encode(&state).unwrap()).unwrap();
        assert_eq!(decoded, state);
    }

    #[test]
    fn test_snapshot_uses_model_field_names() {
        let text = encode(&sample()).unwrap();
        for field in [
            "subjectSchemas:",
            "compatibilityResults:",
            "softDeletions:",
            "schemaType: PROTOBUF",
            "compatibilityLevel: FORWARD_TRANSITIVE",
        ] {
            assert!(text.contains(field), "missing {} in\n{}", field, text);
        }
    }

    #[test]
    fn test_snapshot_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.yaml");
        write(&path, &sample()).unwrap();
        assert_eq!(read(&path).unwrap(), sample());
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let state = decode("subjectSchemas: []\n").unwrap();
        assert_eq!(state, State::default());
    }
}
