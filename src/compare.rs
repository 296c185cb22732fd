//! State comparison
//!
//! Checks that two independently read states describe the same registry
//! contents. Every subject version must exist on both sides with the same
//! schema id, schema type and reference list.
//!
//! Compatibility settings and soft-deletions are not part of the check; a
//! difference in either is only logged.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::error::{MigrateError, Result, Side};
use crate::state::{SchemaReference, State, SubjectSchema};

type Index<'a> = HashMap<(&'a str, i32), &'a SubjectSchema>;

fn index(state: &State) -> Index<'_> {
    state
        .subject_schemas
        .iter()
        .map(|s| ((s.subject.as_str(), s.version), s))
        .collect()
}

/// Fail on the first subject version that differs between `left` and `right`
pub fn compare(left: &State, right: &State) -> Result<()> {
    let left_index = index(left);
    let right_index = index(right);

    for entry in &left.subject_schemas {
        let other = lookup(&right_index, entry, Side::Right)?;
        check_entry(entry, other)?;
    }

    for entry in &right.subject_schemas {
        let other = lookup(&left_index, entry, Side::Left)?;
        check_entry(other, entry)?;
    }

    flag_unchecked(left, right);
    info!(schemas = left.subject_schemas.len(), "states match");
    Ok(())
}

fn lookup<'a, 'k>(
    index: &HashMap<(&'k str, i32), &'a SubjectSchema>,
    entry: &'k SubjectSchema,
    side: Side,
) -> Result<&'a SubjectSchema> {
    index
        .get(&(entry.subject.as_str(), entry.version))
        .copied()
        .ok_or_else(|| MigrateError::MissingEntry {
            subject: entry.subject.clone(),
            version: entry.version,
            side,
        })
}

fn check_entry(left: &SubjectSchema, right: &SubjectSchema) -> Result<()> {
    if left.id != right.id {
        return Err(mismatch(left, "schema IDs", left.id.to_string(), right.id.to_string()));
    }
    if left.schema_type != right.schema_type {
        return Err(mismatch(
            left,
            "schema types",
            left.schema_type.to_string(),
            right.schema_type.to_string(),
        ));
    }
    if left.references != right.references {
        return Err(mismatch(
            left,
            "references",
            describe(&left.references),
            describe(&right.references),
        ));
    }
    Ok(())
}

fn mismatch(entry: &SubjectSchema, field: &'static str, left: String, right: String) -> MigrateError {
    MigrateError::Mismatch {
        subject: entry.subject.clone(),
        version: entry.version,
        field,
        left,
        right,
    }
}

fn describe(references: &[SchemaReference]) -> String {
    let items: Vec<String> = references
        .iter()
        .map(|r| format!("{}={} v{}", r.name, r.subject, r.version))
        .collect();
    format!("[{}]", items.join(", "))
}

fn flag_unchecked(left: &State, right: &State) {
    if left.compatibility_results.len() != right.compatibility_results.len() {
        warn!(
            left = left.compatibility_results.len(),
            right = right.compatibility_results.len(),
            "compatibility settings differ in number; not compared"
        );
    }
    if left.soft_deletions.len() != right.soft_deletions.len() {
        warn!(
            left = left.soft_deletions.len(),
            right = right.soft_deletions.len(),
            "soft-deletions differ in number; not compared"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{CompatibilityLevel, CompatibilityResult, SchemaType, SubjectVersion};

    fn state() -> State {
        let base = SubjectSchema {
            subject: "customer".to_string(),
            version: 1,
            id: 10,
            schema_type: SchemaType::Json,
            schema: "{}".to_string(),
            references: Vec::new(),
            metadata: None,
        };
        let dependent = SubjectSchema {
            subject: "order".to_string(),
            version: 2,
            id: 11,
            schema_type: SchemaType::Json,
            schema: "{\"$ref\":\"customer.json\"}".to_string(),
            references: vec![SchemaReference {
                name: "customer.json".to_string(),
                subject: "customer".to_string(),
                version: 1,
            }],
            metadata: None,
        };
        State {
            subject_schemas: vec![base, dependent],
            ..Default::default()
        }
    }

    #[test]
    fn test_identical_states_match() {
        compare(&state(), &state()).unwrap();
    }

    #[test]
    fn test_ordering_is_irrelevant() {
        let mut reversed = state();
        reversed.subject_schemas.reverse();
        compare(&state(), &reversed).unwrap();
    }

    #[test]
    fn test_id_mismatch_names_entry() {
        let mut other = state();
        other.subject_schemas[1].id = 99;
        let err = compare(&state(), &other).unwrap_err();
        match &err {
            MigrateError::Mismatch { subject, version, field, left, right } => {
                assert_eq!((subject.as_str(), *version), ("order", 2));
                assert_eq!(*field, "schema IDs");
                assert_eq!((left.as_str(), right.as_str()), ("11", "99"));
            }
            other => panic!("Expected Mismatch, got {:?}", other),
        }
        assert!(err.to_string().contains("order version 2"));
    }

    #[test]
    fn test_type_mismatch() {
        let mut other = state();
        other.subject_schemas[0].schema_type = SchemaType::Avro;
        assert!(matches!(
            compare(&state(), &other),
            Err(MigrateError::Mismatch { field: "schema types", .. })
        ));
    }

    #[test]
    fn test_reference_mismatch() {
        let mut other = state();
        other.subject_schemas[1].references[0].version = 2;
        let err = compare(&state(), &other).unwrap_err();
        assert!(err.to_string().contains("customer.json=customer v1"));
        assert!(err.to_string().contains("customer.json=customer v2"));
    }

    #[test]
    fn test_missing_on_either_side() {
        let mut fewer = state();
        fewer.subject_schemas.pop();

        assert!(matches!(
            compare(&state(), &fewer),
            Err(MigrateError::MissingEntry { side: Side::Right, .. })
        ));
        assert!(matches!(
            compare(&fewer, &state()),
            Err(MigrateError::MissingEntry { side: Side::Left, .. })
        ));
    }

    #[test]
    fn test_schema_text_and_settings_are_not_compared() {
        let mut other = state();
        other.subject_schemas[0].schema = "{\"type\":\"object\"}".to_string();
        other.soft_deletions.push(SubjectVersion::new("customer", 1));
        other
            .compatibility_results
            .push(CompatibilityResult::new("order", CompatibilityLevel::None));
        compare(&state(), &other).unwrap();
    }
}
