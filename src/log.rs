//! Log reconstruction
//!
//! Converts a validated [`State`] into the ordered records of the registry's
//! internal log topic. Replaying the records into an empty topic rebuilds
//! the same registry contents.
//!
//! ```text
//! CONFIG  (global)      NONE               enforcement off
//! SCHEMA  subject/v     body + deleted     one per subject version, canonical order
//! CONFIG  subject       level              one per compatibility setting
//! CONFIG  (global)      target level       enforcement back on
//! ```

use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::state::{CompatibilityLevel, CompatibilityResult, State, SubjectSchema, SubjectVersion};

pub const SCHEMA_KEY_MAGIC: u8 = 1;
pub const CONFIG_KEY_MAGIC: u8 = 0;

/// Compatibility value fields the log format rejects
pub const UNSUPPORTED_CONFIG_FIELDS: [&str; 7] = [
    "alias",
    "compatibilityGroup",
    "defaultMetadata",
    "defaultRuleSet",
    "overrideMetadata",
    "overrideRuleSet",
    "normalize",
];

/// One key/value message of the log topic, as JSON bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl LogRecord {
    /// Render as a dump line, the shape the dump parser reads
    pub fn to_dump_line(&self) -> Result<String> {
        let key: Value = serde_json::from_slice(&self.key)?;
        let value: Value = serde_json::from_slice(&self.value)?;
        Ok(serde_json::to_string(&serde_json::json!({ "key": key, "value": value }))?)
    }
}

// Field order is lexicographic to match the registry's own encoding
#[derive(Serialize)]
struct SchemaKey<'a> {
    keytype: &'static str,
    magic: u8,
    subject: &'a str,
    version: i32,
}

#[derive(Serialize)]
struct ConfigKey<'a> {
    keytype: &'static str,
    magic: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    subject: Option<&'a str>,
}

#[derive(Serialize)]
struct ConfigValue {
    #[serde(rename = "compatibilityLevel")]
    level: CompatibilityLevel,
}

/// Builds log records from a state
#[derive(Debug, Clone, Copy)]
pub struct LogReconstructor {
    /// Level restored by the closing record
    target: CompatibilityLevel,
}

impl LogReconstructor {
    pub fn new(target: CompatibilityLevel) -> Self {
        Self { target }
    }

    /// All records for a state, in replay order
    pub fn records(&self, state: &State) -> Result<Vec<LogRecord>> {
        let deleted: HashSet<&SubjectVersion> = state.soft_deletions.iter().collect();
        let mut records =
            Vec::with_capacity(state.subject_schemas.len() + state.compatibility_results.len() + 2);

        records.push(global_config(CompatibilityLevel::None)?);

        for subject_schema in &state.subject_schemas {
            let is_deleted = deleted.contains(&subject_schema.key());
            records.push(schema_record(subject_schema, is_deleted)?);
        }

        for result in &state.compatibility_results {
            records.push(compatibility_record(result)?);
        }

        records.push(global_config(self.target)?);

        debug!(records = records.len(), "reconstructed log records");
        Ok(records)
    }
}

fn global_config(level: CompatibilityLevel) -> Result<LogRecord> {
    Ok(LogRecord {
        key: serde_json::to_vec(&ConfigKey {
            keytype: "CONFIG",
            magic: CONFIG_KEY_MAGIC,
            subject: None,
        })?,
        value: serde_json::to_vec(&ConfigValue { level })?,
    })
}

fn schema_record(subject_schema: &SubjectSchema, deleted: bool) -> Result<LogRecord> {
    let key = serde_json::to_vec(&SchemaKey {
        keytype: "SCHEMA",
        magic: SCHEMA_KEY_MAGIC,
        subject: &subject_schema.subject,
        version: subject_schema.version,
    })?;

    let mut value = serde_json::to_value(subject_schema)?;
    if let Value::Object(fields) = &mut value {
        fields.insert("deleted".to_string(), Value::Bool(deleted));
    }

    Ok(LogRecord {
        key,
        value: serde_json::to_vec(&value)?,
    })
}

fn compatibility_record(result: &CompatibilityResult) -> Result<LogRecord> {
    let key = serde_json::to_vec(&ConfigKey {
        keytype: "CONFIG",
        magic: CONFIG_KEY_MAGIC,
        subject: (!result.subject.is_empty()).then_some(result.subject.as_str()),
    })?;

    let mut value = serde_json::to_value(result)?;
    if let Value::Object(fields) = &mut value {
        // The subject travels in the key
        fields.remove("subject");
        for field in UNSUPPORTED_CONFIG_FIELDS {
            fields.remove(field);
        }
    }

    Ok(LogRecord {
        key,
        value: serde_json::to_vec(&value)?,
    })
}
