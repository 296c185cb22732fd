//! Log dump parser
//!
//! Reads a line-oriented dump of the registry's internal log topic. Each
//! line is one JSON record `{"key": {...}, "value": {...}}`, in log order.
//! Lines are decoded into loosely typed raw records first, then every field
//! the state needs is required explicitly so a malformed line reports the
//! exact field and line number.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{MigrateError, Result};
use crate::source::Source;
use crate::state::{
    CompatibilityLevel, CompatibilityResult, SchemaMetadata, SchemaReference, SchemaType, State,
    SubjectSchema, SubjectVersion,
};

#[derive(Debug, Deserialize)]
struct RawRecord {
    key: Option<RawKey>,
    #[serde(default)]
    value: Option<RawValue>,
}

#[derive(Debug, Deserialize)]
struct RawKey {
    keytype: Option<String>,
    subject: Option<String>,
    version: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawValue {
    id: Option<f64>,
    schema_type: Option<String>,
    schema: Option<String>,
    deleted: Option<bool>,
    references: Option<Vec<RawReference>>,
    metadata: Option<SchemaMetadata>,
    compatibility_level: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawReference {
    name: Option<String>,
    subject: Option<String>,
    version: Option<f64>,
}

/// One decoded log record
#[derive(Debug, Clone, PartialEq)]
pub enum LogEntry {
    /// A schema version, with its soft-deletion flag
    Schema {
        subject_schema: SubjectSchema,
        deleted: bool,
    },
    /// A per-subject compatibility setting
    SubjectConfig(CompatibilityResult),
    /// The global compatibility default; not carried into the state
    GlobalConfig,
}

/// Decode one dump line; `line` is 1-based and only used for error context
pub fn parse_line(text: &str, line: usize) -> Result<LogEntry> {
    let record: RawRecord =
        serde_json::from_str(text).map_err(|source| MigrateError::DumpSyntax { line, source })?;
    let key = require(record.key, line, "key")?;
    let keytype = require(key.keytype, line, "key.keytype")?;

    match keytype.as_str() {
        "CONFIG" => {
            let Some(subject) = key.subject else {
                return Ok(LogEntry::GlobalConfig);
            };
            let value = require(record.value, line, "value")?;
            let level_text = require(value.compatibility_level, line, "value.compatibilityLevel")?;
            let level = level_text
                .parse::<CompatibilityLevel>()
                .map_err(|source| MigrateError::InvalidField {
                    line,
                    field: "value.compatibilityLevel",
                    source,
                })?;
            Ok(LogEntry::SubjectConfig(CompatibilityResult::new(subject, level)))
        }
        "SCHEMA" => {
            let subject = require(key.subject, line, "key.subject")?;
            let version =
                version_number(require(key.version, line, "key.version")?, line, "key.version")?;
            let value = require(record.value, line, "value")?;
            let id = whole(require(value.id, line, "value.id")?, line, "value.id")?;
            let type_text = require(value.schema_type, line, "value.schemaType")?;
            let schema_type = type_text
                .parse::<SchemaType>()
                .map_err(|source| MigrateError::InvalidField {
                    line,
                    field: "value.schemaType",
                    source,
                })?;
            let schema = require(value.schema, line, "value.schema")?;
            let deleted = require(value.deleted, line, "value.deleted")?;

            // An empty list and an absent list are the same thing
            let references = value
                .references
                .unwrap_or_default()
                .into_iter()
                .map(|raw| {
                    Ok(SchemaReference {
                        name: require(raw.name, line, "value.references.name")?,
                        subject: require(raw.subject, line, "value.references.subject")?,
                        version: version_number(
                            require(raw.version, line, "value.references.version")?,
                            line,
                            "value.references.version",
                        )?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            Ok(LogEntry::Schema {
                subject_schema: SubjectSchema {
                    subject,
                    version,
                    id,
                    schema_type,
                    schema,
                    references,
                    metadata: value.metadata,
                },
                deleted,
            })
        }
        _ => Err(MigrateError::UnknownKeyType { line, keytype }),
    }
}

/// Rebuild a state from dump lines, in log order
pub fn parse_dump<R: BufRead>(reader: R) -> Result<State> {
    let mut state = State::default();

    for (index, text) in reader.lines().enumerate() {
        let line = index + 1;
        let text = text?;
        if text.trim().is_empty() {
            debug!(line, "skipping blank line");
            continue;
        }

        match parse_line(&text, line)? {
            LogEntry::Schema {
                subject_schema,
                deleted,
            } => {
                if deleted {
                    state
                        .soft_deletions
                        .push(SubjectVersion::new(subject_schema.subject.clone(), subject_schema.version));
                }
                state.subject_schemas.push(subject_schema);
            }
            LogEntry::SubjectConfig(result) => {
                match state
                    .compatibility_results
                    .iter_mut()
                    .find(|existing| existing.subject == result.subject)
                {
                    Some(existing) => *existing = result,
                    None => state.compatibility_results.push(result),
                }
            }
            LogEntry::GlobalConfig => {
                debug!(line, "discarding global compatibility record");
            }
        }
    }

    Ok(state)
}

/// Source reading a raw dump of the registry log topic
pub struct LogDumpSource {
    path: PathBuf,
}

impl LogDumpSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Source for LogDumpSource {
    fn get_state(&self) -> Result<State> {
        let file = File::open(&self.path)?;
        let state = parse_dump(BufReader::new(file))?;
        info!(
            path = %self.path.display(),
            schemas = state.subject_schemas.len(),
            soft_deletions = state.soft_deletions.len(),
            compatibility = state.compatibility_results.len(),
            "read log dump"
        );
        Ok(state)
    }
}

fn require<T>(field: Option<T>, line: usize, name: &'static str) -> Result<T> {
    field.ok_or(MigrateError::MissingField { line, field: name })
}

/// Numbers in the dump may arrive as floating point
fn whole(value: f64, line: usize, field: &'static str) -> Result<i32> {
    let rounded = value.round();
    if (f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(&rounded) {
        Ok(rounded as i32)
    } else {
        Err(MigrateError::OutOfRange { line, field, value })
    }
}

/// Versions start at 1
fn version_number(value: f64, line: usize, field: &'static str) -> Result<i32> {
    match whole(value, line, field)? {
        v if v >= 1 => Ok(v),
        _ => Err(MigrateError::OutOfRange { line, field, value }),
    }
}
