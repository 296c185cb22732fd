//! Registry state model
//!
//! A [`State`] holds the entire logical contents of a schema registry: every
//! subject version (live or soft-deleted), every compatibility override and
//! the set of soft-deleted subject versions. It is the unit of migration.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MigrateError, Result, UnknownVariant};

/// Format of a schema body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SchemaType {
    #[default]
    Avro,
    Json,
    Protobuf,
}

impl SchemaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaType::Avro => "AVRO",
            SchemaType::Json => "JSON",
            SchemaType::Protobuf => "PROTOBUF",
        }
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemaType {
    type Err = UnknownVariant;

    fn from_str(text: &str) -> std::result::Result<Self, Self::Err> {
        match text.to_ascii_uppercase().as_str() {
            "AVRO" => Ok(SchemaType::Avro),
            "JSON" => Ok(SchemaType::Json),
            "PROTOBUF" => Ok(SchemaType::Protobuf),
            _ => Err(UnknownVariant {
                kind: "schema type",
                text: text.to_string(),
            }),
        }
    }
}

/// Policy constraining how a subject's schema may evolve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompatibilityLevel {
    None,
    Backward,
    Forward,
    Full,
    BackwardTransitive,
    ForwardTransitive,
    FullTransitive,
}

impl CompatibilityLevel {
    pub const ALL: [CompatibilityLevel; 7] = [
        CompatibilityLevel::None,
        CompatibilityLevel::Backward,
        CompatibilityLevel::Forward,
        CompatibilityLevel::Full,
        CompatibilityLevel::BackwardTransitive,
        CompatibilityLevel::ForwardTransitive,
        CompatibilityLevel::FullTransitive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CompatibilityLevel::None => "NONE",
            CompatibilityLevel::Backward => "BACKWARD",
            CompatibilityLevel::Forward => "FORWARD",
            CompatibilityLevel::Full => "FULL",
            CompatibilityLevel::BackwardTransitive => "BACKWARD_TRANSITIVE",
            CompatibilityLevel::ForwardTransitive => "FORWARD_TRANSITIVE",
            CompatibilityLevel::FullTransitive => "FULL_TRANSITIVE",
        }
    }
}

impl fmt::Display for CompatibilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompatibilityLevel {
    type Err = UnknownVariant;

    fn from_str(text: &str) -> std::result::Result<Self, Self::Err> {
        let upper = text.to_ascii_uppercase();
        CompatibilityLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == upper)
            .ok_or_else(|| UnknownVariant {
                kind: "compatibility level",
                text: text.to_string(),
            })
    }
}

/// A subject/version pair; the identity key of a [`SubjectSchema`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubjectVersion {
    pub subject: String,
    pub version: i32,
}

impl SubjectVersion {
    pub fn new(subject: impl Into<String>, version: i32) -> Self {
        Self {
            subject: subject.into(),
            version,
        }
    }
}

impl fmt::Display for SubjectVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.subject, self.version)
    }
}

/// Marks a subject version that exists but has been soft-deleted
pub type SoftDeletion = SubjectVersion;

/// A named dependency on a specific version of another subject
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaReference {
    pub name: String,
    pub subject: String,
    pub version: i32,
}

impl SchemaReference {
    pub fn target(&self) -> SubjectVersion {
        SubjectVersion::new(self.subject.clone(), self.version)
    }
}

/// Annotation block attached to a schema
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchemaMetadata {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sensitive: Vec<String>,
}

/// One version of one subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectSchema {
    pub subject: String,
    pub version: i32,
    /// Registry-wide schema id; may be shared by several subject versions
    pub id: i32,
    /// The registry omits the type for AVRO bodies
    #[serde(default)]
    pub schema_type: SchemaType,
    pub schema: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<SchemaReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<SchemaMetadata>,
}

impl SubjectSchema {
    pub fn key(&self) -> SubjectVersion {
        SubjectVersion::new(self.subject.clone(), self.version)
    }
}

/// A compatibility setting; an empty subject is the global default
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityResult {
    #[serde(default)]
    pub subject: String,
    #[serde(rename = "compatibilityLevel")]
    pub level: CompatibilityLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalize: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compatibility_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_metadata: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_metadata: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_rule_set: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_rule_set: Option<serde_json::Value>,
}

impl CompatibilityResult {
    /// Create a bare setting for a subject
    pub fn new(subject: impl Into<String>, level: CompatibilityLevel) -> Self {
        Self {
            subject: subject.into(),
            level,
            alias: None,
            normalize: None,
            compatibility_group: None,
            default_metadata: None,
            override_metadata: None,
            default_rule_set: None,
            override_rule_set: None,
        }
    }

    pub fn is_global(&self) -> bool {
        self.subject.is_empty()
    }
}

/// The entire logical contents of a registry
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    #[serde(default)]
    pub subject_schemas: Vec<SubjectSchema>,
    #[serde(default)]
    pub compatibility_results: Vec<CompatibilityResult>,
    #[serde(default)]
    pub soft_deletions: Vec<SoftDeletion>,
}

impl State {
    /// Stable sort of subject schemas into canonical order: by id, then version
    pub fn sort(&mut self) {
        self.subject_schemas.sort_by_key(|s| (s.id, s.version));
    }

    /// Check uniqueness of keys and that every reference points backwards
    /// in the current ordering
    pub fn validate(&self) -> Result<()> {
        let mut index: HashMap<SubjectVersion, usize> =
            HashMap::with_capacity(self.subject_schemas.len());

        for (position, subject_schema) in self.subject_schemas.iter().enumerate() {
            for reference in &subject_schema.references {
                if !index.contains_key(&reference.target()) {
                    return Err(MigrateError::DanglingReference {
                        subject: subject_schema.subject.clone(),
                        version: subject_schema.version,
                        reference_subject: reference.subject.clone(),
                        reference_version: reference.version,
                    });
                }
            }

            let key = subject_schema.key();
            if index.contains_key(&key) {
                return Err(MigrateError::DuplicateKey {
                    subject: key.subject,
                    version: key.version,
                });
            }
            index.insert(key, position);
        }

        Ok(())
    }

    /// Sort, then validate
    pub fn normalize(&mut self) -> Result<()> {
        self.sort();
        self.validate()
    }

    pub fn is_soft_deleted(&self, key: &SubjectVersion) -> bool {
        self.soft_deletions.contains(key)
    }
}
