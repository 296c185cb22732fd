//! Error types for the migrator

use thiserror::Error;

/// Result type for migration operations
pub type Result<T> = std::result::Result<T, MigrateError>;

/// Migration errors
#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("Invalid configuration at {path}: {reason}")]
    InvalidConfig { path: String, reason: String },

    #[error("Configuration error: {0}")]
    Settings(#[from] config_crate::ConfigError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Unable to retrieve subject {subject} version {version} after {attempts} attempts: {source}")]
    FetchExhausted {
        subject: String,
        version: i32,
        attempts: usize,
        source: RegistryError,
    },

    #[error("Unable to retrieve compatibility settings: {}", join_failures(.0))]
    Compatibility(Vec<(String, RegistryError)>),

    #[error("Malformed JSON at line {line}: {source}")]
    DumpSyntax {
        line: usize,
        source: serde_json::Error,
    },

    #[error("Missing {field} at line {line}")]
    MissingField { line: usize, field: &'static str },

    #[error("Unrecognised key type {keytype:?} at line {line}")]
    UnknownKeyType { line: usize, keytype: String },

    #[error("Invalid {field} at line {line}: {source}")]
    InvalidField {
        line: usize,
        field: &'static str,
        source: UnknownVariant,
    },

    #[error("Invalid {field} at line {line}: {value} is out of range")]
    OutOfRange {
        line: usize,
        field: &'static str,
        value: f64,
    },

    #[error("Duplicate entry for subject {subject} version {version}")]
    DuplicateKey { subject: String, version: i32 },

    #[error("Subject {subject} version {version} references {reference_subject} version {reference_version}, which does not precede it")]
    DanglingReference {
        subject: String,
        version: i32,
        reference_subject: String,
        reference_version: i32,
    },

    #[error("Subject {subject} version {version} not found in {side}")]
    MissingEntry {
        subject: String,
        version: i32,
        side: Side,
    },

    #[error("Subject {subject} version {version} {field} don't match: {left} vs {right}")]
    Mismatch {
        subject: String,
        version: i32,
        field: &'static str,
        left: String,
        right: String,
    },

    #[error("Subject {subject} version {version} still carries metadata")]
    MetadataPresent { subject: String, version: i32 },

    #[error("Broker error: {0}")]
    Broker(#[from] rdkafka::error::KafkaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Which side of a comparison an entry was expected on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

/// Errors raised by the registry management API
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Registry responded {status}: {message}")]
    Status {
        status: u16,
        code: Option<i64>,
        message: String,
    },

    #[error("Invalid registry URL: {0}")]
    InvalidUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegistryError {
    /// Whether the registry reported the requested entity as absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::Status { status: 404, .. })
    }
}

/// Text that does not name any variant of an enumerated field
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognised {kind} {text:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub text: String,
}

fn join_failures(failures: &[(String, RegistryError)]) -> String {
    failures
        .iter()
        .map(|(subject, err)| {
            if subject.is_empty() {
                format!("global: {}", err)
            } else {
                format!("{}: {}", subject, err)
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}
