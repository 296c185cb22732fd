//! Configuration for the migrator
//!
//! Supports loading configuration from:
//! - Config file (migrator.yaml / migrator.toml, or an explicit path)
//! - The XDG config directory
//! - Environment variables (MIGRATOR*)
//!
//! ## Example config file (migrator.yaml):
//! ```yaml
//! action: migrate
//! processors: [strip_metadata]
//! source:
//!   rest:
//!     url: https://registry.internal:8081
//!     username: migrator
//!     password: secret
//!     tls:
//!       ca_cert: /etc/migrator/ca.pem
//! sink:
//!   topic:
//!     seed: broker-1:9092,broker-2:9092
//!     topic: _schemas
//!     compatibility: BACKWARD
//!     sasl:
//!       mechanism: SCRAM-SHA-512
//!       username: migrator
//!       password: secret
//!     tls:
//!       ca_cert: /etc/migrator/ca.pem
//! ```
//!
//! Every source and sink declaration names exactly one kind. Sources are
//! `rest`, `file` (snapshot) and `v1file` (log dump); sinks are `file`,
//! `debug` and `topic`. `validate` reads `source_a` and `source_b` instead.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use config_crate::{Config, Environment, File, FileFormat};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{MigrateError, Result, UnknownVariant};
use crate::process::Processor;
use crate::state::CompatibilityLevel;

/// Main configuration for a migrator run
#[derive(Debug, Clone, Deserialize)]
pub struct MigratorConfig {
    /// Operation mode; may instead come from the command line
    #[serde(default)]
    pub action: Option<Action>,

    /// Source for `migrate`
    #[serde(default)]
    pub source: Option<Declaration>,

    /// Sink for `migrate`
    #[serde(default)]
    pub sink: Option<Declaration>,

    /// First source for `validate`
    #[serde(default)]
    pub source_a: Option<Declaration>,

    /// Second source for `validate`
    #[serde(default)]
    pub source_b: Option<Declaration>,

    /// Processors applied to every state after reading
    #[serde(default)]
    pub processors: Vec<Processor>,
}

/// Top-level operation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Read one source and write it to one sink
    Migrate,
    /// Read two sources and compare them
    Validate,
}

/// A source or sink declaration: a single kind mapped to its parameters
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Declaration(BTreeMap<String, serde_json::Value>);

impl Declaration {
    /// The one declared kind and its raw parameters
    fn single(&self, path: &str) -> Result<(&str, &serde_json::Value)> {
        let mut kinds = self.0.iter();
        match (kinds.next(), kinds.next()) {
            (Some((kind, params)), None) => Ok((kind.as_str(), params)),
            (None, _) => Err(invalid(path, "no kind declared")),
            _ => Err(invalid(
                path,
                format!(
                    "exactly one kind allowed, found {}",
                    self.0.keys().cloned().collect::<Vec<_>>().join(", ")
                ),
            )),
        }
    }
}

/// Live registry source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestSourceConfig {
    /// Base URL of the registry management API
    pub url: String,

    /// Basic auth user
    #[serde(default)]
    pub username: Option<String>,

    /// Basic auth password
    #[serde(default)]
    pub password: Option<String>,

    /// TLS material
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

/// PEM files for TLS connections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// A present block turns TLS on unless this is false
    #[serde(default = "default_tls_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub ca_cert: Option<PathBuf>,
    #[serde(default)]
    pub client_cert: Option<PathBuf>,
    #[serde(default)]
    pub client_key: Option<PathBuf>,
}

/// A file-backed source or sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub filename: PathBuf,
}

/// Log topic sink settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSinkConfig {
    /// Comma-separated broker seed list
    pub seed: String,

    /// Target topic
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Compatibility level restored once every record is replayed
    #[serde(default = "default_compatibility")]
    pub compatibility: CompatibilityLevel,

    /// Seconds to wait for a broker acknowledgement
    #[serde(default = "default_ack_timeout")]
    pub ack_timeout_secs: u64,

    /// Broker authentication
    #[serde(default)]
    pub sasl: Option<SaslConfig>,

    /// Broker TLS material
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

/// SASL credentials for the brokers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaslConfig {
    pub mechanism: String,
    pub username: String,
    pub password: String,
}

/// SASL mechanisms the topic producer can authenticate with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaslMechanism {
    Plain,
    ScramSha256,
    ScramSha512,
}

impl SaslMechanism {
    /// Mechanism name as the broker client expects it
    pub fn as_str(&self) -> &'static str {
        match self {
            SaslMechanism::Plain => "PLAIN",
            SaslMechanism::ScramSha256 => "SCRAM-SHA-256",
            SaslMechanism::ScramSha512 => "SCRAM-SHA-512",
        }
    }
}

impl FromStr for SaslMechanism {
    type Err = UnknownVariant;

    /// Case, dashes and underscores are ignored: `scram_sha_256` is `SCRAM-SHA-256`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let name: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match name.as_str() {
            "plain" => Ok(SaslMechanism::Plain),
            "scramsha256" => Ok(SaslMechanism::ScramSha256),
            "scramsha512" => Ok(SaslMechanism::ScramSha512),
            _ => Err(UnknownVariant {
                kind: "SASL mechanism",
                text: s.to_string(),
            }),
        }
    }
}

impl TopicSinkConfig {
    /// The SASL mechanism to authenticate with, if a `sasl` block is present
    pub fn sasl_mechanism(&self) -> Result<Option<SaslMechanism>> {
        let Some(sasl) = &self.sasl else {
            return Ok(None);
        };
        if sasl.mechanism.is_empty() || sasl.username.is_empty() || sasl.password.is_empty() {
            return Err(invalid(
                "sink.topic.sasl",
                "mechanism, username and password must all be set",
            ));
        }
        sasl.mechanism
            .parse::<SaslMechanism>()
            .map(Some)
            .map_err(|e: UnknownVariant| invalid("sink.topic.sasl.mechanism", e.to_string()))
    }

    /// TLS material, if TLS is switched on
    pub fn tls(&self) -> Option<&TlsConfig> {
        self.tls.as_ref().filter(|tls| tls.enabled)
    }

    pub fn seeds(&self) -> Vec<String> {
        self.seed
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }
}

/// A decoded source declaration
#[derive(Debug, Clone)]
pub enum SourceSpec {
    Rest(RestSourceConfig),
    Snapshot(FileConfig),
    LogDump(FileConfig),
}

/// A decoded sink declaration
#[derive(Debug, Clone)]
pub enum SinkSpec {
    Snapshot(FileConfig),
    Debug,
    Topic(TopicSinkConfig),
}

fn default_topic() -> String {
    "_schemas".to_string()
}

fn default_compatibility() -> CompatibilityLevel {
    CompatibilityLevel::Backward
}

fn default_ack_timeout() -> u64 {
    5
}

fn default_tls_enabled() -> bool {
    true
}

impl MigratorConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, layering a specific file over the defaults
    pub fn load_from(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_locations = ["migrator.yaml", "migrator.toml", "config/migrator.yaml"];
        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("dev", "schema-migrator", "migrator") {
            let xdg_config = config_dir.config_dir().join("migrator.yaml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("MIGRATOR")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Parse configuration from text
    pub fn parse(text: &str, format: FileFormat) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(text, format))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// The action to run: the command line's choice, else the configured one
    pub fn action(&self, requested: Option<Action>) -> Result<Action> {
        requested
            .or(self.action)
            .ok_or_else(|| invalid("action", "no action configured or requested"))
    }

    /// Source and sink for `migrate`
    pub fn migrate_plan(&self) -> Result<(SourceSpec, SinkSpec)> {
        let source = source_spec("source", required(&self.source, "source")?)?;
        let sink = sink_spec("sink", required(&self.sink, "sink")?)?;
        Ok((source, sink))
    }

    /// Both sources for `validate`
    pub fn validate_plan(&self) -> Result<(SourceSpec, SourceSpec)> {
        let source_a = source_spec("source_a", required(&self.source_a, "source_a")?)?;
        let source_b = source_spec("source_b", required(&self.source_b, "source_b")?)?;
        Ok((source_a, source_b))
    }
}

fn required<'a>(declaration: &'a Option<Declaration>, path: &str) -> Result<&'a Declaration> {
    declaration
        .as_ref()
        .ok_or_else(|| invalid(path, "declaration is required for this action"))
}

fn source_spec(path: &str, declaration: &Declaration) -> Result<SourceSpec> {
    let (kind, params) = declaration.single(path)?;
    let path = format!("{}.{}", path, kind);
    match kind {
        "rest" => Ok(SourceSpec::Rest(decode(&path, params)?)),
        "file" => Ok(SourceSpec::Snapshot(decode(&path, params)?)),
        "v1file" => Ok(SourceSpec::LogDump(decode(&path, params)?)),
        _ => Err(invalid(&path, "unknown source kind")),
    }
}

fn sink_spec(path: &str, declaration: &Declaration) -> Result<SinkSpec> {
    let (kind, params) = declaration.single(path)?;
    let path = format!("{}.{}", path, kind);
    match kind {
        "file" => Ok(SinkSpec::Snapshot(decode(&path, params)?)),
        "debug" => Ok(SinkSpec::Debug),
        "topic" => {
            let topic: TopicSinkConfig = decode(&path, params)?;
            topic.sasl_mechanism()?;
            Ok(SinkSpec::Topic(topic))
        }
        _ => Err(invalid(&path, "unknown sink kind")),
    }
}

fn decode<T: DeserializeOwned>(path: &str, params: &serde_json::Value) -> Result<T> {
    serde_json::from_value(params.clone()).map_err(|e| invalid(path, e.to_string()))
}

fn invalid(path: &str, reason: impl Into<String>) -> MigrateError {
    MigrateError::InvalidConfig {
        path: path.to_string(),
        reason: reason.into(),
    }
}
