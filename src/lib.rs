//! Schema Registry Migrator
//!
//! Moves the full state of a schema registry (subjects, schema versions,
//! compatibility settings, soft-deletions and cross-schema references)
//! between representations, and checks two representations for equivalence.
//!
//! ## Features
//!
//! - **Live registries**: Reads through the management API, recovering
//!   soft-deleted subjects and versions the default listings hide
//! - **Snapshots**: YAML files mirroring the state model field for field
//! - **Log dumps**: Line-oriented dumps of the registry's internal log topic
//! - **Log replay**: Rebuilds the log topic, bracketed so historical schemas
//!   replay without tripping compatibility enforcement
//! - **Validation**: Structural comparison of two independently read states
//!
//! ## Architecture
//!
//! ```text
//! rest ─┐                            ┌─> file  (snapshot)
//! file ─┼─> State ─> sort/validate ──┼─> debug (stdout)
//! v1file┘                            ├─> topic (log records)
//!                                    └─> compare (second State)
//! ```

pub mod client;
pub mod compare;
pub mod config;
pub mod error;
pub mod log;
pub mod pipeline;
pub mod process;
pub mod reconcile;
pub mod sink;
pub mod snapshot;
pub mod source;
pub mod state;

pub use client::{HttpRegistryClient, RegistryClient};
pub use compare::compare;
pub use config::{Action, MigratorConfig};
pub use error::{MigrateError, RegistryError, Result};
pub use log::{LogReconstructor, LogRecord};
pub use process::Processor;
pub use reconcile::{reconcile, Partition};
pub use sink::Sink;
pub use source::Source;
pub use state::{
    CompatibilityLevel, CompatibilityResult, SchemaMetadata, SchemaReference, SchemaType,
    SoftDeletion, State, SubjectSchema, SubjectVersion,
};
