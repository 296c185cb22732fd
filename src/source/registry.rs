//! Registry reader
//!
//! Reconstructs a [`State`] from a live registry, recovering soft-deleted
//! subjects and versions that the default listing calls hide.

use tracing::{debug, info, warn};

use crate::client::RegistryClient;
use crate::error::{MigrateError, RegistryError, Result};
use crate::reconcile::{reconcile, Partition};
use crate::source::Source;
use crate::state::{CompatibilityResult, State, SubjectSchema, SubjectVersion};

/// Attempts made to fetch a single subject version before giving up
pub const MAX_FETCH_ATTEMPTS: usize = 10;

/// Source backed by a live registry
pub struct RegistrySource<C> {
    client: C,
}

impl<C: RegistryClient> RegistrySource<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Live and soft-deleted subjects
    fn subjects(&self) -> Result<Partition<String>> {
        let all = self.client.subjects(true)?;
        let visible = visible_or_empty(self.client.subjects(false))?;
        Ok(reconcile(all, visible))
    }

    /// Live and soft-deleted versions of one subject
    fn versions(&self, subject: &str) -> Result<Partition<i32>> {
        let all = visible_or_empty(self.client.versions(subject, true))?;
        let visible = visible_or_empty(self.client.versions(subject, false))?;
        Ok(reconcile(all, visible))
    }

    /// Fetch one subject version, retrying transient failures
    fn fetch(&self, subject: &str, version: i32) -> Result<SubjectSchema> {
        let mut attempt = 1;
        loop {
            match self.client.schema(subject, version) {
                Ok(subject_schema) => return Ok(subject_schema),
                Err(err) if attempt >= MAX_FETCH_ATTEMPTS => {
                    return Err(MigrateError::FetchExhausted {
                        subject: subject.to_string(),
                        version,
                        attempts: attempt,
                        source: err,
                    });
                }
                Err(err) => {
                    warn!(subject, version, attempt, error = %err, "schema fetch failed, retrying");
                    attempt += 1;
                }
            }
        }
    }

    /// Global and per-subject compatibility overrides. Absent overrides are
    /// skipped; any other failure fails the whole lookup.
    fn compatibility(&self, subjects: &[String]) -> Result<Vec<CompatibilityResult>> {
        let mut results = Vec::new();
        let mut failures = Vec::new();

        for lookup in self.client.compatibility(subjects) {
            match lookup.result {
                Ok(result) => results.push(result),
                Err(err) if err.is_not_found() => {
                    debug!(subject = %lookup.subject, "no compatibility override");
                }
                Err(err) => failures.push((lookup.subject, err)),
            }
        }

        if failures.is_empty() {
            Ok(results)
        } else {
            Err(MigrateError::Compatibility(failures))
        }
    }
}

impl<C: RegistryClient> Source for RegistrySource<C> {
    fn get_state(&self) -> Result<State> {
        let subjects = self.subjects()?;
        info!(
            live = subjects.live.len(),
            deleted = subjects.deleted.len(),
            "discovered subjects"
        );

        let mut state = State::default();
        for (subject, subject_deleted) in subjects.iter() {
            let versions = self.versions(subject)?;
            debug!(
                subject = %subject,
                live = versions.live.len(),
                deleted = versions.deleted.len(),
                "discovered versions"
            );

            for (&version, version_deleted) in versions.iter() {
                let subject_schema = self.fetch(subject, version)?;
                if subject_deleted || version_deleted {
                    state
                        .soft_deletions
                        .push(SubjectVersion::new(subject_schema.subject.clone(), subject_schema.version));
                }
                state.subject_schemas.push(subject_schema);
            }
        }

        let mut lookups = vec![String::new()];
        lookups.extend(subjects.live.iter().cloned());
        state.compatibility_results = self.compatibility(&lookups)?;

        info!(
            schemas = state.subject_schemas.len(),
            soft_deletions = state.soft_deletions.len(),
            compatibility = state.compatibility_results.len(),
            "read registry state"
        );
        Ok(state)
    }
}

/// A listing the registry answers with 404 has no members
fn visible_or_empty<T>(listing: std::result::Result<Vec<T>, RegistryError>) -> Result<Vec<T>> {
    match listing {
        Ok(items) => Ok(items),
        Err(err) if err.is_not_found() => Ok(Vec::new()),
        Err(err) => Err(err.into()),
    }
}
