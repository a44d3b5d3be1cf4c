//! First-present-wins resolution across ordered candidate sources.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::FieldKey;

/// A single candidate string that could not be turned into a field value.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("could not derive {field} from {raw:?}")]
pub struct ParseFailure {
    pub field: FieldKey,
    pub raw: String,
}

/// Returns the first present candidate. Later candidates are never consulted,
/// merged or averaged.
pub fn first_present<T>(candidates: impl IntoIterator<Item = Option<T>>) -> Option<T> {
    candidates.into_iter().flatten().next()
}

/// Resolves fields from raw candidates while keeping a log of the candidates
/// that failed to parse along the way.
#[derive(Debug, Default)]
pub struct Reconciler {
    failures: Vec<ParseFailure>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse candidates in order; the first one that parses wins. Each
    /// non-blank candidate that fails before that is recorded as a
    /// [`ParseFailure`] and resolution moves on to the next.
    pub fn resolve<'a, T>(
        &mut self,
        field: FieldKey,
        candidates: impl IntoIterator<Item = &'a str>,
        mut parse: impl FnMut(&str) -> Option<T>,
    ) -> Option<T> {
        for raw in candidates {
            if let Some(value) = parse(raw) {
                return Some(value);
            }
            if raw.trim().is_empty() {
                continue;
            }
            let failure = ParseFailure {
                field,
                raw: raw.to_string(),
            };
            if !self.failures.contains(&failure) {
                debug!(%field, raw, "candidate did not parse");
                self.failures.push(failure);
            }
        }
        None
    }

    pub fn failures(&self) -> &[ParseFailure] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<ParseFailure> {
        self.failures
    }
}
