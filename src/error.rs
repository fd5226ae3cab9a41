//! Engine error taxonomy.
//!
//! Validation and storage failures are the only error-shaped outcomes;
//! "insufficient data" is a normal result variant on the analytics side and
//! never appears here.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::store::StorageError;

/// Field name to human-readable message, ordered for stable output.
///
/// A record either passes validation entirely or is rejected with the full
/// map; nothing is partially applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    fields: BTreeMap<String, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.fields.insert(field.to_string(), message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn message_for(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Ok when no field failed, otherwise Err(self).
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.fields {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

/// Errors surfaced by [`crate::manager::DataManager`] operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A submitted record failed field validation; nothing was written.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// Propagated unchanged from the storage boundary.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<ValidationErrors> for EngineError {
    fn from(errors: ValidationErrors) -> Self {
        EngineError::Validation(errors)
    }
}
