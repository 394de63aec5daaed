//! Validation errors
//!
//! Raised before anything is written to the content store or sent to the
//! compute provider.

use thiserror::Error;

/// A rejected definition, component or resource request
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required field is blank
    #[error("{0} is required")]
    MissingField(&'static str),

    /// A field exceeds its maximum length
    #[error("{field} is too long (max {max} characters)")]
    TooLong { field: &'static str, max: usize },

    /// A resource request is outside its allowed range
    #[error("{0}")]
    InvalidResource(String),

    /// Two components share the same path
    #[error("component path '{0}' is already used in this pipeline")]
    DuplicatePath(String),

    /// Any other rejected value
    #[error("{0}")]
    Invalid(String),
}

/// Fails with [`ValidationError::MissingField`] when `value` is blank
pub(crate) fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}

/// Fails with [`ValidationError::TooLong`] when `value` has more than `max` characters
pub(crate) fn max_len(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(())
}
