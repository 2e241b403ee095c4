//! Normalized discount code text.
//!
//! Codes are case-insensitive; they are stored and compared upper-case.
//!
//! # Validation Rules (creation)
//!
//! - 3-32 characters after trimming
//! - `A-Z`, `0-9`, `_` and `-` only (after upper-casing)

use serde::{Deserialize, Serialize};

use crate::domain::foundation::ValidationError;

const MIN_LEN: usize = 3;
const MAX_LEN: usize = 32;

/// Upper-cased, trimmed discount code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedCode(String);

impl NormalizedCode {
    /// Normalizes user input for lookup.
    ///
    /// Only rejects blank input; whatever the customer typed is looked up
    /// as-is so an unknown code reports "not found" rather than a format error.
    pub fn for_lookup(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::empty_field("code"));
        }
        Ok(Self(trimmed.to_uppercase()))
    }

    /// Validates a code chosen by an admin.
    pub fn try_new(raw: &str) -> Result<Self, ValidationError> {
        let code = Self::for_lookup(raw)?;
        let len = code.0.chars().count();

        if !(MIN_LEN..=MAX_LEN).contains(&len) {
            return Err(ValidationError::out_of_range(
                "code_length",
                MIN_LEN as i64,
                MAX_LEN as i64,
                len as i64,
            ));
        }

        if !code
            .0
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' || c == '-')
        {
            return Err(ValidationError::invalid_format(
                "code",
                "letters, digits, '_' and '-' only",
            ));
        }

        Ok(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against stored text.
    pub fn matches(&self, stored: &str) -> bool {
        stored.trim().eq_ignore_ascii_case(&self.0)
    }
}

impl std::fmt::Display for NormalizedCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
