//! Quote domain model.
//!
//! # Responsibility
//! - Define the single entity handled by the selection engine.
//! - Own field-level validation for create and update inputs.
//!
//! # Invariants
//! - `id` is assigned at creation and never changes.
//! - `text_primary` is non-empty after trimming.
//! - `is_today == true` implies `selected_on == Some(day it was chosen for)`.

use crate::clock::DateKey;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for one quote.
pub type QuoteId = Uuid;

/// Canonical quote record as persisted by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub text_primary: String,
    pub text_secondary: String,
    pub annotation: String,
    /// Pin flag for "today's quote".
    pub is_today: bool,
    /// Day this quote was last chosen for. Kept after the daily rollover so
    /// the exclusion window can see it; cleared by admin unpins.
    pub selected_on: Option<DateKey>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
}

impl Quote {
    /// Returns whether this quote is the pin for `day`.
    pub fn is_pinned_for(&self, day: DateKey) -> bool {
        self.is_today && self.selected_on == Some(day)
    }
}

/// Validation errors for quote inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuoteValidationError {
    /// `text_primary` is missing or blank.
    EmptyTextPrimary,
}

impl Display for QuoteValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTextPrimary => write!(f, "text_primary must not be empty"),
        }
    }
}

impl Error for QuoteValidationError {}

/// Create input for admin `create`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewQuote {
    pub text_primary: String,
    pub text_secondary: String,
    pub annotation: String,
    /// Pin the new quote as today's quote right away.
    pub is_today: bool,
}

impl NewQuote {
    pub fn new(text_primary: impl Into<String>) -> Self {
        Self {
            text_primary: text_primary.into(),
            ..Self::default()
        }
    }

    /// Returns a trimmed copy, or an error when `text_primary` is blank.
    pub fn normalized(&self) -> Result<Self, QuoteValidationError> {
        let text_primary = normalize_text_primary(&self.text_primary)?;
        Ok(Self {
            text_primary,
            text_secondary: self.text_secondary.trim().to_string(),
            annotation: self.annotation.trim().to_string(),
            is_today: self.is_today,
        })
    }
}

/// Partial update input for admin `update`.
///
/// `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoteUpdate {
    pub text_primary: Option<String>,
    pub text_secondary: Option<String>,
    pub annotation: Option<String>,
    pub is_today: Option<bool>,
}

impl QuoteUpdate {
    /// Returns a trimmed copy, or an error when a provided `text_primary`
    /// is blank.
    pub fn normalized(&self) -> Result<Self, QuoteValidationError> {
        let text_primary = match self.text_primary.as_deref() {
            Some(value) => Some(normalize_text_primary(value)?),
            None => None,
        };
        Ok(Self {
            text_primary,
            text_secondary: self.text_secondary.as_deref().map(|v| v.trim().to_string()),
            annotation: self.annotation.as_deref().map(|v| v.trim().to_string()),
            is_today: self.is_today,
        })
    }

    /// Returns whether any text field is set.
    pub fn touches_text(&self) -> bool {
        self.text_primary.is_some() || self.text_secondary.is_some() || self.annotation.is_some()
    }
}

fn normalize_text_primary(value: &str) -> Result<String, QuoteValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(QuoteValidationError::EmptyTextPrimary);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::{NewQuote, QuoteUpdate, QuoteValidationError};

    #[test]
    fn new_quote_rejects_blank_primary_text() {
        let err = NewQuote::new("   ").normalized().expect_err("blank must fail");
        assert_eq!(err, QuoteValidationError::EmptyTextPrimary);
    }

    #[test]
    fn new_quote_trims_fields() {
        let mut input = NewQuote::new("  stay curious ");
        input.annotation = " note\n".to_string();
        let normalized = input.normalized().expect("valid input");
        assert_eq!(normalized.text_primary, "stay curious");
        assert_eq!(normalized.annotation, "note");
        assert_eq!(normalized.text_secondary, "");
    }

    #[test]
    fn update_only_validates_provided_primary_text() {
        let update = QuoteUpdate {
            annotation: Some("x".to_string()),
            ..QuoteUpdate::default()
        };
        assert!(update.normalized().is_ok());

        let blank = QuoteUpdate {
            text_primary: Some(String::new()),
            ..QuoteUpdate::default()
        };
        assert_eq!(
            blank.normalized().expect_err("empty primary must fail"),
            QuoteValidationError::EmptyTextPrimary
        );
    }
}
