//! Attribute validators.
//!
//! Validators are declared on the entity schema and evaluated before every
//! create and update. All validators run and their violations accumulate in
//! one [`ValidationError`]; a failing validator never hides the others.
//!
//! Uniqueness needs a database round trip, so it is reported here as
//! deferred and checked by the record layer.

use crate::error::{ValidationError, ValidationErrorKind};
use crate::value::Value;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// Signature of a custom validator: returns the message suffix on failure
/// (e.g. `"must be even"`), which is prefixed with the attribute label.
pub type CustomCheck = Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>;

/// A validation rule for one attribute.
#[derive(Clone)]
pub enum Validator {
    /// The value must not be blank.
    Presence,
    /// No other row may hold the same value (within the `scope` columns).
    Uniqueness { scope: Vec<String> },
    /// Text length bounds, in characters. Blank values are skipped.
    Length {
        min: Option<usize>,
        max: Option<usize>,
    },
    /// Text must match `pattern`. Blank values are skipped.
    Format { pattern: Regex },
    /// Arbitrary check.
    Custom(CustomCheck),
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validator::Presence => write!(f, "Presence"),
            Validator::Uniqueness { scope } => {
                f.debug_struct("Uniqueness").field("scope", scope).finish()
            }
            Validator::Length { min, max } => f
                .debug_struct("Length")
                .field("min", min)
                .field("max", max)
                .finish(),
            Validator::Format { pattern } => f
                .debug_struct("Format")
                .field("pattern", &pattern.as_str())
                .finish(),
            Validator::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// What a synchronous check concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckResult {
    /// Checked, violations (if any) were recorded.
    Done,
    /// Needs a database lookup; see [`Validator::Uniqueness`].
    NeedsDatabase,
}

/// A validator bound to an attribute.
#[derive(Debug, Clone)]
pub struct AttributeValidator {
    pub attribute: String,
    pub validator: Validator,
}

impl AttributeValidator {
    /// Run the synchronous part of the check, appending violations to
    /// `errors`. `label` is the human attribute name (`"Name"`).
    pub fn check(&self, label: &str, value: &Value, errors: &mut ValidationError) -> CheckResult {
        match &self.validator {
            Validator::Presence => {
                if value.is_blank() {
                    errors.add(
                        &self.attribute,
                        ValidationErrorKind::Blank,
                        format!("{} can't be blank", label),
                    );
                }
            }
            Validator::Uniqueness { .. } => return CheckResult::NeedsDatabase,
            Validator::Length { min, max } => {
                if let Some(text) = value.as_str().filter(|_| !value.is_blank()) {
                    let len = text.chars().count();
                    if let Some(min) = min.filter(|min| len < *min) {
                        errors.add(
                            &self.attribute,
                            ValidationErrorKind::TooShort,
                            format!(
                                "{} is too short (minimum is {} characters)",
                                label, min
                            ),
                        );
                    }
                    if let Some(max) = max.filter(|max| len > *max) {
                        errors.add(
                            &self.attribute,
                            ValidationErrorKind::TooLong,
                            format!("{} is too long (maximum is {} characters)", label, max),
                        );
                    }
                }
            }
            Validator::Format { pattern } => {
                if !value.is_blank() {
                    let matches = value.as_str().is_some_and(|text| pattern.is_match(text));
                    if !matches {
                        errors.add(
                            &self.attribute,
                            ValidationErrorKind::Invalid,
                            format!("{} is invalid", label),
                        );
                    }
                }
            }
            Validator::Custom(check) => {
                if let Some(message) = check(value) {
                    errors.add(
                        &self.attribute,
                        ValidationErrorKind::Custom,
                        format!("{} {}", label, message),
                    );
                }
            }
        }
        CheckResult::Done
    }

    /// Record a uniqueness violation found by the database lookup.
    pub fn add_taken(&self, label: &str, errors: &mut ValidationError) {
        errors.add(
            &self.attribute,
            ValidationErrorKind::Taken,
            format!("{} has already been taken", label),
        );
    }
}
