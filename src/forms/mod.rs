//! HTML form handling
//!
//! Each form keeps the raw submitted strings (so an invalid submission can
//! be re-rendered as typed) and validates them into the input type the
//! matching service expects. Problems are collected per field in
//! [`FormErrors`] instead of stopping at the first one.

mod account;
mod comment;
mod post;

pub use account::{LoginForm, ProfileForm, RegistrationForm, PASSWORD_MIN_LEN};
pub(crate) use account::safe_redirect;
pub use comment::CommentForm;
pub use post::{parse_pub_date, PostForm, UploadedFile, PUB_DATE_FORMAT};

use serde::Serialize;
use std::collections::BTreeMap;

/// A single validation problem
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    /// Field name (None for form-level errors)
    pub field: Option<String>,
    /// Error message
    pub message: String,
}

impl ValidationError {
    /// Create a field-level error
    pub fn field(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: Some(name.into()),
            message: message.into(),
        }
    }

    /// Create a form-level error
    pub fn form(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }
}

/// Validation errors of one submission, grouped the way templates show them
///
/// Serializes as `{ "fields": { "<name>": ["msg", ..] }, "form": ["msg", ..] }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormErrors {
    fields: BTreeMap<String, Vec<String>>,
    form: Vec<String>,
}

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ValidationError) {
        match error.field {
            Some(field) => self.fields.entry(field).or_default().push(error.message),
            None => self.form.push(error.message),
        }
    }

    pub fn add_field(&mut self, field: &str, message: impl Into<String>) {
        self.push(ValidationError::field(field, message));
    }

    pub fn add_form(&mut self, message: impl Into<String>) {
        self.push(ValidationError::form(message));
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.form.is_empty()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Messages for one field
    pub fn field(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    /// Form-level messages
    pub fn form_errors(&self) -> &[String] {
        &self.form
    }

    /// `Ok(value)` when nothing was reported
    pub fn into_result<T>(self, value: T) -> Result<T, FormErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl From<ValidationError> for FormErrors {
    fn from(error: ValidationError) -> Self {
        let mut errors = Self::new();
        errors.push(error);
        errors
    }
}

/// Shared message for missing required fields
pub(crate) const REQUIRED: &str = "This field is required.";

/// Record an error on `field` if `value` is blank; returns the trimmed value
pub(crate) fn required<'a>(errors: &mut FormErrors, field: &str, value: &'a str) -> &'a str {
    let value = value.trim();
    if value.is_empty() {
        errors.add_field(field, REQUIRED);
    }
    value
}

/// Record an error on `field` if `value` is longer than `max` characters
pub(crate) fn max_length(errors: &mut FormErrors, field: &str, value: &str, max: usize) {
    let len = value.chars().count();
    if len > max {
        errors.add_field(
            field,
            format!("Ensure this value has at most {} characters (it has {}).", max, len),
        );
    }
}

/// HTML checkbox semantics: present with any of the usual "on" values
pub(crate) fn checkbox(value: &str) -> bool {
    matches!(value, "on" | "true" | "1" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let field_error = ValidationError::field("email", "Invalid email");
        assert_eq!(field_error.field, Some("email".to_string()));

        let form_error = ValidationError::form("Form expired");
        assert!(form_error.field.is_none());
    }

    #[test]
    fn test_errors_are_grouped_by_field() {
        let mut errors = FormErrors::new();
        assert!(errors.is_empty());

        errors.add_field("title", "too long");
        errors.add_field("title", "rude");
        errors.add_form("try again");

        assert!(errors.has_field("title"));
        assert_eq!(errors.field("title"), ["too long", "rude"]);
        assert!(errors.field("text").is_empty());
        assert_eq!(errors.form_errors(), ["try again"]);

        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["fields"]["title"][1], "rude");
        assert_eq!(json["form"][0], "try again");
    }

    #[test]
    fn test_into_result() {
        assert_eq!(FormErrors::new().into_result(5), Ok(5));

        let errors = FormErrors::from(ValidationError::field("x", "bad"));
        assert!(errors.into_result(5).is_err());
    }

    #[test]
    fn test_helpers() {
        let mut errors = FormErrors::new();
        assert_eq!(required(&mut errors, "a", "  hi "), "hi");
        required(&mut errors, "b", "   ");
        max_length(&mut errors, "c", "четыре", 3);

        assert!(!errors.has_field("a"));
        assert_eq!(errors.field("b"), [REQUIRED]);
        assert!(errors.field("c")[0].contains("at most 3"));

        assert!(checkbox("on"));
        assert!(!checkbox(""));
        assert!(!checkbox("off"));
    }
}
