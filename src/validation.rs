//! Field-level input checks collected into a single 422 response.

use crate::auth::credentials::is_valid_email;
use crate::error::{ApiError, ApiResult, FieldErrors};

#[derive(Debug, Default)]
pub struct Rules {
    errors: FieldErrors,
}

impl Rules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value when present and not blank. First error per field wins.
    pub fn required<'a>(&mut self, field: &str, value: &'a Option<String>) -> Option<&'a str> {
        match value.as_deref() {
            Some(v) if !v.trim().is_empty() => Some(v),
            _ => {
                self.fail(field, format!("The {field} field is required."));
                None
            }
        }
    }

    pub fn email(&mut self, field: &str, value: &str) -> bool {
        let ok = is_valid_email(value);
        if !ok {
            self.fail(field, format!("The {field} field must contain a valid email address."));
        }
        ok
    }

    pub fn min_len(&mut self, field: &str, value: &str, min: usize) {
        if value.chars().count() < min {
            self.fail(
                field,
                format!("The {field} field must be at least {min} characters in length."),
            );
        }
    }

    pub fn max_len(&mut self, field: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.fail(
                field,
                format!("The {field} field cannot exceed {max} characters in length."),
            );
        }
    }

    pub fn fail(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    pub fn has_error(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    pub fn finish(self) -> ApiResult<()> {
        ApiError::check_fields(self.errors)
    }
}
