use std::collections::BTreeMap;

use axum::{
    extract::rejection::{FormRejection, JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Field name to message, rendered under `messages`.
pub type FieldErrors = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: String,
        errors: FieldErrors,
    },

    #[error("{0}")]
    NotFound(String),

    /// Wrong credential or unverified account.
    #[error("{0}")]
    Auth(String),

    /// Server-side misconfiguration, never the client's fault.
    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Failure of a write that can trip a unique constraint.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated")]
    Duplicate,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if err
            .as_database_error()
            .is_some_and(|db| db.is_unique_violation())
        {
            return StoreError::Duplicate;
        }
        StoreError::Other(err.into())
    }
}

impl StoreError {
    /// Maps a duplicate onto `field` of the submitted form.
    pub fn for_field(self, field: &str) -> ApiError {
        match self {
            StoreError::Duplicate => ApiError::duplicate(field),
            StoreError::Other(e) => ApiError::Internal(e),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    messages: Option<FieldErrors>,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            errors: FieldErrors::new(),
        }
    }

    /// Collects field errors; `Ok(())` when there are none.
    pub fn check_fields(errors: FieldErrors) -> ApiResult<()> {
        if errors.is_empty() {
            return Ok(());
        }
        Err(Self::Validation {
            message: "The submitted data is invalid.".into(),
            errors,
        })
    }

    /// 422 naming `field` as already taken.
    pub fn duplicate(field: &str) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(
            field.to_string(),
            format!("The {field} field must contain a unique value."),
        );
        Self::Validation {
            message: "The submitted data is invalid.".into(),
            errors,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Auth(_) => StatusCode::BAD_REQUEST,
            ApiError::Config(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => "VALIDATION_ERROR",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Auth(_) => "AUTH_FAILED",
            ApiError::Config(_) => "JWT_SECRET_MISSING",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let body = match self {
            ApiError::Validation { message, errors } => ErrorBody {
                error: message,
                code,
                messages: (!errors.is_empty()).then_some(errors),
            },
            ApiError::Internal(e) => {
                error!(error = %e, "internal error");
                ErrorBody {
                    error: "Internal server error".into(),
                    code,
                    messages: None,
                }
            }
            other => ErrorBody {
                error: other.to_string(),
                code,
                messages: None,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(
            ApiError::validation("bad").status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::auth("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::Config("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn check_fields_passes_when_empty() {
        assert!(ApiError::check_fields(FieldErrors::new()).is_ok());

        let mut errors = FieldErrors::new();
        errors.insert("email".into(), "The email field is required.".into());
        let err = ApiError::check_fields(errors).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn duplicates_become_field_errors() {
        match StoreError::Duplicate.for_field("email") {
            ApiError::Validation { errors, .. } => assert_eq!(
                errors["email"],
                "The email field must contain a unique value."
            ),
            other => panic!("unexpected {other:?}"),
        }
        let other = StoreError::Other(anyhow::anyhow!("pool closed")).for_field("email");
        assert_eq!(other.code(), "INTERNAL_ERROR");
    }

    #[test]
    fn only_unique_violations_count_as_duplicates() {
        assert!(matches!(
            StoreError::from(sqlx::Error::RowNotFound),
            StoreError::Other(_)
        ));
    }

    #[tokio::test]
    async fn internal_error_hides_details() {
        let response = ApiError::Internal(anyhow::anyhow!("db exploded")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(!text.contains("db exploded"));
        assert!(text.contains("INTERNAL_ERROR"));
    }
}
