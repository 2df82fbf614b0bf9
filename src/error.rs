use std::collections::BTreeMap;

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

use crate::repository::RepoError;

/// FieldErrors
///
/// Field name to list of human-readable messages. Serialized as a flat JSON
/// object, e.g. `{"name": ["This field is required."]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// Ok when nothing was recorded.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl From<ValidationErrors> for FieldErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut out = FieldErrors::new();
        for (field, failures) in errors.field_errors() {
            for failure in failures {
                let message = failure
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value ({}).", failure.code));
                out.add(field.to_string(), message);
            }
        }
        out
    }
}

/// AppError
///
/// Every failure a request can end in. Each variant maps to exactly one status
/// code and body shape; internal causes are logged and never returned.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0:?}")]
    Validation(FieldErrors),

    #[error("registration rejected: {0:?}")]
    Registration(FieldErrors),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Authentication credentials were not provided.")]
    NotAuthenticated,

    #[error("Invalid token in cookie")]
    InvalidToken,

    #[error("You do not have permission to perform this action.")]
    Forbidden,

    #[error("Not found.")]
    NotFound,

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Registration(_) => StatusCode::CONFLICT,
            AppError::InvalidCredentials | AppError::NotAuthenticated | AppError::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation(FieldErrors::single(field, message))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::Validation(errors) => json!(errors),
            AppError::Registration(errors) => json!({ "error": errors }),
            AppError::InvalidCredentials => json!({ "error": "Invalid credentials" }),
            AppError::Internal(cause) => {
                tracing::error!(%cause, "request failed");
                json!({ "detail": "Internal server error" })
            }
            other => json!({ "detail": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Duplicate { entity, field } => {
                AppError::field(field, format!("{entity} with this {field} already exists."))
            }
            RepoError::MissingReference { field } => {
                AppError::field(field, "Invalid pk - object does not exist.")
            }
            RepoError::Database(e) => AppError::Internal(format!("database: {e}")),
        }
    }
}

impl From<FieldErrors> for AppError {
    fn from(errors: FieldErrors) -> Self {
        AppError::Validation(errors)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::field("non_field_errors", rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::field("non_field_errors", rejection.body_text())
    }
}

/// AppJson
///
/// `Json` extractor whose rejection is an [`AppError`], so malformed bodies come
/// back in the same field-error shape as every other validation failure.
#[derive(Debug, axum::extract::FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// AppQuery
///
/// `Query` extractor with an [`AppError`] rejection.
#[derive(Debug, axum::extract::FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

pub type AppResult<T> = Result<T, AppError>;
