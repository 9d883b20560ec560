use std::collections::BTreeMap;
use std::fmt;

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde::Serialize;
use serde_json::json;
use validator::ValidationErrors;

use crate::data_client::{DataClientError, DataClientErrorKind};

/// Field name -> message, one entry per offending field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a message for `field`; the first message per field wins.
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    /// Keeps the first message reported for each of `fields`.
    pub fn from_validator(errors: &ValidationErrors, fields: &[&'static str]) -> Self {
        let by_field = errors.field_errors();
        let mut out = Self::new();
        for &field in fields {
            if let Some(first) = by_field.get(field).and_then(|errs| errs.first()) {
                let message = match &first.message {
                    Some(message) => message.to_string(),
                    None => first.code.to_string(),
                };
                out.add(field, message);
            }
        }
        out
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Ok(value)` when nothing was recorded, otherwise a validation error.
    pub fn into_result<T>(self, value: T) -> Result<T, AppError> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect();
        f.write_str(&parts.join(", "))
    }
}

/// Which uniqueness rule a duplicate hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DuplicateKind {
    #[display(fmt = "Employee ID or email already exists")]
    Employee,
    #[display(fmt = "Attendance already marked for this date")]
    Attendance,
}

#[derive(Debug, Clone, PartialEq, Display)]
pub enum AppError {
    #[display(fmt = "Validation failed: {}", _0)]
    Validation(FieldErrors),

    #[display(fmt = "{}", _0)]
    Duplicate(DuplicateKind),

    #[display(fmt = "Data access failed: {}", _0)]
    DataAccess(String),
}

impl std::error::Error for AppError {}

impl AppError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(field, message);
        Self::Validation(errors)
    }

    /// Reclassifies a store error. Uniqueness violations become
    /// `Duplicate(on_duplicate)`, everything else is a data access failure.
    pub fn from_store(err: DataClientError, on_duplicate: DuplicateKind) -> Self {
        match err.kind {
            DataClientErrorKind::UniqueViolation => Self::Duplicate(on_duplicate),
            _ => Self::DataAccess(err.to_string()),
        }
    }
}

impl From<DataClientError> for AppError {
    fn from(err: DataClientError) -> Self {
        Self::DataAccess(err.to_string())
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Duplicate(_) => StatusCode::CONFLICT,
            AppError::DataAccess(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AppError::Validation(errors) => json!({
                "message": "Validation failed",
                "errors": errors,
            }),
            AppError::Duplicate(kind) => json!({ "message": kind.to_string() }),
            AppError::DataAccess(detail) => {
                tracing::error!(error = %detail, "Request failed on data access");
                json!({ "message": "Something went wrong, Contact with system admin" })
            }
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}
