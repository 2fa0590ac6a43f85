use std::collections::BTreeMap;

use serde_json::{json, Value};
use thiserror::Error;
use warp::{http::StatusCode, reject::Reject};

/// Field name -> messages, the shape validation errors are reported in.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation failed")]
    Validation(FieldErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn field(field: &str, message: &str) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.to_string()]);
        Self::Validation(errors)
    }

    pub fn bad_request(message: &str) -> Self {
        Self::BadRequest(message.to_string())
    }

    pub fn not_found(message: &str) -> Self {
        Self::NotFound(message.to_string())
    }

    pub fn forbidden() -> Self {
        Self::Forbidden(String::from(
            "You do not have permission to perform this action.",
        ))
    }

    pub fn unauthenticated() -> Self {
        Self::Unauthorized(String::from(
            "Authentication credentials were not provided.",
        ))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> Value {
        match self {
            ApiError::Validation(errors) => json!(errors),
            ApiError::BadRequest(info) => json!({ "errors": info }),
            ApiError::Unauthorized(info)
            | ApiError::Forbidden(info)
            | ApiError::NotFound(info) => json!({ "detail": info }),
            ApiError::Internal(_) => json!({ "detail": "Internal server error" }),
        }
    }
}

impl Reject for ApiError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Unique,
    ForeignKey,
    Check,
}

/// A storage failure, with the violated constraint class when there is one.
#[derive(Debug)]
pub struct QueryError {
    info: String,
    constraint: Option<ConstraintKind>,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self {
            info,
            constraint: None,
        }
    }

    pub fn constraint(&self) -> Option<ConstraintKind> {
        self.constraint
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Database(e) => {
                let constraint = match e.code().as_deref() {
                    Some("23505") => Some(ConstraintKind::Unique),
                    Some("23503") => Some(ConstraintKind::ForeignKey),
                    Some("23514") => Some(ConstraintKind::Check),
                    _ => None,
                };
                Self {
                    info: format!("{e}"),
                    constraint,
                }
            }
            sqlx::Error::Configuration(e) => Self::new(format!("{e}")),
            sqlx::Error::Io(e) => Self::new(format!("{e}")),
            sqlx::Error::Tls(e) => Self::new(format!("{e}")),
            sqlx::Error::Protocol(e) => Self::new(e),
            sqlx::Error::RowNotFound => Self::new(String::from("Row not found")),
            sqlx::Error::TypeNotFound { type_name } => {
                Self::new(format!("Type not found: {type_name}"))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
                Self::new(format!("Column index out of bounds {index} ({len})"))
            }
            sqlx::Error::ColumnNotFound(e) => Self::new(e),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::Decode(e) => Self::new(format!("{e}")),
            sqlx::Error::PoolTimedOut => Self::new(String::from("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(String::from("Pool closed")),
            sqlx::Error::WorkerCrashed => Self::new(String::from("Worker crashed")),
            sqlx::Error::Migrate(e) => Self::new(format!("{e}")),
            e => Self::new(format!("{e}")),
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(value: QueryError) -> Self {
        match value.constraint {
            Some(ConstraintKind::Unique) => ApiError::bad_request("Object already exists"),
            Some(ConstraintKind::ForeignKey) => {
                ApiError::bad_request("Object is referenced by other objects")
            }
            Some(ConstraintKind::Check) => ApiError::bad_request("Constraint violated"),
            None => ApiError::Internal(value.info),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable {0} is required")]
    Missing(String),

    #[error("Invalid value for {key}: {info}")]
    Invalid { key: String, info: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_keyed_by_field() {
        let error = ApiError::field("cooking_time", "Ensure this value is at least 1.");

        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            error.body(),
            json!({ "cooking_time": ["Ensure this value is at least 1."] })
        );
    }

    #[test]
    fn internal_errors_hide_details() {
        let error: ApiError = QueryError::new(String::from("connection refused")).into();

        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.body(), json!({ "detail": "Internal server error" }));
    }

    #[test]
    fn row_not_found_is_not_a_constraint() {
        let error = QueryError::from(sqlx::Error::RowNotFound);
        assert_eq!(error.constraint(), None);
    }

    #[test]
    fn statuses() {
        assert_eq!(ApiError::forbidden().status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::unauthenticated().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::not_found("Not found.").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::bad_request("Already added").body(),
            json!({ "errors": "Already added" })
        );
    }
}
