// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use hyper::StatusCode;
use thiserror::Error;

/// Request-level error taxonomy. Every handler failure maps onto one of
/// these variants, which in turn decide the HTTP status code and the
/// `{"error": message}` body.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    /// A workflow whose admin toggle is currently off.
    #[error("{0}")]
    FeatureDisabled(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::FeatureDisabled(_) => StatusCode::FORBIDDEN,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Database(diesel::result::Error::NotFound) => StatusCode::NOT_FOUND,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// User-readable message. Database failures are sanitized here; the full
    /// error is still logged by the router before the response goes out.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Database(diesel::result::Error::NotFound) => "Record not found".to_string(),
            ApiError::Database(diesel::result::Error::DatabaseError(kind, _)) => match kind {
                diesel::result::DatabaseErrorKind::UniqueViolation => {
                    "A record with the same unique value already exists".to_string()
                }
                diesel::result::DatabaseErrorKind::ForeignKeyViolation => {
                    "The record is still referenced by related data".to_string()
                }
                _ => "Unexpected database error".to_string(),
            },
            ApiError::Database(_) => "Unexpected database error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<diesel_async::pooled_connection::bb8::RunError> for ApiError {
    fn from(err: diesel_async::pooled_connection::bb8::RunError) -> Self {
        ApiError::Internal(format!("failed to get database connection: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::Validation("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::FeatureDisabled("closed".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::Unauthorized("no".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Database(diesel::result::Error::NotFound).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_database_errors_are_sanitized() {
        let err = ApiError::Database(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            Box::new("duplicate key value violates unique constraint \"members_email_key\"".to_string()),
        ));
        assert_eq!(
            err.public_message(),
            "A record with the same unique value already exists"
        );
        assert!(!err.public_message().contains("members_email_key"));
    }
}
