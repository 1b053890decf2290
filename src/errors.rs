use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt;

use crate::analysis::AnalysisError;

#[derive(Debug)]
pub(crate) enum AppError {
    Validation(String),
    InsufficientInput(String),
    TooManyIncidents(String),
    Database(String),
    Internal(String),
}

impl AppError {
    /// Stable identifier the frontend maps to localized text.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION",
            Self::InsufficientInput(_) => "INSUFFICIENT_INPUT",
            Self::TooManyIncidents(_) => "TOO_MANY_INCIDENTS",
            Self::Database(_) => "DATABASE",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "validation error: {msg}"),
            Self::InsufficientInput(msg) => write!(f, "insufficient input: {msg}"),
            Self::TooManyIncidents(msg) => write!(f, "too many incidents: {msg}"),
            Self::Database(msg) => write!(f, "database error: {msg}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InsufficientInput(_) | Self::TooManyIncidents(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = match self {
            Self::Validation(msg) | Self::InsufficientInput(msg) | Self::TooManyIncidents(msg) => {
                msg.as_str()
            }
            Self::Database(msg) => {
                log::error!("Database error: {msg}");
                "database connection error"
            }
            Self::Internal(msg) => {
                log::error!("Internal error: {msg}");
                "internal server error"
            }
        };
        HttpResponse::build(status).json(ErrorBody {
            code: status.as_u16(),
            error: ErrorDetail {
                kind: self.kind(),
                message,
            },
        })
    }
}

impl From<AnalysisError> for AppError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::InsufficientInput { .. } => Self::InsufficientInput(err.to_string()),
            AnalysisError::TooManyIncidents { .. } => Self::TooManyIncidents(err.to_string()),
        }
    }
}

impl From<tokio_postgres::Error> for AppError {
    fn from(err: tokio_postgres::Error) -> Self {
        let msg = if let Some(db_err) = err.as_db_error() {
            format!(
                "{}: {} (code: {})",
                db_err.severity(),
                db_err.message(),
                db_err.code().code()
            )
        } else {
            err.to_string()
        };
        Self::Database(msg)
    }
}

impl From<deadpool_postgres::PoolError> for AppError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: u16,
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    kind: &'static str,
    message: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn insufficient_input_is_a_client_error() {
        let err = AppError::from(AnalysisError::InsufficientInput { resolvable: 1 });
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let body = to_bytes(err.error_response().into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], 400);
        assert_eq!(json["error"]["kind"], "INSUFFICIENT_INPUT");
    }

    #[actix_web::test]
    async fn database_detail_is_not_leaked() {
        let err = AppError::Database("password authentication failed for user guardian".into());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(err.error_response().into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["kind"], "DATABASE");
        assert_eq!(json["error"]["message"], "database connection error");
    }

    #[test]
    fn too_many_maps_to_its_own_kind() {
        let err = AppError::from(AnalysisError::TooManyIncidents { requested: 500, max: 200 });
        assert_eq!(err.kind(), "TOO_MANY_INCIDENTS");
        assert!(err.to_string().contains("500"));
    }
}
