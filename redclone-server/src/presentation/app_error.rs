use crate::domain::error::{DomainError, ErrorKind};
use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("not authenticated")]
    Unauthorized,
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(rejection.body_text())
        } else {
            AppError::BadRequest(rejection.body_text())
        }
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

pub(crate) type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Serialize)]
pub(crate) struct ErrorBody {
    kind: &'static str,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<String>,
}

impl ErrorBody {
    fn new(kind: ErrorKind, error: impl Into<String>, field: Option<String>) -> Self {
        Self {
            kind: kind.as_str(),
            error: error.into(),
            field,
        }
    }
}

fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::AlreadyExists { .. } => StatusCode::CONFLICT,
        _ => match err.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
            ErrorKind::TransactionAborted => StatusCode::CONFLICT,
            ErrorKind::ValidationFailed => StatusCode::BAD_REQUEST,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Domain(err) => {
                let status = domain_status(&err);
                let kind = err.kind();
                let message = if kind == ErrorKind::Internal {
                    error!(error = %err, "request failed");
                    "internal error".to_string()
                } else {
                    err.to_string()
                };
                (
                    status,
                    ErrorBody::new(kind, message, err.field().map(str::to_string)),
                )
            }
            AppError::Validation(err) => {
                // report the alphabetically first field so the body is stable
                let field = err
                    .field_errors()
                    .keys()
                    .min()
                    .map(|field| field.to_string());
                (
                    StatusCode::BAD_REQUEST,
                    ErrorBody::new(ErrorKind::ValidationFailed, err.to_string(), field),
                )
            }
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody::new(ErrorKind::ValidationFailed, msg, None),
            ),
            AppError::PayloadTooLarge(msg) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                ErrorBody::new(ErrorKind::ValidationFailed, msg, None),
            ),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                ErrorBody::new(ErrorKind::Unauthenticated, "not authenticated", None),
            ),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use super::{AppError, domain_status};
    use crate::domain::error::DomainError;

    #[test]
    fn domain_errors_map_to_statuses() {
        let cases = [
            (DomainError::post_not_found(1), StatusCode::NOT_FOUND),
            (DomainError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (DomainError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (DomainError::Forbidden, StatusCode::FORBIDDEN),
            (DomainError::TransactionAborted, StatusCode::CONFLICT),
            (
                DomainError::AlreadyExists { field: "title" },
                StatusCode::CONFLICT,
            ),
            (
                DomainError::Validation {
                    field: "token",
                    message: "tokens do not match",
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                DomainError::Unexpected("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(domain_status(&err), status, "{err}");
        }
    }

    #[tokio::test]
    async fn body_carries_kind_and_field() {
        let response =
            AppError::Domain(DomainError::AlreadyExists { field: "username" }).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body must be readable");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("body must be json");
        assert_eq!(body["kind"], "validation_failed");
        assert_eq!(body["field"], "username");
    }

    #[tokio::test]
    async fn oversized_body_keeps_its_status() {
        let response = AppError::PayloadTooLarge("length limit exceeded".into()).into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body must be readable");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("body must be json");
        assert_eq!(body["kind"], "validation_failed");
    }

    #[tokio::test]
    async fn internal_details_are_hidden() {
        let response =
            AppError::Domain(DomainError::Unexpected("password=hunter2".into())).into_response();

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body must be readable");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("body must be json");
        assert_eq!(body["kind"], "internal");
        assert_eq!(body["error"], "internal error");
        assert!(body.get("field").is_none());
    }
}
