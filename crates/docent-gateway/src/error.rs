use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use docent_core::{CoreError, ErrorKind, Failure};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to bind {0}: {1}")]
    Bind(String, std::io::Error),
    #[error("server error: {0}")]
    Server(String),
}

/// HTTP status reported for a failure of `kind`.
#[must_use]
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::CorruptState => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::DependencyFailure => StatusCode::BAD_GATEWAY,
    }
}

/// A [`Failure`] body sent with the status its kind maps to.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    failure: Failure,
}

impl ApiError {
    /// Rejected request input with an explicit status.
    #[must_use]
    pub fn rejected(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            failure: Failure {
                kind: ErrorKind::InvalidInput,
                message: message.into(),
            },
        }
    }

    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::rejected(StatusCode::BAD_REQUEST, message)
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn failure(&self) -> &Failure {
        &self.failure
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        let failure = Failure::from(&e);
        let status = status_for(failure.kind);
        if status.is_server_error() {
            tracing::warn!(kind = %failure.kind, "request failed: {e}");
        }
        Self { status, failure }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::rejected(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.failure)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_statuses() {
        assert_eq!(status_for(ErrorKind::InvalidInput), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(ErrorKind::CorruptState),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(status_for(ErrorKind::DependencyFailure), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn core_errors_keep_kind_and_message() {
        let err = ApiError::from(CoreError::DocumentNotFound("a.txt".into()));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.failure().kind, ErrorKind::NotFound);
        assert_eq!(err.failure().message, "document not found: a.txt");
    }
}
