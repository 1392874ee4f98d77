//! Error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::error::Error;

/// Message shown for every server-side failure.
pub const GENERIC_MESSAGE: &str = "An error occurred processing your request";

/// Wraps a crate error for the HTTP boundary.
///
/// Client errors echo their message; anything else reports only the internal
/// code so provider and backend details stay in the logs.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl ApiError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ApiError(Error::Search(crate::error::SearchError::InvalidInput(
            message.into(),
        )))
    }

    pub fn status(&self) -> StatusCode {
        match self.0 {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            ref e if e.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl<E: Into<Error>> From<E> for ApiError {
    fn from(err: E) -> Self {
        ApiError(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.0.code();
        let message = if status.is_client_error() {
            self.0.to_string()
        } else {
            error!(code, error = %self.0, "Request failed");
            GENERIC_MESSAGE.to_string()
        };
        (
            status,
            Json(json!({
                "success": false,
                "message": message,
                "error": { "code": code },
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProviderError, SearchError};

    #[test]
    fn test_client_errors_are_bad_request() {
        let err = ApiError::invalid("query must not be empty");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.0.code(), "INVALID_INPUT");
    }

    #[test]
    fn test_missing_document_is_not_found() {
        let err: ApiError = Error::NotFound("document d1".into()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.0.code(), "NOT_FOUND");
    }

    #[test]
    fn test_provider_failures_are_internal() {
        let err: ApiError = SearchError::Embedding(ProviderError::Rejected {
            status: 401,
            message: "bad key sk-123".into(),
        })
        .into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.0.code(), "SEARCH_FAILED");
    }
}
