//! API error type and the JSON response envelopes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::error;

use adsight_core::error::ErrorCode;

/// Success envelope: `{"success": true, "data": ...}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Failure envelope: `{"success": false, "code": "...", "message": "..."}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub code: String,
    pub message: String,
}

/// Errors returned before a chat stream opens.
#[derive(Debug)]
pub enum ApiError {
    /// 400 - the request failed validation. The text is shown to the caller.
    InvalidInput(String),
    /// 401 - no usable Authorization header.
    Unauthorized,
    /// 401 - the bearer token is not known.
    InvalidToken,
    /// 500 - logged, never shown to the caller.
    Internal(String),
}

impl ApiError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ApiError::InvalidInput(_) => ErrorCode::InvalidInput,
            ApiError::Unauthorized => ErrorCode::Unauthorized,
            ApiError::InvalidToken => ErrorCode::InvalidToken,
            ApiError::Internal(_) => ErrorCode::InternalServerError,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.code();
        let message = match self {
            ApiError::InvalidInput(msg) => msg,
            ApiError::Internal(detail) => {
                error!(error = %detail, "Internal API error");
                code.message().to_string()
            }
            ApiError::Unauthorized | ApiError::InvalidToken => code.message().to_string(),
        };

        let status =
            StatusCode::from_u16(code.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            success: false,
            code: code.as_str().to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<adsight_core::error::AdsightError> for ApiError {
    fn from(err: adsight_core::error::AdsightError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_input_envelope() {
        let resp = ApiError::InvalidInput("message must not be blank".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "INVALID_INPUT");
        assert_eq!(body["message"], "message must not be blank");
    }

    #[tokio::test]
    async fn test_internal_error_hides_detail() {
        let resp = ApiError::Internal("sqlite: database is locked".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(resp).await;
        assert_eq!(body["code"], "INTERNAL_SERVER_ERROR");
        assert_eq!(body["message"], ErrorCode::InternalServerError.message());
    }

    #[tokio::test]
    async fn test_auth_errors_are_401() {
        assert_eq!(
            ApiError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        let resp = ApiError::InvalidToken.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(resp).await["code"], "INVALID_TOKEN");
    }
}
