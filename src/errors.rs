use axum::{
    extract::rejection::BytesRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::dispatcher::DispatchError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {message}")]
    BadRequest {
        code: &'static str,
        message: &'static str,
    },
    #[error("payload too large: {message}")]
    PayloadTooLarge {
        code: &'static str,
        message: &'static str,
    },
    #[error("internal error: {message}")]
    Internal { code: &'static str, message: String },
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
}

impl AppError {
    pub fn bad_request(code: &'static str, message: &'static str) -> Self {
        Self::BadRequest { code, message }
    }

    pub fn internal(code: &'static str, message: impl Into<String>) -> Self {
        Self::Internal {
            code,
            message: message.into(),
        }
    }

    /// Maps a body that could not be buffered onto the HTTP taxonomy.
    pub fn from_body_rejection(rejection: BytesRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge {
                code: "body_too_large",
                message: "Request body too large",
            }
        } else {
            Self::bad_request("unreadable_body", "Request body could not be read")
        }
    }

    /// Maps a failed `invoke` call onto the HTTP taxonomy.
    pub fn from_invocation(err: DispatchError) -> Self {
        match err {
            DispatchError::Unsupported => {
                Self::internal("tool_invocation_unsupported", "tool invocation not supported")
            }
            DispatchError::InvocationFailed(message) | DispatchError::ListFailed(message) => {
                Self::internal("tool_invocation_failed", message)
            }
        }
    }

    /// Maps a failed `list` call onto the HTTP taxonomy.
    pub fn from_listing(err: DispatchError) -> Self {
        match err {
            DispatchError::Unsupported => {
                Self::internal("tool_listing_unsupported", "tool listing not supported")
            }
            DispatchError::ListFailed(message) | DispatchError::InvocationFailed(message) => {
                Self::internal("tool_listing_failed", message)
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = match self {
            Self::BadRequest { code, message } | Self::PayloadTooLarge { code, message } => {
                (code, message.to_string())
            }
            Self::Internal { code, message } => (code, message),
        };

        (
            status,
            Json(ErrorResponse {
                code: code.to_string(),
                message,
                details: json!({}),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_maps_to_fixed_messages() {
        let invoke = AppError::from_invocation(DispatchError::Unsupported);
        let list = AppError::from_listing(DispatchError::Unsupported);

        assert_eq!(invoke.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            invoke.to_string(),
            "internal error: tool invocation not supported"
        );
        assert_eq!(list.to_string(), "internal error: tool listing not supported");
    }

    #[test]
    fn failures_keep_their_message() {
        let err = AppError::from_listing(DispatchError::ListFailed("registry offline".to_string()));
        assert!(matches!(
            err,
            AppError::Internal {
                code: "tool_listing_failed",
                ref message
            } if message == "registry offline"
        ));
    }

    #[test]
    fn bad_request_is_client_error() {
        let err = AppError::bad_request("missing_tool_name", "Tool name is required");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
