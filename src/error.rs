//! HTTP-facing error taxonomy.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::{auth::AuthError, content::ContentError, uploads::AssetError};

/// Error body shared by every failing API route.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{message}")]
    RateLimited {
        message: String,
        retry_after: Duration,
    },

    /// Storage or network failure. The string is logged, never returned.
    #[error("{0}")]
    Backend(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let retry_after = match &self {
            AppError::RateLimited { retry_after, .. } => Some(retry_after.as_secs().max(1)),
            _ => None,
        };
        let message = match self {
            AppError::Backend(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        let mut response = (
            status,
            Json(ErrorResponse {
                success: false,
                message,
            }),
        )
            .into_response();

        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

impl From<ContentError> for AppError {
    fn from(err: ContentError) -> Self {
        match err {
            ContentError::UnknownSection(_) => AppError::NotFound("Section not found".to_string()),
            ContentError::NotFound(_) => AppError::NotFound("Content not found".to_string()),
            ContentError::InvalidPayload => {
                AppError::Validation("Invalid payload. Expected a JSON object.".to_string())
            }
            ContentError::Backend(msg) => AppError::Backend(msg),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials => {
                AppError::Validation("Username and password are required".to_string())
            }
            AuthError::InvalidCredentials => AppError::Unauthorized("Invalid credentials"),
            AuthError::RateLimited { retry_after } => AppError::RateLimited {
                message: "Too many login attempts. Please try again later.".to_string(),
                retry_after,
            },
            AuthError::Store(msg) => AppError::Backend(msg),
        }
    }
}

impl From<AssetError> for AppError {
    fn from(err: AssetError) -> Self {
        match err {
            AssetError::InvalidFile(msg) => AppError::Validation(msg),
            AssetError::InvalidReference => AppError::Validation("Invalid file reference".to_string()),
            AssetError::NotFound => AppError::NotFound("File not found".to_string()),
            AssetError::Backend(msg) => AppError::Backend(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_message_is_hidden() {
        let response = AppError::Backend("connection refused at 10.0.0.3".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = AppError::RateLimited {
            message: "slow down".into(),
            retry_after: Duration::from_secs(90),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "90");
    }

    #[test]
    fn test_content_errors_map_to_http() {
        assert_eq!(
            AppError::from(ContentError::UnknownSection("blog".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(ContentError::InvalidPayload).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
