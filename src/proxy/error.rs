use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Errors surfaced to the client by the backend forwarding path
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Backend API URL is not configured")]
    NotConfigured,

    #[error("Invalid upstream URL: {0}")]
    InvalidTarget(String),

    #[error("Request body too large")]
    BodyTooLarge,

    #[error("Failed to read request body: {0}")]
    Body(String),

    #[error("Upstream request failed")]
    Upstream(#[source] reqwest::Error),

    #[error("Upstream request timed out")]
    UpstreamTimeout(#[source] reqwest::Error),
}

impl From<reqwest::Error> for ProxyError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProxyError::UpstreamTimeout(e)
        } else {
            ProxyError::Upstream(e)
        }
    }
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::NotConfigured | ProxyError::InvalidTarget(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ProxyError::BodyTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::Body(_) => StatusCode::BAD_REQUEST,
            ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ProxyError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ProxyError::Upstream(source) | ProxyError::UpstreamTimeout(source) => {
                tracing::error!("Upstream request failed: {}", source)
            }
            ProxyError::NotConfigured | ProxyError::InvalidTarget(_) => {
                tracing::error!("{}", self)
            }
            _ => tracing::debug!("Rejecting backend request: {}", self),
        }
        error_response(status, self.to_string())
    }
}

pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_not_configured_renders_json_500() {
        let response = ProxyError::NotConfigured.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "Backend API URL is not configured");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(ProxyError::BodyTooLarge.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            ProxyError::Body("eof".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ProxyError::InvalidTarget("x".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
