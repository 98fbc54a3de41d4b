// Auth service client
// Token refresh, PKCE code exchange and sign-out against the auth collaborator

use reqwest::{header, Client, Response};
use serde_json::{json, Value};

use super::cookies::Session;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("auth service rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("auth service request failed: {0}")]
    Request(#[from] reqwest::Error),
}

impl AuthError {
    /// The auth service answered and refused; the stored session is unusable
    pub fn is_rejection(&self) -> bool {
        matches!(self, AuthError::Rejected { .. })
    }
}

pub struct AuthClient {
    http_client: Client,
    base_url: String,
    anon_key: String,
}

impl AuthClient {
    pub fn new(http_client: Client, base_url: &str, anon_key: &str) -> Self {
        Self {
            http_client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            anon_key: anon_key.trim().to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    /// Exchange a refresh token for a new session
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let response = self
            .http_client
            .post(self.endpoint("token"))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.anon_key)
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        Self::session_from(response).await
    }

    /// Exchange an OAuth / magic-link PKCE code for a session
    pub async fn exchange_code(&self, auth_code: &str, code_verifier: &str) -> Result<Session, AuthError> {
        let response = self
            .http_client
            .post(self.endpoint("token"))
            .query(&[("grant_type", "pkce")])
            .header("apikey", &self.anon_key)
            .json(&json!({
                "auth_code": auth_code,
                "code_verifier": code_verifier,
            }))
            .send()
            .await?;

        Self::session_from(response).await
    }

    /// Revoke the session behind `access_token`
    pub async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let response = self
            .http_client
            .post(self.endpoint("logout"))
            .header("apikey", &self.anon_key)
            .header(header::AUTHORIZATION, format!("Bearer {}", access_token))
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::rejection(response).await)
        }
    }

    async fn session_from(response: Response) -> Result<Session, AuthError> {
        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }
        let session: Session = response.json().await?;
        Ok(session.with_expiry_from(chrono::Utc::now().timestamp()))
    }

    async fn rejection(response: Response) -> AuthError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        AuthError::Rejected {
            status,
            message: error_message(&body),
        }
    }
}

/// Pull a human readable message out of an auth service error body
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["error_description", "msg", "message", "error"] {
            if let Some(msg) = value.get(key).and_then(|v| v.as_str()) {
                return msg.to_string();
            }
        }
    }
    if body.is_empty() {
        "empty response".to_string()
    } else {
        body.to_string()
    }
}
