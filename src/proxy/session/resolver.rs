use axum_extra::extract::CookieJar;

use super::auth_client::AuthClient;
use super::cookies::{self, CookieAttrs, CookieMutation, Session};
use crate::proxy::config::AuthServiceConfig;

/// Sessions expiring within this many seconds are refreshed before use
const EXPIRY_MARGIN_SECS: i64 = 10;

/// Outcome of resolving the inbound cookie jar
#[derive(Debug, Default)]
pub struct SessionResolution {
    pub session: Option<Session>,
    /// Cookie writes to apply to the outgoing response
    pub mutations: Vec<CookieMutation>,
}

impl SessionResolution {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.session
            .as_ref()
            .map(|s| s.access_token.as_str())
            .filter(|t| !t.is_empty())
    }
}

/// Turns the auth service's session cookie into a bearer token
pub struct SessionResolver {
    client: AuthClient,
    cookie_name: String,
    attrs: CookieAttrs,
}

impl SessionResolver {
    pub fn new(client: AuthClient, cookie_name: impl Into<String>, attrs: CookieAttrs) -> Self {
        Self {
            client,
            cookie_name: cookie_name.into(),
            attrs,
        }
    }

    /// `None` when the auth URL or public key is missing
    pub fn from_config(config: &AuthServiceConfig, http_client: reqwest::Client) -> Option<Self> {
        if !config.is_configured() {
            return None;
        }
        let cookie_name = config.resolved_cookie_name()?;
        let client = AuthClient::new(
            http_client,
            config.url.as_deref().unwrap_or_default(),
            config.anon_key.as_deref().unwrap_or_default(),
        );
        Some(Self::new(
            client,
            cookie_name,
            CookieAttrs {
                secure: config.secure_cookies,
            },
        ))
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn attrs(&self) -> CookieAttrs {
        self.attrs
    }

    pub fn client(&self) -> &AuthClient {
        &self.client
    }

    /// Resolve the current session, refreshing it when it is about to expire.
    /// Never fails: every problem degrades to an anonymous resolution.
    pub async fn resolve(&self, jar: &CookieJar) -> SessionResolution {
        self.resolve_at(jar, chrono::Utc::now().timestamp()).await
    }

    pub(crate) async fn resolve_at(&self, jar: &CookieJar, now: i64) -> SessionResolution {
        let session = match cookies::read_session(jar, &self.cookie_name) {
            Ok(Some(session)) => session,
            Ok(None) => return SessionResolution::anonymous(),
            Err(e) => {
                tracing::warn!("Discarding unreadable session cookie: {}", e);
                return SessionResolution {
                    session: None,
                    mutations: cookies::remove_session(jar, &self.cookie_name),
                };
            }
        };

        if !session.expires_within(now, EXPIRY_MARGIN_SECS) {
            return SessionResolution {
                session: Some(session),
                mutations: Vec::new(),
            };
        }

        let Some(refresh_token) = session.refresh_token.as_deref().filter(|t| !t.is_empty()) else {
            tracing::debug!("Session expired without a refresh token");
            return SessionResolution {
                session: None,
                mutations: cookies::remove_session(jar, &self.cookie_name),
            };
        };

        match self.client.refresh_session(refresh_token).await {
            Ok(refreshed) => match cookies::write_session(jar, &self.cookie_name, &refreshed) {
                Ok(mutations) => {
                    tracing::debug!("Session refreshed, expires_at={:?}", refreshed.expires_at);
                    SessionResolution {
                        session: Some(refreshed),
                        mutations,
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to encode refreshed session: {}", e);
                    SessionResolution {
                        session: Some(refreshed),
                        mutations: Vec::new(),
                    }
                }
            },
            Err(e) if e.is_rejection() => {
                tracing::info!("Session refresh rejected, clearing cookie: {}", e);
                SessionResolution {
                    session: None,
                    mutations: cookies::remove_session(jar, &self.cookie_name),
                }
            }
            Err(e) => {
                tracing::warn!("Session refresh failed, forwarding anonymously: {}", e);
                SessionResolution::anonymous()
            }
        }
    }
}
