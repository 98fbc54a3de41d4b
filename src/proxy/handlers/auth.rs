//! Session lifecycle endpoints.
//!
//! `/auth/callback` finishes OAuth and magic-link sign-in by exchanging the
//! PKCE code, `/auth/signout` clears the session, `/auth/session` reports who
//! the cookie belongs to.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::proxy::server::AppState;
use crate::proxy::session::cookies::{self, CookieMutation};

const CALLBACK_FAILED_REDIRECT: &str = "/login?error=auth_callback_failed";

#[derive(Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    next: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Serialize)]
pub struct SessionStatusResponse {
    pub authenticated: bool,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub expires_at: Option<i64>,
}

/// Only same-origin relative paths are honored as post-login destinations
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => path,
        _ => "/",
    }
}

/// Exchange the auth code for a session and store it in the session cookie
pub async fn auth_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let Some(resolver) = &state.session_resolver else {
        tracing::error!("Auth callback hit but the auth service is not configured");
        return Redirect::to(CALLBACK_FAILED_REDIRECT).into_response();
    };

    if let Some(error) = query.error.as_deref() {
        tracing::warn!(
            "Auth provider returned error: {} ({})",
            error,
            query.error_description.as_deref().unwrap_or("no description")
        );
        return Redirect::to(CALLBACK_FAILED_REDIRECT).into_response();
    }

    let Some(code) = query.code.as_deref().filter(|c| !c.is_empty()) else {
        tracing::warn!("Auth callback without code");
        return Redirect::to(CALLBACK_FAILED_REDIRECT).into_response();
    };

    let cookie_name = resolver.cookie_name();
    let Some(verifier) = cookies::read_code_verifier(&jar, cookie_name) else {
        tracing::warn!("Auth callback without PKCE code verifier cookie");
        return Redirect::to(CALLBACK_FAILED_REDIRECT).into_response();
    };

    let session = match resolver.client().exchange_code(code, &verifier).await {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!("Auth code exchange failed: {}", e);
            return Redirect::to(CALLBACK_FAILED_REDIRECT).into_response();
        }
    };

    let mut mutations = match cookies::write_session(&jar, cookie_name, &session) {
        Ok(mutations) => mutations,
        Err(e) => {
            tracing::error!("Failed to encode session cookie: {}", e);
            return Redirect::to(CALLBACK_FAILED_REDIRECT).into_response();
        }
    };
    mutations.push(CookieMutation::Remove {
        name: cookies::code_verifier_cookie_name(cookie_name),
    });

    tracing::info!(
        "Signed in user {}",
        session.user_id().unwrap_or("<unknown>")
    );

    let mut response = Redirect::to(safe_next(query.next.as_deref())).into_response();
    cookies::apply_mutations(response.headers_mut(), &mutations, resolver.attrs());
    response
}

/// Revoke the session at the auth service (best effort) and clear the cookie
pub async fn sign_out(State(state): State<AppState>, jar: CookieJar) -> Response {
    let Some(resolver) = &state.session_resolver else {
        return Json(json!({ "success": true })).into_response();
    };

    let resolution = resolver.resolve(&jar).await;
    if let Some(token) = resolution.access_token() {
        if let Err(e) = resolver.client().sign_out(token).await {
            tracing::warn!("Auth service sign-out failed, clearing cookie anyway: {}", e);
        }
    }

    let mutations = cookies::remove_session(&jar, resolver.cookie_name());
    let mut response = Json(json!({ "success": true })).into_response();
    cookies::apply_mutations(response.headers_mut(), &mutations, resolver.attrs());
    response
}

/// Summary of the current session, refreshing it when needed
pub async fn session_status(State(state): State<AppState>, jar: CookieJar) -> Response {
    let Some(resolver) = &state.session_resolver else {
        return Json(SessionStatusResponse {
            authenticated: false,
            user_id: None,
            email: None,
            expires_at: None,
        })
        .into_response();
    };

    let resolution = resolver.resolve(&jar).await;
    let session = resolution.session.as_ref();
    let body = SessionStatusResponse {
        authenticated: resolution.access_token().is_some(),
        user_id: session.and_then(|s| s.user_id()).map(str::to_string),
        email: session.and_then(|s| s.email()).map(str::to_string),
        expires_at: session.and_then(|s| s.expires_at),
    };

    let mut response = Json(body).into_response();
    cookies::apply_mutations(response.headers_mut(), &resolution.mutations, resolver.attrs());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(Some("/dashboard/tasks?tab=open")), "/dashboard/tasks?tab=open");
        assert_eq!(safe_next(Some("//evil.example.com")), "/");
        assert_eq!(safe_next(Some("https://evil.example.com")), "/");
        assert_eq!(safe_next(Some("/\\evil.example.com")), "/");
        assert_eq!(safe_next(None), "/");
    }
}
