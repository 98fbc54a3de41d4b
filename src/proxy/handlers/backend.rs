// Backend Handler
// `/api/backend/*path`: resolve the session, forward, hand the upstream response back
use axum::{
    body::Bytes,
    extract::{FromRequest, Request, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;

use crate::proxy::error::ProxyError;
use crate::proxy::server::AppState;
use crate::proxy::session::{cookies, SessionResolution};
use crate::proxy::upstream::{target, ForwardHeaders, InboundRequest};

pub async fn handle_get(State(state): State<AppState>, request: Request) -> Response {
    forward_backend(state, request).await
}

pub async fn handle_post(State(state): State<AppState>, request: Request) -> Response {
    forward_backend(state, request).await
}

pub async fn handle_put(State(state): State<AppState>, request: Request) -> Response {
    forward_backend(state, request).await
}

pub async fn handle_patch(State(state): State<AppState>, request: Request) -> Response {
    forward_backend(state, request).await
}

pub async fn handle_delete(State(state): State<AppState>, request: Request) -> Response {
    forward_backend(state, request).await
}

pub async fn handle_options(State(state): State<AppState>, request: Request) -> Response {
    forward_backend(state, request).await
}

/// Shared by every verb; the inbound method is forwarded as-is
async fn forward_backend(state: AppState, request: Request) -> Response {
    if !state.upstream.is_configured() {
        return ProxyError::NotConfigured.into_response();
    }

    let method = request.method().clone();
    let uri = request.uri().clone();
    let path = target::path_remainder(uri.path()).unwrap_or_default().to_string();
    tracing::debug!("Received backend request: {} /{}", method, path);

    let jar = CookieJar::from_headers(request.headers());
    let resolution = match &state.session_resolver {
        Some(resolver) => resolver.resolve(&jar).await,
        None => SessionResolution::anonymous(),
    };
    let headers = ForwardHeaders::from_inbound(request.headers(), resolution.access_token());

    let body = if matches!(method, Method::GET | Method::HEAD) {
        Bytes::new()
    } else {
        match Bytes::from_request(request, &state).await {
            Ok(body) => body,
            Err(rejection) => {
                let err = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    ProxyError::BodyTooLarge
                } else {
                    ProxyError::Body(rejection.body_text())
                };
                return with_session_cookies(err.into_response(), &state, &resolution);
            }
        }
    };

    let inbound = InboundRequest {
        method,
        path,
        query: uri.query().map(str::to_string),
        headers,
        body,
    };

    let response = match state.upstream.forward(inbound).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    };
    with_session_cookies(response, &state, &resolution)
}

fn with_session_cookies(mut response: Response, state: &AppState, resolution: &SessionResolution) -> Response {
    if let Some(resolver) = &state.session_resolver {
        cookies::apply_mutations(response.headers_mut(), &resolution.mutations, resolver.attrs());
    }
    response
}
