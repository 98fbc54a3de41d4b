//! Header allow-list for the forwarding path.
//!
//! Outbound: only `content-type` is copied from the inbound request, and
//! `authorization` is set from the resolved session. Inbound: every upstream
//! header is returned except hop-by-hop headers, including any the upstream
//! names in its `Connection` header.

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

/// Headers meaningful only for a single transport leg
pub const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// The complete set of headers sent upstream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForwardHeaders {
    pub content_type: Option<HeaderValue>,
    pub bearer_token: Option<String>,
}

impl ForwardHeaders {
    pub fn from_inbound(inbound: &HeaderMap, bearer_token: Option<&str>) -> Self {
        Self {
            content_type: inbound.get(header::CONTENT_TYPE).cloned(),
            bearer_token: bearer_token.map(str::to_string),
        }
    }

    pub fn to_header_map(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(content_type) = &self.content_type {
            headers.insert(header::CONTENT_TYPE, content_type.clone());
        }
        if let Some(token) = &self.bearer_token {
            match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(header::AUTHORIZATION, value);
                }
                Err(_) => tracing::warn!("Session token is not a valid header value; forwarding without it"),
            }
        }
        headers
    }
}

pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Header names listed as connection options (RFC 9110 section 7.6.1), lowercased
fn connection_tokens(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Copy of `upstream` without hop-by-hop headers
pub fn strip_hop_by_hop(upstream: &HeaderMap) -> HeaderMap {
    let listed = connection_tokens(upstream);
    let mut headers = HeaderMap::with_capacity(upstream.len());
    for (name, value) in upstream {
        if !is_hop_by_hop(name) && !listed.iter().any(|token| token == name.as_str()) {
            headers.append(name.clone(), value.clone());
        }
    }
    headers
}
