//! Session cookie codec.
//!
//! The auth service stores the whole session JSON in a cookie named
//! `sb-<project-ref>-auth-token`. Values are raw JSON or `base64-` + base64url
//! JSON, and values longer than [`MAX_CHUNK_SIZE`] are split across
//! `<name>.0`, `<name>.1`, ... cookies.

use axum::http::{header, HeaderMap, HeaderValue};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const MAX_CHUNK_SIZE: usize = 3180;
const BASE64_PREFIX: &str = "base64-";
const CODE_VERIFIER_SUFFIX: &str = "-code-verifier";
/// 400 days, the browser cap for persistent cookies
const COOKIE_MAX_AGE_DAYS: i64 = 400;

#[derive(Debug, thiserror::Error)]
pub enum CookieError {
    #[error("session cookie is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("session cookie is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("session cookie is not a valid session: {0}")]
    Json(#[from] serde_json::Error),
}

/// Session object as issued by the auth service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    /// Unix seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,
    /// Fields this gateway does not interpret (provider tokens etc.), kept on rewrite
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    /// True when the access token is expired or expires within `margin` seconds.
    /// Sessions without expiry information never count as expiring.
    pub fn expires_within(&self, now: i64, margin: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at.saturating_sub(now) <= margin,
            None => false,
        }
    }

    /// Fill `expires_at` from `expires_in` when the auth service omitted it
    pub fn with_expiry_from(mut self, now: i64) -> Self {
        if self.expires_at.is_none() {
            self.expires_at = self.expires_in.map(|secs| now.saturating_add(secs));
        }
        self
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref()?.get("id")?.as_str()
    }

    pub fn email(&self) -> Option<&str> {
        self.user.as_ref()?.get("email")?.as_str()
    }
}

/// Attributes applied to every cookie this gateway writes
#[derive(Debug, Clone, Copy, Default)]
pub struct CookieAttrs {
    pub secure: bool,
}

/// One outgoing cookie write
#[derive(Debug, Clone, PartialEq)]
pub enum CookieMutation {
    Set { name: String, value: String },
    Remove { name: String },
}

impl CookieMutation {
    pub fn name(&self) -> &str {
        match self {
            CookieMutation::Set { name, .. } | CookieMutation::Remove { name } => name,
        }
    }

    pub fn to_cookie(&self, attrs: CookieAttrs) -> Cookie<'static> {
        match self {
            CookieMutation::Set { name, value } => Cookie::build((name.clone(), value.clone()))
                .path("/")
                .same_site(SameSite::Lax)
                .secure(attrs.secure)
                .max_age(time::Duration::days(COOKIE_MAX_AGE_DAYS))
                .build(),
            CookieMutation::Remove { name } => Cookie::build((name.clone(), ""))
                .path("/")
                .same_site(SameSite::Lax)
                .secure(attrs.secure)
                .max_age(time::Duration::ZERO)
                .build(),
        }
    }
}

/// Append each mutation as a `Set-Cookie` header
pub fn apply_mutations(headers: &mut HeaderMap, mutations: &[CookieMutation], attrs: CookieAttrs) {
    for mutation in mutations {
        let cookie = mutation.to_cookie(attrs);
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            Err(e) => {
                tracing::warn!("Dropping unencodable cookie {}: {}", mutation.name(), e);
            }
        }
    }
}

fn chunk_name(name: &str, index: usize) -> String {
    format!("{}.{}", name, index)
}

/// Raw cookie value, reassembling chunks when the plain cookie is absent
fn read_raw(jar: &CookieJar, name: &str) -> Option<String> {
    if let Some(cookie) = jar.get(name) {
        return Some(cookie.value().to_string());
    }

    let mut combined = String::new();
    let mut index = 0;
    while let Some(chunk) = jar.get(&chunk_name(name, index)) {
        combined.push_str(chunk.value());
        index += 1;
    }

    if index == 0 {
        None
    } else {
        Some(combined)
    }
}

fn decode_value(raw: &str) -> Result<String, CookieError> {
    match raw.strip_prefix(BASE64_PREFIX) {
        Some(encoded) => {
            let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
                .decode(encoded.trim_end_matches('='))?;
            Ok(String::from_utf8(bytes)?)
        }
        None => Ok(raw.to_string()),
    }
}

fn encode_value(json: &str) -> String {
    format!(
        "{}{}",
        BASE64_PREFIX,
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(json.as_bytes())
    )
}

/// Read the session stored under `name`. A missing cookie is `Ok(None)`.
pub fn read_session(jar: &CookieJar, name: &str) -> Result<Option<Session>, CookieError> {
    let Some(raw) = read_raw(jar, name) else {
        return Ok(None);
    };
    let json = decode_value(&raw)?;
    Ok(Some(serde_json::from_str(&json)?))
}

/// Names of every cookie in the jar that belongs to `name`
fn existing_names(jar: &CookieJar, name: &str) -> Vec<String> {
    let chunk_prefix = format!("{}.", name);
    jar.iter()
        .map(|c| c.name())
        .filter(|n| {
            *n == name
                || n.strip_prefix(&chunk_prefix)
                    .is_some_and(|idx| !idx.is_empty() && idx.chars().all(|c| c.is_ascii_digit()))
        })
        .map(str::to_string)
        .collect()
}

/// Mutations that store `session` under `name`, clearing stale chunks in `jar`
pub fn write_session(
    jar: &CookieJar,
    name: &str,
    session: &Session,
) -> Result<Vec<CookieMutation>, CookieError> {
    let value = encode_value(&serde_json::to_string(session)?);

    let mut written = Vec::new();
    let mut mutations = Vec::new();
    if value.len() <= MAX_CHUNK_SIZE {
        written.push(name.to_string());
        mutations.push(CookieMutation::Set {
            name: name.to_string(),
            value,
        });
    } else {
        // base64 output is ASCII so byte offsets are char boundaries
        for (index, start) in (0..value.len()).step_by(MAX_CHUNK_SIZE).enumerate() {
            let end = (start + MAX_CHUNK_SIZE).min(value.len());
            let chunk = chunk_name(name, index);
            written.push(chunk.clone());
            mutations.push(CookieMutation::Set {
                name: chunk,
                value: value[start..end].to_string(),
            });
        }
    }

    for stale in existing_names(jar, name) {
        if !written.contains(&stale) {
            mutations.push(CookieMutation::Remove { name: stale });
        }
    }

    Ok(mutations)
}

/// Mutations that remove the session cookie and all of its chunks from `jar`
pub fn remove_session(jar: &CookieJar, name: &str) -> Vec<CookieMutation> {
    existing_names(jar, name)
        .into_iter()
        .map(|name| CookieMutation::Remove { name })
        .collect()
}

pub fn code_verifier_cookie_name(name: &str) -> String {
    format!("{}{}", name, CODE_VERIFIER_SUFFIX)
}

/// PKCE verifier written by the browser client before starting a sign-in flow
pub fn read_code_verifier(jar: &CookieJar, name: &str) -> Option<String> {
    let raw = read_raw(jar, &code_verifier_cookie_name(name))?;
    let decoded = decode_value(&raw).ok()?;
    // the browser client stores the verifier JSON-encoded
    let verifier = match serde_json::from_str::<Value>(&decoded) {
        Ok(Value::String(verifier)) => verifier,
        _ => decoded,
    };
    Some(verifier).filter(|v| !v.is_empty())
}
