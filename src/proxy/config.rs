use serde::{Deserialize, Serialize};

/// Gateway service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Allow LAN access
    /// - false: loopback only 127.0.0.1 (default)
    /// - true: listen on 0.0.0.0
    #[serde(default)]
    pub allow_lan_access: bool,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Base URL of the upstream business API. Requests to `/api/backend/*`
    /// fail with 500 while this is unset.
    #[serde(default)]
    pub upstream_base_url: Option<String>,

    /// Auth collaborator used to resolve session cookies
    #[serde(default)]
    pub auth: AuthServiceConfig,

    /// Upstream request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Largest inbound body accepted for forwarding (bytes)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Origins allowed by the CORS layer. Empty disables CORS headers.
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Outbound proxy configuration
    #[serde(default)]
    pub upstream_proxy: UpstreamProxyConfig,
}

/// Auth collaborator settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthServiceConfig {
    /// Auth service base URL, e.g. `https://abcd.supabase.co`
    #[serde(default)]
    pub url: Option<String>,
    /// Public (anon) API key sent as `apikey`
    #[serde(default)]
    pub anon_key: Option<String>,
    /// Session cookie name. Derived from the auth host when unset.
    #[serde(default)]
    pub cookie_name: Option<String>,
    /// Mark written cookies `Secure`
    #[serde(default)]
    pub secure_cookies: bool,
}

/// Outbound proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpstreamProxyConfig {
    /// Enabled
    pub enabled: bool,
    /// Proxy URL (http://, https://, socks5://)
    pub url: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            allow_lan_access: false,
            port: default_port(),
            upstream_base_url: None,
            auth: AuthServiceConfig::default(),
            request_timeout: default_request_timeout(),
            max_body_bytes: default_max_body_bytes(),
            cors_origins: Vec::new(),
            upstream_proxy: UpstreamProxyConfig::default(),
        }
    }
}

fn default_port() -> u16 {
    8046
}

fn default_request_timeout() -> u64 {
    120
}

fn default_max_body_bytes() -> usize {
    100 * 1024 * 1024
}

impl GatewayConfig {
    /// Effective listen address
    pub fn get_bind_address(&self) -> &str {
        if self.allow_lan_access {
            "0.0.0.0"
        } else {
            "127.0.0.1"
        }
    }

    /// Upstream base URL, treating blank values as unset
    pub fn upstream_base_url(&self) -> Option<&str> {
        non_blank(self.upstream_base_url.as_deref())
    }
}

impl AuthServiceConfig {
    /// Both the auth URL and the public key are present
    pub fn is_configured(&self) -> bool {
        non_blank(self.url.as_deref()).is_some() && non_blank(self.anon_key.as_deref()).is_some()
    }

    /// Session cookie name: explicit override, else `sb-<project-ref>-auth-token`
    /// where the project ref is the first label of the auth host.
    pub fn resolved_cookie_name(&self) -> Option<String> {
        if let Some(name) = non_blank(self.cookie_name.as_deref()) {
            return Some(name.to_string());
        }
        let url = url::Url::parse(non_blank(self.url.as_deref())?).ok()?;
        let host = url.host_str()?;
        let project_ref = host.split('.').next().filter(|s| !s.is_empty())?;
        Some(format!("sb-{}-auth-token", project_ref))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_name_from_auth_host() {
        let auth = AuthServiceConfig {
            url: Some("https://abcdefgh.supabase.co".to_string()),
            anon_key: Some("anon".to_string()),
            ..Default::default()
        };
        assert_eq!(
            auth.resolved_cookie_name().as_deref(),
            Some("sb-abcdefgh-auth-token")
        );

        let local = AuthServiceConfig {
            url: Some("http://127.0.0.1:54321".to_string()),
            ..Default::default()
        };
        assert_eq!(local.resolved_cookie_name().as_deref(), Some("sb-127-auth-token"));
    }

    #[test]
    fn test_cookie_name_override() {
        let auth = AuthServiceConfig {
            url: Some("https://abcdefgh.supabase.co".to_string()),
            cookie_name: Some("session".to_string()),
            ..Default::default()
        };
        assert_eq!(auth.resolved_cookie_name().as_deref(), Some("session"));
    }

    #[test]
    fn test_blank_values_count_as_unset() {
        let config = GatewayConfig {
            upstream_base_url: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(config.upstream_base_url().is_none());

        let auth = AuthServiceConfig {
            url: Some("https://x.supabase.co".to_string()),
            anon_key: Some(String::new()),
            ..Default::default()
        };
        assert!(!auth.is_configured());
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: GatewayConfig =
            serde_json::from_str(r#"{"upstream_base_url":"https://api.example.com"}"#).unwrap();
        assert_eq!(config.upstream_base_url(), Some("https://api.example.com"));
        assert_eq!(config.port, 8046);
        assert_eq!(config.request_timeout, 120);
        assert_eq!(config.get_bind_address(), "127.0.0.1");
    }
}
