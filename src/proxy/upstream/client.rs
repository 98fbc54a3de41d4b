// Upstream client implementation
// Forwards one inbound request to the configured backend API

use axum::body::Body;
use axum::http::Method;
use axum::response::Response;
use bytes::Bytes;
use reqwest::{redirect, Client};
use tokio::time::Duration;

use super::headers::{self, ForwardHeaders};
use super::target;
use crate::proxy::config::UpstreamProxyConfig;
use crate::proxy::error::ProxyError;

const MAX_REDIRECTS: usize = 10;

/// Everything the forwarder needs from the inbound request
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    /// Path after `/api/backend/`
    pub path: String,
    pub query: Option<String>,
    pub headers: ForwardHeaders,
    pub body: Bytes,
}

impl InboundRequest {
    /// GET and HEAD never carry a body upstream
    pub fn forwards_body(&self) -> bool {
        !matches!(self.method, Method::GET | Method::HEAD)
    }
}

pub struct UpstreamClient {
    http_client: Client,
    base_url: Option<String>,
}

impl UpstreamClient {
    pub fn new(
        base_url: Option<&str>,
        request_timeout: u64,
        proxy_config: Option<UpstreamProxyConfig>,
    ) -> Result<Self, String> {
        let mut builder = Client::builder()
            // Connection settings (optimize connection reuse, reduce overhead)
            .connect_timeout(Duration::from_secs(20))
            .pool_max_idle_per_host(16)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(Duration::from_secs(request_timeout.max(1)))
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(concat!("backend-gateway/", env!("CARGO_PKG_VERSION")));

        match proxy_config {
            Some(config) if config.enabled && !config.url.is_empty() => {
                let proxy = reqwest::Proxy::all(&config.url)
                    .map_err(|e| format!("Invalid upstream proxy {}: {}", config.url, e))?;
                builder = builder.proxy(proxy);
                tracing::info!("UpstreamClient enabled proxy: {}", config.url);
            }
            _ => builder = builder.no_proxy(),
        }

        let http_client = builder
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            http_client,
            base_url: base_url
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(str::to_string),
        })
    }

    /// Shared connection pool, reused by the auth client
    pub fn http_client(&self) -> &Client {
        &self.http_client
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    /// Forward `request` and stream the upstream response back.
    ///
    /// Status code and body pass through untouched; hop-by-hop headers are
    /// dropped. A missing base URL fails before any network call.
    pub async fn forward(&self, request: InboundRequest) -> Result<Response, ProxyError> {
        let base_url = self.base_url.as_deref().ok_or(ProxyError::NotConfigured)?;
        let url = target::build_target_url(base_url, &request.path, request.query.as_deref());
        let url = reqwest::Url::parse(&url)
            .map_err(|e| ProxyError::InvalidTarget(format!("{}: {}", url, e)))?;

        tracing::debug!("Forwarding {} {}", request.method, url);

        let mut builder = self
            .http_client
            .request(request.method.clone(), url)
            .headers(request.headers.to_header_map());
        if request.forwards_body() {
            builder = builder.body(request.body);
        }

        let upstream = builder.send().await?;
        let status = upstream.status();
        let response_headers = headers::strip_hop_by_hop(upstream.headers());

        tracing::debug!("Upstream responded {} for {}", status, request.method);

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = response_headers;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: Method) -> InboundRequest {
        InboundRequest {
            method,
            path: "v1/tasks".to_string(),
            query: None,
            headers: ForwardHeaders::default(),
            body: Bytes::from_static(b"ignored"),
        }
    }

    #[test]
    fn test_forwards_body() {
        assert!(!request(Method::GET).forwards_body());
        assert!(!request(Method::HEAD).forwards_body());
        for method in [Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS] {
            assert!(request(method).forwards_body());
        }
    }

    #[tokio::test]
    async fn test_missing_base_url_fails_without_network() {
        let client = UpstreamClient::new(None, 5, None).unwrap();
        assert!(!client.is_configured());
        let err = client.forward(request(Method::GET)).await.unwrap_err();
        assert!(matches!(err, ProxyError::NotConfigured));

        let blank = UpstreamClient::new(Some("  "), 5, None).unwrap();
        assert!(!blank.is_configured());
    }

    #[tokio::test]
    async fn test_invalid_base_url() {
        let client = UpstreamClient::new(Some("not a url"), 5, None).unwrap();
        let err = client.forward(request(Method::GET)).await.unwrap_err();
        assert!(matches!(err, ProxyError::InvalidTarget(_)));
    }
}
