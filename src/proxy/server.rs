use axum::{
    extract::DefaultBodyLimit,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::proxy::config::GatewayConfig;
use crate::proxy::session::SessionResolver;
use crate::proxy::upstream::UpstreamClient;

/// Axum application state
#[derive(Clone)]
pub struct AppState {
    pub upstream: Arc<UpstreamClient>,
    /// `None` when the auth service is not configured; requests are then forwarded anonymously
    pub session_resolver: Option<Arc<SessionResolver>>,
}

impl AppState {
    pub fn from_config(config: &GatewayConfig) -> Result<Self, String> {
        let upstream = UpstreamClient::new(
            config.upstream_base_url(),
            config.request_timeout,
            Some(config.upstream_proxy.clone()),
        )?;

        if !upstream.is_configured() {
            tracing::warn!("Backend API URL is not configured; /api/backend requests will fail with 500");
        }

        let session_resolver =
            SessionResolver::from_config(&config.auth, upstream.http_client().clone()).map(Arc::new);
        match &session_resolver {
            Some(resolver) => tracing::info!("Session cookie: {}", resolver.cookie_name()),
            None => tracing::warn!("Auth service is not configured; requests are forwarded without a bearer token"),
        }

        Ok(Self {
            upstream: Arc::new(upstream),
            session_resolver,
        })
    }
}

/// Build the gateway router
pub fn build_router(state: AppState, config: &GatewayConfig) -> Router {
    use crate::proxy::handlers;

    let router = Router::new()
        .route(
            "/api/backend/*path",
            get(handlers::backend::handle_get)
                .post(handlers::backend::handle_post)
                .put(handlers::backend::handle_put)
                .patch(handlers::backend::handle_patch)
                .delete(handlers::backend::handle_delete)
                .options(handlers::backend::handle_options),
        )
        .route("/auth/callback", get(handlers::auth::auth_callback))
        .route("/auth/signout", post(handlers::auth::sign_out))
        .route("/auth/session", get(handlers::auth::session_status))
        .route("/healthz", get(health_check_handler))
        .layer(DefaultBodyLimit::max(config.max_body_bytes));

    let router = match crate::proxy::middleware::cors_layer(&config.cors_origins) {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Axum server instance
pub struct GatewayServer {
    shutdown_tx: Option<oneshot::Sender<()>>,
    local_addr: std::net::SocketAddr,
}

impl GatewayServer {
    /// Start the gateway on `host:config.port`
    pub async fn start(
        host: &str,
        config: &GatewayConfig,
    ) -> Result<(Self, tokio::task::JoinHandle<()>), String> {
        let state = AppState::from_config(config)?;
        let app = build_router(state, config);

        // Bind address
        let addr = format!("{}:{}", host, config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| format!("Failed to bind address {}: {}", addr, e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| format!("Failed to read bound address: {}", e))?;

        tracing::info!("Gateway server started at http://{}", local_addr);

        // Create shutdown channel
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        // Start server in a new task
        let handle = tokio::spawn(async move {
            use hyper::server::conn::http1;
            use hyper_util::rt::TokioIo;
            use hyper_util::service::TowerToHyperService;

            loop {
                tokio::select! {
                    res = listener.accept() => {
                        match res {
                            Ok((stream, _)) => {
                                let io = TokioIo::new(stream);
                                let service = TowerToHyperService::new(app.clone());

                                // dropping the connection future on client disconnect also
                                // drops any in-flight upstream request
                                tokio::task::spawn(async move {
                                    if let Err(err) = http1::Builder::new()
                                        .serve_connection(io, service)
                                        .await
                                    {
                                        debug!("Connection handling ended or error: {:?}", err);
                                    }
                                });
                            }
                            Err(e) => {
                                error!("Failed to accept connection: {:?}", e);
                            }
                        }
                    }
                    _ = &mut shutdown_rx => {
                        tracing::info!("Gateway server stopped listening");
                        break;
                    }
                }
            }
        });

        Ok((
            Self {
                shutdown_tx: Some(shutdown_tx),
                local_addr,
            },
            handle,
        ))
    }

    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.local_addr
    }

    /// Stop the server
    pub fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Health check handler
async fn health_check_handler() -> Response {
    Json(serde_json::json!({
        "status": "ok"
    }))
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use tower::ServiceExt;

    fn unconfigured() -> Router {
        let config = GatewayConfig::default();
        build_router(AppState::from_config(&config).unwrap(), &config)
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_healthz() {
        let response = unconfigured()
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_every_verb_fails_with_500_when_unconfigured() {
        for method in [
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ] {
            let request = Request::builder()
                .method(method.clone())
                .uri("/api/backend/v1/tasks?businessId=abc")
                .body(Body::from("{}"))
                .unwrap();
            let response = unconfigured().oneshot(request).await.unwrap();
            assert_eq!(
                response.status(),
                StatusCode::INTERNAL_SERVER_ERROR,
                "method {}",
                method
            );
            let body = json_body(response).await;
            assert!(body["error"].is_string(), "method {}", method);
        }
    }

    #[tokio::test]
    async fn test_session_status_without_auth_service() {
        let response = unconfigured()
            .oneshot(Request::get("/auth/session").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["authenticated"], false);
    }

    #[tokio::test]
    async fn test_callback_without_auth_service_redirects_to_login() {
        let response = unconfigured()
            .oneshot(
                Request::get("/auth/callback?code=abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()["location"],
            "/login?error=auth_callback_failed"
        );
    }

    #[tokio::test]
    async fn test_server_start_and_stop() {
        let config = GatewayConfig {
            port: 0,
            ..Default::default()
        };
        let (server, handle) = GatewayServer::start("127.0.0.1", &config).await.unwrap();
        assert_ne!(server.local_addr().port(), 0);
        server.stop();
        handle.await.unwrap();
    }
}
