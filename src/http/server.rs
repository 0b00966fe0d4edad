//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the gateway's own routes (CSP reports,
//!   redirect interstitial) and a fallback that forwards upstream
//! - Wire up middleware (tracing, request ID, timeout, security policies)
//! - Bind server to listener and stop on the shutdown broadcast
//!
//! # Layer order (outermost first)
//! ```text
//! trace → request-id → timeout → forced SSL → cookies
//!       → CSP + security headers → redirect guard → handler
//! ```

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{
        uri::{Authority, PathAndQuery, Scheme},
        Request, StatusCode, Uri,
    },
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::http::middleware::{
    cookie_protection_middleware, forced_ssl_middleware, redirect_guard_middleware,
    security_headers_middleware, ResponseHeaders,
};
use crate::http::request::{request_id, MakeRequestUuid};
use crate::observability::metrics;
use crate::security::csp::report::csp_report_handler;
use crate::security::redirect::interstitial::{interstitial_handler, DEFAULT_INTERSTITIAL_PATH};
use crate::security::{CspHeaders, PolicySet, SecurityError};

/// Application state injected into the forwarding handler.
#[derive(Clone)]
pub struct AppState {
    pub client: Client<HttpConnector, Body>,
    pub upstream: Authority,
}

/// Error building the server from configuration.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid upstream address {0:?}")]
    InvalidUpstream(String),

    #[error(transparent)]
    Security(#[from] SecurityError),
}

/// HTTP server for the security gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    policies: PolicySet,
}

impl HttpServer {
    /// Compile the security policies and build the server.
    pub fn from_config(config: GatewayConfig) -> Result<Self, ServerError> {
        let policies = PolicySet::from_config(&config.security)?;
        Self::new(config, policies)
    }

    /// Create a server from an already compiled policy set.
    pub fn new(config: GatewayConfig, policies: PolicySet) -> Result<Self, ServerError> {
        let upstream = Authority::from_str(&config.upstream.address)
            .map_err(|_| ServerError::InvalidUpstream(config.upstream.address.clone()))?;

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        let state = AppState { client, upstream };

        let router = Self::build_router(&config, &policies, state);
        Ok(Self {
            router,
            config,
            policies,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, policies: &PolicySet, state: AppState) -> Router {
        let mut router: Router<AppState> = Router::new();

        if let Some(path) = policies.csp.as_deref().and_then(|csp| csp.local_report_path()) {
            let path = path.split('?').next().unwrap_or(path);
            router = router.route(path, post(csp_report_handler));
        }

        if let Some(guard) = &policies.redirects {
            if guard.policy().override_target.as_deref() == Some(DEFAULT_INTERSTITIAL_PATH) {
                router = router.route(
                    DEFAULT_INTERSTITIAL_PATH,
                    get(interstitial_handler).with_state(guard.clone()),
                );
            }
        }

        let mut router = router.fallback(forward_handler).with_state(state);

        // Added innermost first.
        if let Some(guard) = &policies.redirects {
            router = router.layer(from_fn_with_state(guard.clone(), redirect_guard_middleware));
        }
        // Wraps the redirect guard so its abort responses carry the headers too.
        let response_headers = ResponseHeaders {
            csp: Arc::new(policies.csp.as_deref().map(CspHeaders::new).unwrap_or_default()),
            headers: policies.headers.clone(),
        };
        if !response_headers.is_empty() {
            router = router.layer(from_fn_with_state(response_headers, security_headers_middleware));
        }
        if let Some(protector) = &policies.cookies {
            router = router.layer(from_fn_with_state(protector.clone(), cookie_protection_middleware));
        }
        if let Some(ssl) = &policies.forced_ssl {
            router = router.layer(from_fn_with_state(ssl.clone(), forced_ssl_middleware));
        }

        router.layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
        )
    }

    /// The router, for embedding or driving with `tower::ServiceExt`.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener until
    /// the shutdown broadcast fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.address,
            policies = ?self.policies.enabled(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Forward the request to the upstream application.
async fn forward_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(&request);
    let method = request.method().to_string();

    let (mut parts, body) = request.into_parts();

    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(state.upstream.clone());
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Cannot build upstream URI");
            metrics::record_request(&method, 400, start_time);
            return (StatusCode::BAD_REQUEST, "Invalid request URI").into_response();
        }
    };

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        uri = %parts.uri,
        "Forwarding request"
    );

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            metrics::record_request(&method, response.status().as_u16(), start_time);
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Upstream error");
            metrics::record_request(&method, 502, start_time);
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}
