//! Shared utilities for integration tests.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::{
    extract::Query,
    http::{
        header::{COOKIE, LOCATION, SET_COOKIE},
        HeaderMap, StatusCode,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use http_guard::{GatewayConfig, HttpServer, Shutdown};
use tokio::net::TcpListener;

/// Start a mock upstream application on an ephemeral port.
///
/// - `/set-cookies` sets `session`, `prefs` and `plain`
/// - `/echo-cookies` answers with the `Cookie` header it received
/// - `/redirect?to=<url>` answers `302` with the given `Location`
/// - anything else answers `200 upstream ok`
pub async fn start_upstream() -> SocketAddr {
    let app = Router::new()
        .route("/set-cookies", get(set_cookies))
        .route("/echo-cookies", get(echo_cookies))
        .route("/redirect", get(redirect))
        .fallback(|| async { "upstream ok" });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn set_cookies() -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    headers.append(SET_COOKIE, "session=alice; Path=/; HttpOnly".parse().unwrap());
    headers.append(SET_COOKIE, "prefs=dark; Path=/".parse().unwrap());
    headers.append(SET_COOKIE, "plain=1".parse().unwrap());
    (headers, "cookies set")
}

async fn echo_cookies(headers: HeaderMap) -> String {
    headers
        .get(COOKIE)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .unwrap_or_default()
}

async fn redirect(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    let to = params.get("to").cloned().unwrap_or_else(|| "/".into());
    (StatusCode::FOUND, [(LOCATION, to)])
}

/// A port nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// A running gateway in front of `upstream`.
pub struct Gateway {
    pub base: String,
    pub addr: SocketAddr,
    shutdown: Shutdown,
}

impl Gateway {
    pub async fn start(upstream: SocketAddr, mut config: GatewayConfig) -> Self {
        config.upstream.address = upstream.to_string();
        let server = HttpServer::from_config(config).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();
        let rx = shutdown.subscribe();
        tokio::spawn(async move {
            let _ = server.run(listener, rx).await;
        });

        Self {
            base: format!("http://{}", addr),
            addr,
            shutdown,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Client that never follows redirects.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
