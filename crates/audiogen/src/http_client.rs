use std::{sync::OnceLock, time::Duration};

use axum::http;
use reqwest::Client;

const USER_AGENT: &str = concat!("sonicforge/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client so every provider reuses one connection pool
///
/// No overall timeout is set here; each attempt is bounded by the
/// configured `attempt_timeout` instead.
pub fn http_client() -> Client {
    static CLIENT: OnceLock<Client> = OnceLock::new();

    CLIENT
        .get_or_init(|| {
            let mut headers = http::HeaderMap::new();
            headers.insert(http::header::CONNECTION, http::HeaderValue::from_static("keep-alive"));

            Client::builder()
                .user_agent(USER_AGENT)
                .connect_timeout(Duration::from_secs(10))
                // result downloads usually follow the generation call within seconds
                .pool_idle_timeout(Some(Duration::from_secs(30)))
                .tcp_nodelay(true)
                .tcp_keepalive(Some(Duration::from_secs(60)))
                .default_headers(headers)
                .build()
                .expect("static HTTP client configuration is valid")
        })
        .clone()
}
