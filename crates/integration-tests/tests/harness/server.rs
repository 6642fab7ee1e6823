//! SonicForge running in-process on an ephemeral port

use sonicforge_config::Config;
use sonicforge_server::Server;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Relay under test; stops serving when dropped
pub struct TestServer {
    base_url: String,
    client: reqwest::Client,
    _stop: tokio_util::sync::DropGuard,
}

impl TestServer {
    /// Build the relay from `config` and serve it on `127.0.0.1:0`
    ///
    /// The configured listen address is ignored.
    pub async fn start(config: Config) -> anyhow::Result<Self> {
        let router = Server::new(&config)?.into_router();

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}", listener.local_addr()?);

        let stop = CancellationToken::new();
        let stopped = stop.clone().cancelled_owned();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).with_graceful_shutdown(stopped).await;
        });

        Ok(Self {
            base_url,
            client: reqwest::Client::new(),
            _stop: stop.drop_guard(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// `POST /generate` with a JSON body
    pub async fn generate(&self, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url("/generate"))
            .json(body)
            .send()
            .await
            .expect("relay reachable")
    }
}
