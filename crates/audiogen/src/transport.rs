use std::time::Duration;

use http::header;
use reqwest::{Client, RequestBuilder, multipart};
use thiserror::Error;
use url::Url;

use crate::provider::{OutboundRequest, ProviderResponse, RequestBody};

/// Failure before a complete provider reply was received
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no complete response within {}s", .0.as_secs_f32())]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connection(String),
}

/// Executes outbound provider calls with a per-attempt deadline
///
/// The deadline covers sending the request and reading the whole body, so
/// a provider that stalls mid-stream still frees the slot for the next
/// credential.
#[derive(Clone)]
pub struct Transport {
    client: Client,
    attempt_timeout: Duration,
}

impl Transport {
    pub const fn new(client: Client, attempt_timeout: Duration) -> Self {
        Self {
            client,
            attempt_timeout,
        }
    }

    pub async fn send(&self, request: OutboundRequest) -> Result<ProviderResponse, TransportError> {
        let OutboundRequest {
            method,
            url,
            headers,
            body,
        } = request;

        let builder = self.client.request(method, url).headers(headers);

        let builder = match body {
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Form(fields) => {
                let form = fields
                    .into_iter()
                    .fold(multipart::Form::new(), |form, (name, value)| form.text(name, value));
                builder.multipart(form)
            }
        };

        self.execute(builder).await
    }

    /// Unauthenticated GET of a provider result URL
    pub async fn fetch(&self, url: &Url) -> Result<ProviderResponse, TransportError> {
        let builder = self.client.get(url.clone()).header(header::ACCEPT, "audio/*");
        self.execute(builder).await
    }

    async fn execute(&self, builder: RequestBuilder) -> Result<ProviderResponse, TransportError> {
        let exchange = async {
            let response = builder.send().await?;
            let status = response.status();
            let content_type = response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned);
            let body = response.bytes().await?;

            Ok::<_, reqwest::Error>(ProviderResponse {
                status,
                content_type,
                body: body.to_vec(),
            })
        };

        match tokio::time::timeout(self.attempt_timeout, exchange).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(TransportError::Connection(e.to_string())),
            Err(_) => Err(TransportError::Timeout(self.attempt_timeout)),
        }
    }
}
