//! Text-to-audio generation: provider dispatch with credential failover
//! and transcoding of the returned audio

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod credentials;
mod dispatcher;
mod error;
mod http_client;
mod metrics;
pub mod provider;
mod request;
mod transcode;
mod transport;
mod types;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    response::Response,
    routing::{get, post},
};

pub use credentials::{Attempt, Credential, CredentialPool, CredentialSource};
pub use dispatcher::{Dispatcher, DispatcherBuilder, ProviderProfile};
pub use error::{GenerationError, Result, TranscodeError};
pub use transcode::Transcoder;
pub use transport::{Transport, TransportError};
pub use types::{GenerateBody, GeneratedAudio, GenerationRequest, ModelCatalogue, ModelSummary, RawAudio};
use request::ExtractPayload;

/// Build the dispatcher from configuration
pub fn build_server(config: &sonicforge_config::Config) -> anyhow::Result<Arc<Dispatcher>> {
    let dispatcher = Arc::new(
        DispatcherBuilder::new(config)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to initialize generation dispatcher: {e}"))?,
    );
    Ok(dispatcher)
}

/// Create the endpoint router for generation
pub fn endpoint_router() -> Router<Arc<Dispatcher>> {
    Router::new()
        .route("/generate", post(generate))
        .route("/models", get(models))
}

/// Handle generation requests
async fn generate(
    State(dispatcher): State<Arc<Dispatcher>>,
    ExtractPayload(body): ExtractPayload<GenerateBody>,
) -> Result<Response> {
    let request = GenerationRequest::from_body(body, dispatcher.default_format())?;

    tracing::debug!(
        model = request.model(),
        format = %request.output_format(),
        "generate handler called"
    );

    let generated = dispatcher.generate(request).await?;

    Ok(generated.into_response())
}

async fn models(State(dispatcher): State<Arc<Dispatcher>>) -> Json<ModelCatalogue> {
    Json(dispatcher.models())
}
