use std::{sync::Arc, time::Instant};

use indexmap::IndexMap;
use secrecy::SecretString;
use sonicforge_config::{Config, CredentialMode, OutputFormat, ProviderParams};
use url::Url;

use crate::{
    credentials::{Attempt, Credential, CredentialPool, CredentialSource},
    error::{GenerationError, Result},
    http_client::http_client,
    metrics::{AttemptResult, GenerationMetrics},
    provider::{self, Delivery, ModelTarget, ProviderAdapter, RetryRule},
    transcode::Transcoder,
    transport::Transport,
    types::{GeneratedAudio, GenerationRequest, ModelCatalogue, ModelSummary, RawAudio},
};

/// Everything needed to serve one model identifier
pub struct ProviderProfile {
    model: String,
    label: String,
    provider: String,
    endpoint: Url,
    remote_model: Option<String>,
    defaults: ProviderParams,
    adapter: Arc<dyn ProviderAdapter>,
    credentials: Arc<CredentialSource>,
}

impl ProviderProfile {
    fn target(&self) -> ModelTarget<'_> {
        ModelTarget {
            endpoint: &self.endpoint,
            remote_model: self.remote_model.as_deref(),
        }
    }

    fn summary(&self) -> ModelSummary {
        ModelSummary {
            id: self.model.clone(),
            label: self.label.clone(),
            provider: self.provider.clone(),
            available: self.credentials.is_usable(),
        }
    }
}

/// Routes generation requests to providers and normalizes their audio
///
/// The profile table and credential pools are built once and only read
/// afterwards, so one dispatcher is shared by all concurrent requests.
pub struct Dispatcher {
    profiles: IndexMap<String, ProviderProfile>,
    transport: Transport,
    transcoder: Transcoder,
    default_format: OutputFormat,
    metrics: GenerationMetrics,
}

impl Dispatcher {
    /// Format used when a request names none
    pub const fn default_format(&self) -> OutputFormat {
        self.default_format
    }

    /// Configured models in configuration order
    pub fn models(&self) -> ModelCatalogue {
        ModelCatalogue {
            models: self.profiles.values().map(ProviderProfile::summary).collect(),
        }
    }

    /// Produce audio for `request` in its requested format
    pub async fn generate(&self, request: GenerationRequest) -> Result<GeneratedAudio> {
        let start = Instant::now();
        let result = self.dispatch(&request).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.error_type(),
        };
        self.metrics.request(request.model(), outcome, start);

        result
    }

    #[tracing::instrument(
        name = "generate",
        skip_all,
        fields(model = %request.model(), format = %request.output_format())
    )]
    async fn dispatch(&self, request: &GenerationRequest) -> Result<GeneratedAudio> {
        let profile = self
            .profiles
            .get(request.model())
            .ok_or_else(|| GenerationError::UnknownModel(request.model().to_owned()))?;

        if !profile.credentials.is_usable() {
            return Err(GenerationError::Configuration(format!(
                "provider '{}' has no usable credential configured",
                profile.provider
            )));
        }

        let params = request.params().merged_over(&profile.defaults);

        let delivery = match profile.credentials.as_ref() {
            CredentialSource::Public => self.attempt(profile, request, &params, None).await.into_result()?,
            CredentialSource::Single(credential) => self
                .attempt(profile, request, &params, credential.as_ref())
                .await
                .into_result()?,
            CredentialSource::Pooled(pool) => {
                pool.try_each(|credential| self.attempt(profile, request, &params, Some(credential)))
                    .await?
            }
        };

        let raw = match delivery {
            Delivery::Audio(raw) => raw,
            Delivery::ResultUrl(url) => self.download(profile, &url).await?,
            Delivery::Accepted { job_id } => {
                tracing::info!(
                    provider = %profile.provider,
                    job_id = job_id.as_deref().unwrap_or_default(),
                    "provider started an asynchronous job"
                );
                return Err(GenerationError::Incomplete {
                    provider: profile.provider.clone(),
                    job_id,
                });
            }
        };

        let format = request.output_format();
        let start = Instant::now();
        let audio = self.transcoder.convert(raw, format).await;
        self.metrics.transcode(format, start);

        let generated = GeneratedAudio::new(request.model(), format, audio?);

        tracing::debug!(
            provider = %profile.provider,
            bytes = generated.audio.len(),
            filename = %generated.filename,
            "generation complete"
        );

        Ok(generated)
    }

    /// One provider call with one credential
    async fn attempt(
        &self,
        profile: &ProviderProfile,
        request: &GenerationRequest,
        params: &ProviderParams,
        credential: Option<&Credential>,
    ) -> Attempt<Delivery> {
        let adapter = profile.adapter.as_ref();
        let credential_position = credential.map(Credential::position);

        let outbound = match adapter.build_request(&profile.target(), request, params, credential) {
            Ok(outbound) => outbound,
            Err(e) => return Attempt::Fatal(e),
        };

        let attempt = match self.transport.send(outbound).await {
            Err(e) => {
                let error = GenerationError::Provider {
                    provider: profile.provider.clone(),
                    status: None,
                    message: e.to_string(),
                };

                if adapter.retry_rule().transport() {
                    Attempt::Retryable(error)
                } else {
                    Attempt::Fatal(error)
                }
            }
            Ok(response) => match adapter.parse_response(response) {
                Ok(delivery) => Attempt::Success(delivery),
                Err(failure) => {
                    let retryable = failure.reported && adapter.is_retryable_failure(failure.status);
                    let error = GenerationError::Provider {
                        provider: profile.provider.clone(),
                        status: Some(failure.status.as_u16()),
                        message: failure.message,
                    };

                    if retryable {
                        Attempt::Retryable(error)
                    } else {
                        Attempt::Fatal(error)
                    }
                }
            },
        };

        let result = match &attempt {
            Attempt::Success(_) => AttemptResult::Success,
            Attempt::Retryable(_) => AttemptResult::Retryable,
            Attempt::Fatal(_) => AttemptResult::Fatal,
        };
        self.metrics.attempt(&profile.provider, result);

        tracing::debug!(
            provider = %profile.provider,
            credential = ?credential_position,
            result = ?result,
            "provider attempt finished"
        );

        attempt
    }

    /// Follow a result URL with a plain GET; failures here are never retried
    async fn download(&self, profile: &ProviderProfile, url: &Url) -> Result<RawAudio> {
        tracing::debug!(provider = %profile.provider, %url, "downloading provider result");

        let response = self
            .transport
            .fetch(url)
            .await
            .map_err(|e| GenerationError::Provider {
                provider: profile.provider.clone(),
                status: None,
                message: format!("result download failed: {e}"),
            })?;

        if !response.status.is_success() {
            return Err(GenerationError::Provider {
                provider: profile.provider.clone(),
                status: Some(response.status.as_u16()),
                message: format!("result download from {url} returned {}", response.status),
            });
        }

        let hint = response
            .content_type
            .filter(|content_type| content_type.starts_with("audio/"))
            .or_else(|| {
                url.path()
                    .rsplit_once('.')
                    .map(|(_, extension)| extension.to_owned())
                    .filter(|extension| !extension.contains('/'))
            });

        Ok(RawAudio::new(response.body, hint))
    }
}

/// Drop keys that can never be sent, so the rest of the pool stays reachable
fn header_safe_tokens(provider: &str, tokens: Vec<SecretString>) -> Vec<SecretString> {
    tokens
        .into_iter()
        .enumerate()
        .filter_map(|(position, token)| {
            if provider::is_header_safe(&token) {
                Some(token)
            } else {
                tracing::warn!(
                    provider,
                    credential = position + 1,
                    "ignoring credential with characters not allowed in a header"
                );
                None
            }
        })
        .collect()
}

/// Builds a [`Dispatcher`] from configuration
pub struct DispatcherBuilder<'a> {
    config: &'a Config,
}

impl<'a> DispatcherBuilder<'a> {
    pub const fn new(config: &'a Config) -> Self {
        Self { config }
    }

    pub fn build(self) -> Result<Dispatcher> {
        let generation = &self.config.generation;

        let attempt_timeout = generation
            .attempt_timeout()
            .map_err(|e| GenerationError::Configuration(e.to_string()))?;

        let mut providers: IndexMap<&str, (Arc<dyn ProviderAdapter>, Arc<CredentialSource>)> = IndexMap::new();

        for (name, provider_config) in &generation.providers {
            let source = match &provider_config.credentials {
                None => CredentialSource::Public,
                Some(credentials) => {
                    let tokens = header_safe_tokens(name, credentials.resolve());

                    if tokens.is_empty() {
                        tracing::warn!(
                            provider = %name,
                            "no credentials resolved, requests for this provider will fail"
                        );
                    }

                    match credentials.mode {
                        CredentialMode::Single => {
                            if tokens.len() > 1 {
                                tracing::warn!(
                                    provider = %name,
                                    resolved = tokens.len(),
                                    "single credential mode uses only the first key"
                                );
                            }
                            CredentialSource::Single(tokens.into_iter().next().map(|token| Credential::new(token, 0)))
                        }
                        CredentialMode::Pooled => CredentialSource::Pooled(CredentialPool::new(name.clone(), tokens)),
                    }
                }
            };

            let retry = match source {
                CredentialSource::Pooled(_) => RetryRule::pooled(provider_config.retry_policy.unwrap_or_default()),
                CredentialSource::Public | CredentialSource::Single(_) => RetryRule::never(),
            };

            let credential_count = match &source {
                CredentialSource::Public => 0,
                CredentialSource::Single(credential) => usize::from(credential.is_some()),
                CredentialSource::Pooled(pool) => pool.len(),
            };

            tracing::debug!(
                provider = %name,
                protocol = ?provider_config.protocol,
                credentials = credential_count,
                "initialized provider"
            );

            providers.insert(
                name.as_str(),
                (
                    provider::adapter_for(name, provider_config.protocol, retry),
                    Arc::new(source),
                ),
            );
        }

        let mut profiles = IndexMap::with_capacity(generation.models.len());

        for (id, model) in &generation.models {
            let (adapter, credentials) = providers.get(model.provider.as_str()).ok_or_else(|| {
                GenerationError::Configuration(format!("model '{id}' references unknown provider '{}'", model.provider))
            })?;

            let endpoint = model
                .resolved_endpoint()
                .map_err(|e| GenerationError::Configuration(format!("model '{id}': {e}")))?;

            profiles.insert(
                id.clone(),
                ProviderProfile {
                    model: id.clone(),
                    label: model.label.clone().unwrap_or_else(|| id.clone()),
                    provider: model.provider.clone(),
                    endpoint,
                    remote_model: model.remote_model.clone(),
                    defaults: model.params.clone(),
                    adapter: Arc::clone(adapter),
                    credentials: Arc::clone(credentials),
                },
            );
        }

        if profiles.is_empty() {
            tracing::debug!("No generation models configured");
        } else {
            tracing::debug!("Dispatcher initialized with {} model(s)", profiles.len());
        }

        Ok(Dispatcher {
            profiles,
            transport: Transport::new(http_client(), attempt_timeout),
            transcoder: Transcoder::new(generation.transcode.ffmpeg_path.clone()),
            default_format: generation.default_format,
            metrics: GenerationMetrics::new(),
        })
    }
}
