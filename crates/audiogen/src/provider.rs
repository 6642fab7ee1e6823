//! Provider adapters: one wire protocol per variant

pub mod hugging_face;
pub mod json_prompt;
pub mod multipart_form;
pub(crate) mod reply;

use std::sync::Arc;

use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use secrecy::{ExposeSecret, SecretString};
use sonicforge_config::{ProviderParams, RetryPolicy, WireProtocol};
use url::Url;

use crate::{
    credentials::Credential,
    error::{GenerationError, Result},
    types::{GenerationRequest, RawAudio},
};

/// Where a model's requests go
#[derive(Debug, Clone, Copy)]
pub struct ModelTarget<'a> {
    pub endpoint: &'a Url,
    /// Provider-side model name, sent where the wire shape has a field for it
    pub remote_model: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(serde_json::Value),
    /// Text fields sent as `multipart/form-data`
    Form(Vec<(String, String)>),
}

/// A fully built provider call, independent of the HTTP client
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

/// Buffered provider reply
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// What a successful provider reply hands over
#[derive(Debug)]
pub enum Delivery {
    /// Audio bytes in the response body
    Audio(RawAudio),
    /// Audio must be fetched from this URL without credentials
    ResultUrl(Url),
    /// Job started asynchronously; no audio yet
    Accepted { job_id: Option<String> },
}

/// Provider-side failure of a single attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamFailure {
    pub status: StatusCode,
    pub message: String,
    /// False when the status was not sent by the provider but derived from
    /// an unusable 2xx body
    pub reported: bool,
}

impl UpstreamFailure {
    pub fn reported(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            reported: true,
        }
    }

    pub fn unusable_body(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: message.into(),
            reported: false,
        }
    }
}

/// Decides which failures move a request on to the next credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryRule {
    pooled: bool,
    policy: RetryPolicy,
}

impl RetryRule {
    /// Single-credential and public providers: every failure is final
    pub const fn never() -> Self {
        Self {
            pooled: false,
            policy: RetryPolicy::AnyFailure,
        }
    }

    pub const fn pooled(policy: RetryPolicy) -> Self {
        Self { pooled: true, policy }
    }

    /// Whether a reported non-success status is worth another credential
    pub fn status(self, status: StatusCode) -> bool {
        if !self.pooled || status.is_success() {
            return false;
        }

        match self.policy {
            RetryPolicy::AnyFailure => true,
            RetryPolicy::CredentialErrors => matches!(status.as_u16(), 401 | 402 | 403 | 429),
        }
    }

    /// Transport errors and timeouts
    pub const fn transport(self) -> bool {
        self.pooled
    }
}

/// Request/response shape of one provider backend
pub trait ProviderAdapter: Send + Sync {
    /// Provider name from configuration
    fn name(&self) -> &str;

    /// Build the outbound call for `request`
    ///
    /// `params` are the request parameters already merged over the model
    /// defaults.
    fn build_request(
        &self,
        target: &ModelTarget<'_>,
        request: &GenerationRequest,
        params: &ProviderParams,
        credential: Option<&Credential>,
    ) -> Result<OutboundRequest>;

    /// Classify a buffered reply
    fn parse_response(&self, response: ProviderResponse) -> std::result::Result<Delivery, UpstreamFailure> {
        reply::classify(response)
    }

    fn retry_rule(&self) -> RetryRule;

    fn is_retryable_failure(&self, status: StatusCode) -> bool {
        self.retry_rule().status(status)
    }
}

/// Instantiate the adapter for a configured wire protocol
pub fn adapter_for(name: &str, protocol: WireProtocol, retry: RetryRule) -> Arc<dyn ProviderAdapter> {
    match protocol {
        WireProtocol::HuggingFace => Arc::new(hugging_face::HuggingFace::new(name, retry)),
        WireProtocol::JsonPrompt => Arc::new(json_prompt::JsonPrompt::new(name, retry)),
        WireProtocol::MultipartForm => Arc::new(multipart_form::MultipartForm::new(name, retry)),
    }
}

/// `Accept` plus a sensitive `Authorization: Bearer` header when a credential is given
pub(crate) fn request_headers(
    provider: &str,
    credential: Option<&Credential>,
    accept: &'static str,
) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static(accept));

    if let Some(credential) = credential {
        let value = bearer(credential.token()).ok_or_else(|| {
            GenerationError::Configuration(format!(
                "credential #{} for provider '{provider}' contains characters not allowed in a header",
                credential.position() + 1
            ))
        })?;
        headers.insert(header::AUTHORIZATION, value);
    }

    Ok(headers)
}

/// Whether `token` can be sent as a bearer `Authorization` header
pub(crate) fn is_header_safe(token: &SecretString) -> bool {
    bearer(token).is_some()
}

fn bearer(token: &SecretString) -> Option<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret())).ok()?;
    value.set_sensitive(true);
    Some(value)
}
