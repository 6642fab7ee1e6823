use http::Method;
use sonicforge_config::{OutputFormat, ProviderParams};

use super::{ModelTarget, OutboundRequest, ProviderAdapter, RequestBody, RetryRule, request_headers};
use crate::{credentials::Credential, error::Result, types::GenerationRequest};

/// `multipart/form-data` text fields for APIs that reject JSON bodies
///
/// The form is sent even though no file part is attached.
pub struct MultipartForm {
    name: String,
    retry: RetryRule,
}

impl MultipartForm {
    pub fn new(name: impl Into<String>, retry: RetryRule) -> Self {
        Self {
            name: name.into(),
            retry,
        }
    }
}

/// These providers only emit mp3 or wav; anything else is transcoded from wav
fn upstream_format(requested: OutputFormat) -> OutputFormat {
    match requested {
        OutputFormat::Mp3 => OutputFormat::Mp3,
        _ => OutputFormat::Wav,
    }
}

impl ProviderAdapter for MultipartForm {
    fn name(&self) -> &str {
        &self.name
    }

    fn build_request(
        &self,
        target: &ModelTarget<'_>,
        request: &GenerationRequest,
        params: &ProviderParams,
        credential: Option<&Credential>,
    ) -> Result<OutboundRequest> {
        let mut fields = vec![("prompt".to_owned(), request.prompt().to_owned())];

        if let Some(model) = target.remote_model {
            fields.push(("model".to_owned(), model.to_owned()));
        }

        fields.push((
            "output_format".to_owned(),
            upstream_format(request.output_format()).to_string(),
        ));

        if let Some(duration) = params.duration {
            fields.push(("duration".to_owned(), duration.to_string()));
        }

        tracing::debug!(
            provider = %self.name,
            endpoint = %target.endpoint,
            fields = fields.len(),
            "building multipart request"
        );

        Ok(OutboundRequest {
            method: Method::POST,
            url: target.endpoint.clone(),
            headers: request_headers(&self.name, credential, "audio/*")?,
            body: RequestBody::Form(fields),
        })
    }

    fn retry_rule(&self) -> RetryRule {
        self.retry
    }
}
