use http::Method;
use serde_json::{Map, Value, json};
use sonicforge_config::ProviderParams;

use super::{ModelTarget, OutboundRequest, ProviderAdapter, RequestBody, RetryRule, request_headers};
use crate::{credentials::Credential, error::Result, types::GenerationRequest};

/// Flat JSON body keyed by `prompt`, used by self-hosted and job-style APIs
pub struct JsonPrompt {
    name: String,
    retry: RetryRule,
}

impl JsonPrompt {
    pub fn new(name: impl Into<String>, retry: RetryRule) -> Self {
        Self {
            name: name.into(),
            retry,
        }
    }
}

impl ProviderAdapter for JsonPrompt {
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
        let mut body = Map::new();
        body.insert("prompt".to_owned(), json!(request.prompt()));

        if let Some(model) = target.remote_model {
            body.insert("model".to_owned(), json!(model));
        }
        if let Some(instrumental) = params.instrumental {
            body.insert("make_instrumental".to_owned(), json!(instrumental));
        }
        if let Some(duration) = params.duration {
            body.insert("duration".to_owned(), json!(duration));
        }

        // extra keys never replace the fields above
        for (key, value) in &params.extra {
            body.entry(key.clone()).or_insert_with(|| value.clone());
        }

        tracing::debug!(
            provider = %self.name,
            endpoint = %target.endpoint,
            remote_model = target.remote_model.unwrap_or_default(),
            "building JSON prompt request"
        );

        Ok(OutboundRequest {
            method: Method::POST,
            url: target.endpoint.clone(),
            headers: request_headers(&self.name, credential, "audio/*, application/json")?,
            body: RequestBody::Json(Value::Object(body)),
        })
    }

    fn retry_rule(&self) -> RetryRule {
        self.retry
    }
}
