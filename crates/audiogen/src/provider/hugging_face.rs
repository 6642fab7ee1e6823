use http::Method;
use serde_json::{Map, Value, json};
use sonicforge_config::ProviderParams;

use super::{ModelTarget, OutboundRequest, ProviderAdapter, RequestBody, RetryRule, request_headers};
use crate::{credentials::Credential, error::Result, types::GenerationRequest};

/// Hugging Face inference API: `{"inputs": prompt, "parameters": {...}}`
pub struct HuggingFace {
    name: String,
    retry: RetryRule,
}

impl HuggingFace {
    pub fn new(name: impl Into<String>, retry: RetryRule) -> Self {
        Self {
            name: name.into(),
            retry,
        }
    }
}

impl ProviderAdapter for HuggingFace {
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
        let mut parameters = Map::new();

        if let Some(duration) = params.duration {
            parameters.insert("duration".to_owned(), json!(duration));
        }
        if let Some(instrumental) = params.instrumental {
            parameters.insert("instrumental".to_owned(), json!(instrumental));
        }
        parameters.extend(params.extra.iter().map(|(k, v)| (k.clone(), v.clone())));

        let mut body = json!({ "inputs": request.prompt() });
        if !parameters.is_empty() {
            body["parameters"] = Value::Object(parameters);
        }

        tracing::debug!(
            provider = %self.name,
            endpoint = %target.endpoint,
            prompt_len = request.prompt().len(),
            "building Hugging Face request"
        );

        Ok(OutboundRequest {
            method: Method::POST,
            url: target.endpoint.clone(),
            headers: request_headers(&self.name, credential, "audio/*, application/json")?,
            body: RequestBody::Json(body),
        })
    }

    fn retry_rule(&self) -> RetryRule {
        self.retry
    }
}
