use std::str::FromStr;

use axum::{
    body::Body,
    http::{self, StatusCode},
    response::Response,
};
use serde::{Deserialize, Serialize};
use sonicforge_config::{OutputFormat, ProviderParams};

use crate::error::{GenerationError, Result};

/// JSON body accepted by `POST /generate`
///
/// Every field is optional on the wire so that missing values surface as
/// validation errors instead of deserialization failures.
#[derive(Debug, Default, Deserialize)]
pub struct GenerateBody {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub params: Option<ProviderParams>,
}

/// A validated generation request
///
/// Holds a non-blank prompt and model identifier; immutable once built.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    prompt: String,
    model: String,
    output_format: OutputFormat,
    params: ProviderParams,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>, output_format: OutputFormat) -> Result<Self> {
        let prompt = prompt.into();
        let model = model.into();

        if prompt.trim().is_empty() {
            return Err(GenerationError::Validation("prompt must not be empty".to_owned()));
        }

        if model.trim().is_empty() {
            return Err(GenerationError::Validation("model must not be empty".to_owned()));
        }

        Ok(Self {
            prompt,
            model,
            output_format,
            params: ProviderParams::default(),
        })
    }

    #[must_use]
    pub fn with_params(mut self, params: ProviderParams) -> Self {
        self.params = params;
        self
    }

    /// Validate a wire body, falling back to `default_format`
    pub fn from_body(body: GenerateBody, default_format: OutputFormat) -> Result<Self> {
        let output_format = match body.format.as_deref().map(str::trim) {
            None | Some("") => default_format,
            Some(raw) => OutputFormat::from_str(raw)
                .map_err(|_| GenerationError::Validation(format!("unsupported output format '{raw}'")))?,
        };

        let request = Self::new(
            body.prompt.unwrap_or_default(),
            body.model.unwrap_or_default(),
            output_format,
        )?;

        Ok(request.with_params(body.params.unwrap_or_default()))
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub const fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    pub const fn params(&self) -> &ProviderParams {
        &self.params
    }
}

/// Audio bytes exactly as a provider returned them
#[derive(Debug, Clone)]
pub struct RawAudio {
    pub bytes: Vec<u8>,
    /// MIME type or file extension reported by the provider, if any
    pub source_hint: Option<String>,
}

impl RawAudio {
    pub fn new(bytes: Vec<u8>, source_hint: Option<String>) -> Self {
        let source_hint = source_hint
            .map(|hint| hint.split(';').next().unwrap_or_default().trim().to_ascii_lowercase())
            .filter(|hint| !hint.is_empty());

        Self { bytes, source_hint }
    }
}

/// Transcoded audio ready to send to the client
pub struct GeneratedAudio {
    pub audio: Vec<u8>,
    pub format: OutputFormat,
    pub filename: String,
}

impl GeneratedAudio {
    pub fn new(model: &str, format: OutputFormat, audio: Vec<u8>) -> Self {
        let model: String = model
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        let suffix = uuid::Uuid::new_v4().simple().to_string();

        Self {
            audio,
            format,
            filename: format!("sonicforge_{model}_{}.{}", &suffix[..8], format.extension()),
        }
    }

    /// Convert into a downloadable attachment response
    pub fn into_response(self) -> Response {
        let disposition = format!("attachment; filename=\"{}\"", self.filename);

        Response::builder()
            .header(http::header::CONTENT_TYPE, self.format.mime_type())
            .header(http::header::CONTENT_DISPOSITION, disposition)
            .body(Body::from(self.audio))
            .unwrap_or_else(|_| {
                let mut response = Response::new(Body::empty());
                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                response
            })
    }
}

/// Catalogue entry returned by `GET /models`
#[derive(Debug, Serialize)]
pub struct ModelSummary {
    pub id: String,
    pub label: String,
    pub provider: String,
    /// False when the provider needs credentials and none were configured
    pub available: bool,
}

#[derive(Debug, Serialize)]
pub struct ModelCatalogue {
    pub models: Vec<ModelSummary>,
}
