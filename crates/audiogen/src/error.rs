use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use sonicforge_config::OutputFormat;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GenerationError>;

/// Failure classes of a generation request, each with its own HTTP status
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Missing or malformed prompt, model or format
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Model identifier has no profile
    #[error("Model '{0}' is not configured")]
    UnknownModel(String),

    /// Operator-side problem, such as a provider with no usable credential
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Provider failed and the failure is final for this request
    #[error("{provider} request failed{}: {message}", status_suffix(.status))]
    Provider {
        provider: String,
        /// Status reported by the provider, if a response was received
        status: Option<u16>,
        message: String,
    },

    /// Every credential in the pool produced a retryable failure
    #[error("All {attempts} credential(s) for {provider} failed; last error: {last_error}")]
    Exhausted {
        provider: String,
        attempts: usize,
        last_error: String,
    },

    /// Provider started an asynchronous job and returned no audio
    #[error("{provider} accepted the job but has not produced audio yet")]
    Incomplete { provider: String, job_id: Option<String> },

    /// Provider audio could not be converted
    #[error("Audio processing failed: {0}")]
    Transcode(#[from] TranscodeError),
}

#[allow(clippy::ref_option)]
fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

impl GenerationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::UnknownModel(_) => StatusCode::NOT_FOUND,
            Self::Configuration(_) | Self::Transcode(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Provider { status: Some(status), .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            Self::Provider { status: None, .. } | Self::Exhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Incomplete { .. } => StatusCode::ACCEPTED,
        }
    }

    /// Machine-readable class, stable across message changes
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::UnknownModel(_) => "unknown_model",
            Self::Configuration(_) => "configuration_error",
            Self::Provider { .. } | Self::Exhausted { .. } => "provider_error",
            Self::Incomplete { .. } => "incomplete_result",
            Self::Transcode(_) => "transcode_error",
        }
    }
}

/// Failures of the transcoding step
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("provider returned no audio data")]
    EmptyInput,

    #[error("provider output is not decodable audio: {0}")]
    Undecodable(String),

    #[error("cannot encode {format}: {reason}")]
    Unsupported { format: OutputFormat, reason: String },

    #[error("encoder failed: {0}")]
    Encoder(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    r#type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    job_id: Option<String>,
}

impl IntoResponse for GenerationError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = ErrorBody {
            error: self.to_string(),
            r#type: self.error_type(),
            job_id: match self {
                Self::Incomplete { job_id, .. } => job_id,
                _ => None,
            },
        };

        (status, Json(body)).into_response()
    }
}
