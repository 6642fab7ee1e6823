use std::{collections::HashSet, path::PathBuf, time::Duration};

use indexmap::IndexMap;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use crate::{OutputFormat, env};

/// Placeholder substituted with `remote_model` in endpoint templates
pub const MODEL_PLACEHOLDER: &str = "{model}";

/// Upper bound for `max_numbered`
pub const MAX_NUMBERED_LIMIT: usize = 100;

/// Providers, the model table, and transcoding settings
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationConfig {
    /// Per-attempt timeout for a provider call (e.g. "90s", "2m")
    #[serde(default)]
    pub attempt_timeout: Option<String>,
    /// Format used when the client does not ask for one
    #[serde(default)]
    pub default_format: OutputFormat,
    #[serde(default)]
    pub transcode: TranscodeConfig,
    /// Provider backends keyed by name
    #[serde(default)]
    pub providers: IndexMap<String, ProviderConfig>,
    /// Model identifiers exposed to clients, in display order
    #[serde(default)]
    pub models: IndexMap<String, ModelConfig>,
}

impl GenerationConfig {
    /// Parsed per-attempt timeout, two minutes when unset
    pub fn attempt_timeout(&self) -> anyhow::Result<Duration> {
        let Some(raw) = self.attempt_timeout.as_deref() else {
            return Ok(Duration::from_secs(120));
        };

        let timeout =
            duration_str::parse(raw).map_err(|e| anyhow::anyhow!("invalid attempt_timeout '{raw}': {e}"))?;

        if timeout.is_zero() {
            anyhow::bail!("attempt_timeout must be greater than zero");
        }

        Ok(timeout)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TranscodeConfig {
    /// Encoder binary used for every target other than WAV
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
        }
    }
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

/// Configuration for a single provider backend
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Wire protocol spoken by the backend
    #[serde(rename = "type")]
    pub protocol: WireProtocol,
    /// Which failures move a pooled request on to the next credential;
    /// only meaningful for pooled credentials
    #[serde(default)]
    pub retry_policy: Option<RetryPolicy>,
    /// Absent for public backends that take no `Authorization` header
    #[serde(default)]
    pub credentials: Option<CredentialsConfig>,
}

impl ProviderConfig {
    /// Whether requests rotate through several keys
    pub fn is_pooled(&self) -> bool {
        self.credentials
            .as_ref()
            .is_some_and(|credentials| credentials.mode == CredentialMode::Pooled)
    }
}

/// Supported request/response shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireProtocol {
    /// JSON `{"inputs": ...}` as used by the Hugging Face inference API
    HuggingFace,
    /// JSON `{"prompt": ...}` for self-hosted and job-style APIs
    JsonPrompt,
    /// `multipart/form-data` text fields
    MultipartForm,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Any non-success status, transport error or timeout
    #[default]
    AnyFailure,
    /// Only 401, 402, 403, 429, transport errors and timeouts
    CredentialErrors,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialMode {
    /// Interchangeable keys tried in order until one succeeds
    #[default]
    Pooled,
    /// One master key; failures are final
    Single,
}

/// Where a provider's API keys come from
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub mode: CredentialMode,
    /// Inline keys; each entry may itself be a comma-separated list
    #[serde(default)]
    pub keys: Vec<SecretString>,
    /// Variable read as `VAR`, then `VAR_1`..`VAR_<max_numbered>`
    #[serde(default)]
    pub env: Option<String>,
    #[serde(default = "default_max_numbered")]
    pub max_numbered: usize,
}

#[allow(clippy::missing_const_for_fn)]
fn default_max_numbered() -> usize {
    10
}

impl CredentialsConfig {
    /// Assemble the ordered key list
    ///
    /// Inline keys come first, then `env`, then the numbered series.
    /// Repeated keys keep their first position.
    pub fn resolve(&self) -> Vec<SecretString> {
        let inline = self.keys.iter().flat_map(|key| env::split_list(key.expose_secret()));

        let from_env = self.env.iter().flat_map(|var| {
            let mut tokens = env::read_list(var);
            tokens.extend(env::read_numbered(var, self.max_numbered));
            tokens
        });

        let mut seen = HashSet::new();

        inline
            .chain(from_env)
            .filter(|token| seen.insert(token.clone()))
            .map(SecretString::from)
            .collect()
    }
}

/// A model identifier clients can request
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// Name of an entry in `generation.providers`
    pub provider: String,
    /// Endpoint URL, optionally containing `{model}`
    pub endpoint: String,
    /// Provider-side model name
    #[serde(default)]
    pub remote_model: Option<String>,
    /// Display name for the landing page
    #[serde(default)]
    pub label: Option<String>,
    /// Default parameters, overridden key by key by the request
    #[serde(default)]
    pub params: ProviderParams,
}

impl ModelConfig {
    /// Substitute `{model}` and parse the endpoint
    pub fn resolved_endpoint(&self) -> anyhow::Result<Url> {
        let raw = if self.endpoint.contains(MODEL_PLACEHOLDER) {
            let remote = self.remote_model.as_deref().ok_or_else(|| {
                anyhow::anyhow!("endpoint '{}' uses {MODEL_PLACEHOLDER} but remote_model is not set", self.endpoint)
            })?;
            self.endpoint.replace(MODEL_PLACEHOLDER, remote)
        } else {
            self.endpoint.clone()
        };

        let url = Url::parse(&raw).map_err(|e| anyhow::anyhow!("invalid endpoint '{raw}': {e}"))?;

        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("endpoint '{raw}' must use http or https");
        }

        Ok(url)
    }
}

/// Optional generation knobs forwarded to providers
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProviderParams {
    /// Requested length in seconds
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub instrumental: Option<bool>,
    /// Anything else, forwarded verbatim to JSON-body providers
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

impl ProviderParams {
    /// Overlay `self` on top of `defaults`
    #[must_use]
    pub fn merged_over(&self, defaults: &Self) -> Self {
        let mut extra = defaults.extra.clone();
        extra.extend(self.extra.iter().map(|(k, v)| (k.clone(), v.clone())));

        Self {
            duration: self.duration.or(defaults.duration),
            instrumental: self.instrumental.or(defaults.instrumental),
            extra,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.duration.is_none() && self.instrumental.is_none() && self.extra.is_empty()
    }
}
