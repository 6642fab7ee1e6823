//! Provider credentials and the ordered failover loop over a key pool

use std::future::Future;

use secrecy::SecretString;

use crate::error::GenerationError;

/// An API key and its position in the configured order
#[derive(Debug, Clone)]
pub struct Credential {
    token: SecretString,
    position: usize,
}

impl Credential {
    pub const fn new(token: SecretString, position: usize) -> Self {
        Self { token, position }
    }

    /// Zero-based position within the pool
    pub const fn position(&self) -> usize {
        self.position
    }

    pub(crate) const fn token(&self) -> &SecretString {
        &self.token
    }
}

/// How a provider authenticates, fixed at startup
#[derive(Debug)]
pub enum CredentialSource {
    /// No `Authorization` header
    Public,
    /// One master key; `None` when configured but unresolved
    Single(Option<Credential>),
    /// Interchangeable keys tried in order
    Pooled(CredentialPool),
}

impl CredentialSource {
    /// Whether requests can be authenticated at all
    pub fn is_usable(&self) -> bool {
        match self {
            Self::Public => true,
            Self::Single(credential) => credential.is_some(),
            Self::Pooled(pool) => !pool.is_empty(),
        }
    }
}

/// Result of a single provider call with one credential
#[derive(Debug)]
pub enum Attempt<T> {
    Success(T),
    /// Worth repeating with the next credential
    Retryable(GenerationError),
    /// Ends the request regardless of remaining credentials
    Fatal(GenerationError),
}

impl<T> Attempt<T> {
    pub fn into_result(self) -> Result<T, GenerationError> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Retryable(error) | Self::Fatal(error) => Err(error),
        }
    }
}

/// Ordered, read-only list of keys for one provider
#[derive(Debug)]
pub struct CredentialPool {
    provider: String,
    credentials: Vec<Credential>,
}

impl CredentialPool {
    pub fn new(provider: impl Into<String>, tokens: impl IntoIterator<Item = SecretString>) -> Self {
        let credentials = tokens
            .into_iter()
            .enumerate()
            .map(|(position, token)| Credential::new(token, position))
            .collect();

        Self {
            provider: provider.into(),
            credentials,
        }
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// Run `attempt` with each credential in order until one succeeds
    ///
    /// A retryable failure moves on to the next credential; a fatal one
    /// stops immediately. Attempts run strictly one after another. When
    /// every credential fails, the error is [`GenerationError::Exhausted`]
    /// carrying the last failure text.
    pub async fn try_each<'a, T, F, Fut>(&'a self, mut attempt: F) -> Result<T, GenerationError>
    where
        F: FnMut(&'a Credential) -> Fut,
        Fut: Future<Output = Attempt<T>>,
    {
        let mut last_error: Option<GenerationError> = None;

        for credential in &self.credentials {
            match attempt(credential).await {
                Attempt::Success(value) => {
                    tracing::debug!(
                        provider = %self.provider,
                        credential = credential.position(),
                        "credential accepted"
                    );
                    return Ok(value);
                }
                Attempt::Fatal(error) => {
                    tracing::warn!(
                        provider = %self.provider,
                        credential = credential.position(),
                        error = %error,
                        "non-retryable provider failure, abandoning pool"
                    );
                    return Err(error);
                }
                Attempt::Retryable(error) => {
                    tracing::warn!(
                        provider = %self.provider,
                        credential = credential.position(),
                        remaining = self.credentials.len() - credential.position() - 1,
                        error = %error,
                        "credential rejected, trying next"
                    );
                    last_error = Some(error);
                }
            }
        }

        Err(GenerationError::Exhausted {
            provider: self.provider.clone(),
            attempts: self.credentials.len(),
            last_error: last_error.map_or_else(|| "no credentials configured".to_owned(), |e| e.to_string()),
        })
    }
}
