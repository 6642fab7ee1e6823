use axum::body::Body;
use serde::de::DeserializeOwned;

use crate::error::GenerationError;

/// Extractor for JSON request bodies
///
/// Every rejection is a [`GenerationError::Validation`] so clients always
/// get the same `{error, type}` shape.
pub struct ExtractPayload<T>(pub T);

/// Body limit for generation requests (64 KiB)
const BODY_LIMIT_BYTES: usize = 64 << 10;

impl<S, T: DeserializeOwned> axum::extract::FromRequest<S> for ExtractPayload<T>
where
    S: Send + Sync,
{
    type Rejection = GenerationError;

    async fn from_request(request: http::Request<Body>, _state: &S) -> Result<Self, Self::Rejection> {
        let (parts, body) = request.into_parts();

        let is_json = parts
            .headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| {
                value
                    .split(';')
                    .next()
                    .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
            });

        if !is_json {
            return Err(GenerationError::Validation(
                "unsupported Content-Type, expected 'application/json'".to_owned(),
            ));
        }

        let bytes = axum::body::to_bytes(body, BODY_LIMIT_BYTES).await.map_err(|err| {
            if std::error::Error::source(&err).is_some_and(|source| source.is::<http_body_util::LengthLimitError>()) {
                GenerationError::Validation(format!("request body is too large, limit is {BODY_LIMIT_BYTES} bytes"))
            } else {
                GenerationError::Validation(format!("failed to read request body: {err}"))
            }
        })?;

        serde_json::from_slice::<T>(&bytes)
            .map(Self)
            .map_err(|e| GenerationError::Validation(format!("failed to parse request body: {e}")))
    }
}
