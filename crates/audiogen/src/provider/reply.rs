//! Response classification shared by every wire variant

use serde_json::{Map, Value};
use url::Url;

use super::{Delivery, ProviderResponse, UpstreamFailure};
use crate::types::RawAudio;

/// Upstream error text is cut to this many characters
const ERROR_TEXT_LIMIT: usize = 512;

/// Keys that may carry a result URL, in lookup order
const URL_KEYS: [&str; 5] = ["audio_url", "audio", "url", "output", "result_url"];

const JOB_ID_KEYS: [&str; 3] = ["id", "job_id", "task_id"];

const PENDING_STATUSES: [&str; 6] = ["queued", "pending", "submitted", "starting", "processing", "in_progress"];

const FAILED_STATUSES: [&str; 4] = ["failed", "error", "canceled", "cancelled"];

pub(crate) fn classify(response: ProviderResponse) -> Result<Delivery, UpstreamFailure> {
    let ProviderResponse {
        status,
        content_type,
        body,
    } = response;

    if !status.is_success() {
        let text = error_text(&body);
        let message = if text.is_empty() {
            status.canonical_reason().unwrap_or("no response body").to_owned()
        } else {
            text
        };
        return Err(UpstreamFailure::reported(status, message));
    }

    if is_audio(content_type.as_deref(), &body) {
        return Ok(Delivery::Audio(RawAudio::new(body, content_type)));
    }

    let Ok(json) = serde_json::from_slice::<Value>(&body) else {
        return Err(UpstreamFailure::unusable_body(format!(
            "unrecognized response ({} bytes, content type {})",
            body.len(),
            content_type.as_deref().unwrap_or("unknown")
        )));
    };

    let object = match &json {
        Value::Array(items) => items.first().and_then(Value::as_object),
        other => other.as_object(),
    };

    let Some(object) = object else {
        return Err(UpstreamFailure::unusable_body("response JSON is not an object"));
    };

    if let Some(url) = result_url(object) {
        return Ok(Delivery::ResultUrl(url));
    }

    let job_status = object
        .get("status")
        .and_then(Value::as_str)
        .map(str::to_ascii_lowercase);

    if let Some(job_status) = job_status.as_deref()
        && FAILED_STATUSES.contains(&job_status)
    {
        let message = reported_error(object).unwrap_or_else(|| format!("job {job_status}"));
        return Err(UpstreamFailure::unusable_body(message));
    }

    let job_id = job_id(object);

    if job_id.is_some() || job_status.as_deref().is_some_and(|s| PENDING_STATUSES.contains(&s)) {
        return Ok(Delivery::Accepted { job_id });
    }

    Err(UpstreamFailure::unusable_body(
        reported_error(object).unwrap_or_else(|| "response carried no audio".to_owned()),
    ))
}

/// Content type first, then container magic bytes
pub(crate) fn is_audio(content_type: Option<&str>, body: &[u8]) -> bool {
    if let Some(content_type) = content_type {
        let content_type = content_type.trim().to_ascii_lowercase();
        if content_type.starts_with("audio/") || content_type.starts_with("application/octet-stream") {
            return true;
        }
    }

    match body {
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'A', b'V', b'E', ..]
        | [b'I', b'D', b'3', ..]
        | [b'f', b'L', b'a', b'C', ..]
        | [b'O', b'g', b'g', b'S', ..]
        | [_, _, _, _, b'f', b't', b'y', b'p', ..] => true,
        [0xFF, second, ..] => second & 0xE0 == 0xE0,
        _ => false,
    }
}

fn result_url(object: &Map<String, Value>) -> Option<Url> {
    URL_KEYS.iter().find_map(|key| match object.get(*key)? {
        Value::String(raw) => http_url(raw),
        Value::Array(items) => items.iter().filter_map(Value::as_str).find_map(http_url),
        _ => None,
    })
}

fn http_url(raw: &str) -> Option<Url> {
    Url::parse(raw.trim())
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
}

fn job_id(object: &Map<String, Value>) -> Option<String> {
    JOB_ID_KEYS.iter().find_map(|key| match object.get(*key)? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    })
}

fn reported_error(object: &Map<String, Value>) -> Option<String> {
    ["error", "detail", "message"].iter().find_map(|key| match object.get(*key)? {
        Value::String(text) => Some(truncate(text)),
        Value::Null => None,
        other => Some(truncate(&other.to_string())),
    })
}

fn error_text(body: &[u8]) -> String {
    truncate(String::from_utf8_lossy(body).trim())
}

fn truncate(text: &str) -> String {
    text.chars().take(ERROR_TEXT_LIMIT).collect()
}
