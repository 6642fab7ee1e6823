use std::time::Instant;

use sonicforge_config::OutputFormat;
use sonicforge_telemetry::{
    Counter, Histogram, KeyValue,
    metrics::{GENERATION_PROVIDER_ATTEMPTS, GENERATION_REQUEST_DURATION, GENERATION_TRANSCODE_DURATION, record_duration},
};

/// Result label for one provider call
#[derive(Debug, Clone, Copy)]
pub enum AttemptResult {
    Success,
    Retryable,
    Fatal,
}

impl AttemptResult {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Retryable => "retryable",
            Self::Fatal => "fatal",
        }
    }
}

/// Instruments recorded by the dispatcher
pub struct GenerationMetrics {
    request_duration: Histogram<f64>,
    provider_attempts: Counter<u64>,
    transcode_duration: Histogram<f64>,
}

impl Default for GenerationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationMetrics {
    pub fn new() -> Self {
        let meter = sonicforge_telemetry::meter();

        Self {
            request_duration: meter
                .f64_histogram(GENERATION_REQUEST_DURATION)
                .with_unit("s")
                .with_description("End-to-end generation latency")
                .build(),
            provider_attempts: meter
                .u64_counter(GENERATION_PROVIDER_ATTEMPTS)
                .with_description("Provider calls, one per credential tried")
                .build(),
            transcode_duration: meter
                .f64_histogram(GENERATION_TRANSCODE_DURATION)
                .with_unit("s")
                .with_description("Time spent converting provider audio")
                .build(),
        }
    }

    pub fn request(&self, model: &str, outcome: &'static str, start: Instant) {
        record_duration(
            &self.request_duration,
            start,
            &[
                KeyValue::new("model", model.to_owned()),
                KeyValue::new("outcome", outcome),
            ],
        );
    }

    pub fn attempt(&self, provider: &str, result: AttemptResult) {
        self.provider_attempts.add(
            1,
            &[
                KeyValue::new("provider", provider.to_owned()),
                KeyValue::new("result", result.as_str()),
            ],
        );
    }

    pub fn transcode(&self, format: OutputFormat, start: Instant) {
        record_duration(
            &self.transcode_duration,
            start,
            &[KeyValue::new("format", format.extension())],
        );
    }
}
