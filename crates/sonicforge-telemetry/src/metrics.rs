//! Metric names and recording helpers

use std::time::Instant;

use opentelemetry::{KeyValue, metrics::Histogram};

/// Record the time elapsed since `start`, in seconds
pub fn record_duration(histogram: &Histogram<f64>, start: Instant, attributes: &[KeyValue]) {
    histogram.record(start.elapsed().as_secs_f64(), attributes);
}

/// End-to-end `/generate` latency, attributes `model` and `outcome`
pub const GENERATION_REQUEST_DURATION: &str = "generation.request.duration";

/// One count per provider call, attributes `provider` and `result`
pub const GENERATION_PROVIDER_ATTEMPTS: &str = "generation.provider.attempts";

/// Time spent converting provider audio, attribute `format`
pub const GENERATION_TRANSCODE_DURATION: &str = "generation.transcode.duration";
