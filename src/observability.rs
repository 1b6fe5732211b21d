use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("vllm_chat.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("vllm_chat.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("vllm_chat.client.request_duration_seconds");

pub(crate) static OVERFLOW_DETECTED: Counter = Counter::new("vllm_chat.overflow.detected");
pub(crate) static OVERFLOW_RECOVERED: Counter = Counter::new("vllm_chat.overflow.recovered");
pub(crate) static OVERFLOW_FATAL: Counter = Counter::new("vllm_chat.overflow.fatal");

pub(crate) static DISCOVERY_FAILURES: Counter = Counter::new("vllm_chat.discovery.failures");

pub(crate) static STREAM_EVENTS: Counter = Counter::new("vllm_chat.stream.events");
pub(crate) static STREAM_SKIPPED_LINES: Counter = Counter::new("vllm_chat.stream.skipped_lines");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("vllm_chat.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("vllm_chat.stream.bytes");

pub(crate) static TRANSCRIPT_TRUNCATIONS: Counter =
    Counter::new("vllm_chat.transcript.truncations");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&OVERFLOW_DETECTED);
    collector.register_counter(&OVERFLOW_RECOVERED);
    collector.register_counter(&OVERFLOW_FATAL);

    collector.register_counter(&DISCOVERY_FAILURES);

    collector.register_counter(&STREAM_EVENTS);
    collector.register_counter(&STREAM_SKIPPED_LINES);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);

    collector.register_counter(&TRANSCRIPT_TRUNCATIONS);
}
