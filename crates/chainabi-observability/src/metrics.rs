//! ChainABI metric instruments.

use chainabi_core::{DecoderRequest, StopDecodingError};
use opentelemetry::{
    metrics::{Counter, Histogram, Meter},
    KeyValue,
};

/// Metric handles shared by everything that drives decodes.
#[derive(Clone)]
pub struct ChainAbiMetrics {
    pub calls_decoded: Counter<u64>,
    pub events_decoded: Counter<u64>,
    pub decode_errors: Counter<u64>,
    pub allocation_failures: Counter<u64>,
    pub suspensions: Counter<u64>,
    pub decode_latency_ms: Histogram<f64>,
}

impl ChainAbiMetrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            calls_decoded: meter
                .u64_counter("chainabi.calls_decoded")
                .with_description("Calldata decodes that matched a function or constructor")
                .init(),
            events_decoded: meter
                .u64_counter("chainabi.events_decoded")
                .with_description("Event decodings produced")
                .init(),
            decode_errors: meter
                .u64_counter("chainabi.decode_errors")
                .with_description("Decodes stopped or containing error results")
                .init(),
            allocation_failures: meter
                .u64_counter("chainabi.allocation_failures")
                .with_description("Types or entries that could not be allocated")
                .init(),
            suspensions: meter
                .u64_counter("chainabi.suspensions")
                .with_description("Requests for storage or code issued by the decoder")
                .init(),
            decode_latency_ms: meter
                .f64_histogram("chainabi.decode_latency_ms")
                .with_description("Time to drive one decode to completion in milliseconds")
                .init(),
        }
    }

    pub fn record_call(&self, contract: &str, mode: &str) {
        self.calls_decoded.add(
            1,
            &[
                KeyValue::new("contract", contract.to_string()),
                KeyValue::new("mode", mode.to_string()),
            ],
        );
    }

    pub fn record_event(&self, event: &str) {
        self.events_decoded.add(1, &[KeyValue::new("event", event.to_string())]);
    }

    pub fn record_error(&self, kind: &str) {
        self.decode_errors.add(1, &[KeyValue::new("error_kind", kind.to_string())]);
    }

    pub fn record_stop(&self, stop: &StopDecodingError) {
        let kind = if stop.allow_retry { "retryable_stop" } else { "stop" };
        self.record_error(kind);
    }

    pub fn record_allocation_failures(&self, count: u64) {
        if count > 0 {
            self.allocation_failures.add(count, &[]);
        }
    }

    pub fn record_request(&self, request: &DecoderRequest) {
        let kind = match request {
            DecoderRequest::Code { .. } => "code",
            DecoderRequest::Storage { .. } => "storage",
        };
        self.suspensions.add(1, &[KeyValue::new("request", kind)]);
    }

    pub fn record_latency(&self, ms: f64, operation: &str) {
        self.decode_latency_ms.record(ms, &[KeyValue::new("operation", operation.to_string())]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainabi_core::DecodingError;

    #[test]
    fn records_against_the_noop_meter() {
        let meter = opentelemetry::global::meter("chainabi-test");
        let metrics = ChainAbiMetrics::new(&meter);
        metrics.record_call("Token", "abi");
        metrics.record_event("Transfer");
        metrics.record_stop(&StopDecodingError::new(DecodingError::ReadTopic { topic: 1 }));
        metrics.record_allocation_failures(0);
        metrics.record_latency(1.5, "calldata");
    }
}
