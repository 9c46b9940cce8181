//! Prometheus metrics and tracing spans for inventory operations and store calls.
//!
//! Both halves are feature-gated (`metrics`, `tracing`); call sites use
//! `#[cfg(feature = ...)]` so a build without them carries no overhead.

#[cfg(feature = "metrics")]
pub use prometheus_metrics::{StockguardMetrics, METRICS};

#[cfg(feature = "metrics")]
mod prometheus_metrics {
    use once_cell::sync::Lazy;
    use opentelemetry::metrics::{Counter, Histogram, MeterProvider};
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::metrics::SdkMeterProvider;
    use prometheus::{Registry, TextEncoder};
    use std::time::Duration;

    pub static METRICS: Lazy<StockguardMetrics> = Lazy::new(StockguardMetrics::init);

    pub struct StockguardMetrics {
        registry: Registry,
        _provider: SdkMeterProvider,
        pub operations_total: Counter<u64>,
        pub store_calls_total: Counter<u64>,
        pub store_call_duration: Histogram<f64>,
        pub retries_total: Counter<u64>,
        pub compensations_total: Counter<u64>,
        pub reconciled_rows_total: Counter<u64>,
    }

    impl StockguardMetrics {
        pub fn init() -> Self {
            let registry = Registry::new();
            let exporter = opentelemetry_prometheus::exporter()
                .with_registry(registry.clone())
                .build()
                .expect("failed to build prometheus exporter");
            let provider = SdkMeterProvider::builder().with_reader(exporter).build();
            let meter = provider.meter("stockguard");

            let operations_total = meter
                .u64_counter("stockguard_operations_total")
                .with_description("Inventory operations by kind and outcome")
                .build();

            let store_calls_total = meter
                .u64_counter("stockguard_store_calls_total")
                .with_description("Backing store calls by kind and outcome")
                .build();

            let store_call_duration = meter
                .f64_histogram("stockguard_store_call_duration_seconds")
                .with_description("Latency of backing store calls")
                .build();

            let retries_total = meter
                .u64_counter("stockguard_retries_total")
                .with_description("Retried steps after a transient store failure")
                .build();

            let compensations_total = meter
                .u64_counter("stockguard_compensations_total")
                .with_description("Compensating writes issued after a partial failure")
                .build();

            let reconciled_rows_total = meter
                .u64_counter("stockguard_reconciled_rows_total")
                .with_description("Duplicate stock rows removed by the reconciler")
                .build();

            Self {
                registry,
                _provider: provider,
                operations_total,
                store_calls_total,
                store_call_duration,
                retries_total,
                compensations_total,
                reconciled_rows_total,
            }
        }

        pub fn record_operation(&self, operation: &'static str, success: bool) {
            let outcome = if success { "ok" } else { "failed" };
            self.operations_total.add(
                1,
                &[
                    KeyValue::new("operation", operation),
                    KeyValue::new("outcome", outcome),
                ],
            );
        }

        pub fn record_store_call(&self, call: &'static str, elapsed: Duration, success: bool) {
            let outcome = if success { "ok" } else { "error" };
            self.store_calls_total.add(
                1,
                &[KeyValue::new("call", call), KeyValue::new("outcome", outcome)],
            );
            self.store_call_duration
                .record(elapsed.as_secs_f64(), &[KeyValue::new("call", call)]);
        }

        pub fn record_retry(&self, step: &str) {
            self.retries_total
                .add(1, &[KeyValue::new("step", step.to_string())]);
        }

        pub fn record_compensation(&self, operation: &'static str) {
            self.compensations_total
                .add(1, &[KeyValue::new("operation", operation)]);
        }

        pub fn record_reconciled(&self, removed: usize) {
            self.reconciled_rows_total.add(removed as u64, &[]);
        }

        /// Prometheus text exposition of everything recorded so far.
        pub fn render(&self) -> String {
            TextEncoder::new()
                .encode_to_string(&self.registry.gather())
                .unwrap_or_default()
        }
    }
}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::{info_span, Span};

    pub fn operation_span(operation: &str, location: &str, request_id: &str) -> Span {
        info_span!(
            "stockguard.operation",
            operation = operation,
            location = location,
            request_id = request_id
        )
    }

    pub fn store_call_span(call: &str, sheet: &str) -> Span {
        info_span!("stockguard.store", call = call, sheet = sheet)
    }

    pub fn retry_span(step: &str, attempt: u32) -> Span {
        info_span!("stockguard.retry", step = step, attempt = attempt)
    }
}
