use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram, Meter};

#[derive(Clone)]
pub struct Metrics {
    requests: Counter<u64>,
    request_duration: Histogram<f64>,
    errors: Counter<u64>,
    fragments: Counter<u64>,
}

impl Metrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            requests: meter
                .u64_counter("chatgate.requests")
                .with_description("Total number of chat-completion requests")
                .build(),
            request_duration: meter
                .f64_histogram("chatgate.request.duration")
                .with_description("Duration of chat-completion requests in seconds")
                .with_unit("s")
                .build(),
            errors: meter
                .u64_counter("chatgate.errors")
                .with_description("Total number of errors by operation and reason")
                .build(),
            fragments: meter
                .u64_counter("chatgate.fragments")
                .with_description("Total number of streamed fragments written to clients")
                .build(),
        }
    }

    /// `method` is `"stream"` or `"blocking"`.
    pub fn record_request(&self, method: &'static str, duration: f64, success: bool) {
        let attrs = &[
            KeyValue::new("method", method),
            KeyValue::new("success", success),
        ];
        self.requests.add(1, attrs);
        self.request_duration.record(duration, attrs);
    }

    pub fn record_error(&self, operation: &'static str, reason: &'static str) {
        self.errors.add(
            1,
            &[
                KeyValue::new("operation", operation),
                KeyValue::new("reason", reason),
            ],
        );
    }

    pub fn record_fragments(&self, count: usize) {
        self.fragments.add(count as u64, &[]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::metrics::MeterProvider;
    use opentelemetry_sdk::metrics::data::{AggregatedMetrics, MetricData, ResourceMetrics};
    use opentelemetry_sdk::metrics::{
        PeriodicReader, SdkMeterProvider, in_memory_exporter::InMemoryMetricExporter,
    };
    use std::time::Duration;

    fn create_test_metrics() -> (Metrics, InMemoryMetricExporter, SdkMeterProvider) {
        let exporter = InMemoryMetricExporter::default();
        let reader = PeriodicReader::builder(exporter.clone())
            .with_interval(Duration::from_millis(100))
            .build();

        let provider = SdkMeterProvider::builder().with_reader(reader).build();
        let meter = provider.meter("chatgate-test");

        (Metrics::new(&meter), exporter, provider)
    }

    fn u64_sum(finished: &[ResourceMetrics], name: &str) -> u64 {
        finished
            .iter()
            .flat_map(|rm| rm.scope_metrics())
            .flat_map(|sm| sm.metrics())
            .filter(|m| m.name() == name)
            .map(|m| match m.data() {
                AggregatedMetrics::U64(MetricData::Sum(sum)) => {
                    sum.data_points().map(|p| p.value()).sum::<u64>()
                }
                _ => 0,
            })
            .max()
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn records_request_counter_and_duration() {
        let (metrics, exporter, provider) = create_test_metrics();

        metrics.record_request("stream", 1.5, true);
        metrics.record_request("blocking", 0.5, false);
        provider.force_flush().unwrap();

        let finished = exporter.get_finished_metrics().unwrap();
        assert_eq!(u64_sum(&finished, "chatgate.requests"), 2);
        assert!(
            finished
                .iter()
                .flat_map(|rm| rm.scope_metrics())
                .flat_map(|sm| sm.metrics())
                .any(|m| m.name() == "chatgate.request.duration")
        );

        provider.shutdown().unwrap();
    }

    #[tokio::test]
    async fn records_errors() {
        let (metrics, exporter, provider) = create_test_metrics();

        metrics.record_error("dispatch", "publish_failed");
        provider.force_flush().unwrap();

        let finished = exporter.get_finished_metrics().unwrap();
        assert_eq!(u64_sum(&finished, "chatgate.errors"), 1);

        provider.shutdown().unwrap();
    }

    #[tokio::test]
    async fn records_fragment_totals() {
        let (metrics, exporter, provider) = create_test_metrics();

        metrics.record_fragments(4);
        metrics.record_fragments(2);
        provider.force_flush().unwrap();

        let finished = exporter.get_finished_metrics().unwrap();
        assert_eq!(u64_sum(&finished, "chatgate.fragments"), 6);

        provider.shutdown().unwrap();
    }
}
