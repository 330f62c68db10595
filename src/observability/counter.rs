use opentelemetry::metrics::{Counter, Meter};
use opentelemetry::KeyValue;
use std::sync::atomic::{AtomicU64, Ordering};

pub const MODEL_CALL_COUNTER: &str = crate::metrics::MODEL_CALL_COUNTER;

/// Fixed label set attached to every model call
pub const CALL_LABELS: &[(&str, &str)] = &[("language", "rust")];

/// Counts successful model invocations
pub trait CallCounter: Send + Sync {
    fn record_call(&self);
}

/// Exports the count through OpenTelemetry and mirrors it into the local
/// Prometheus registry.
#[derive(Clone)]
pub struct OtelCallCounter {
    counter: Counter<u64>,
    attributes: Vec<KeyValue>,
}

impl OtelCallCounter {
    pub fn new(meter: &Meter) -> Self {
        let counter = meter
            .u64_counter(MODEL_CALL_COUNTER)
            .with_description("number of model invocations")
            .with_unit("1")
            .build();

        Self {
            counter,
            attributes: CALL_LABELS
                .iter()
                .map(|(key, value)| KeyValue::new(*key, *value))
                .collect(),
        }
    }
}

impl CallCounter for OtelCallCounter {
    fn record_call(&self) {
        self.counter.add(1, &self.attributes);
        crate::metrics::record_model_call(CALL_LABELS);
    }
}

/// Counter kept in process memory
#[derive(Debug, Default)]
pub struct InMemoryCallCounter {
    count: AtomicU64,
}

impl InMemoryCallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl CallCounter for InMemoryCallCounter {
    fn record_call(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }
}
