//! Structured request logging in the Cloud Logging JSON format.
//!
//! Each record becomes one line of JSON on stdout carrying severity, message,
//! timestamp and the `logging.googleapis.com/*` keys that join the line to a
//! trace in Cloud Trace. The trace context is passed in explicitly by the
//! caller via [`StructuredLogger::with_trace`].

use chrono::{DateTime, Utc};
use opentelemetry::trace::{SpanContext, SpanId, TraceContextExt, TraceId};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use tracing_opentelemetry::OpenTelemetrySpanExt;

pub const TRACE_KEY: &str = "logging.googleapis.com/trace";
pub const SPAN_ID_KEY: &str = "logging.googleapis.com/spanId";
pub const TRACE_SAMPLED_KEY: &str = "logging.googleapis.com/trace_sampled";

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("log field is not JSON serializable: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("failed to write log record: {0}")]
    Io(#[from] io::Error),
}

/// Cloud Logging severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Default,
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "DEFAULT",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Notice => "NOTICE",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
            Self::Alert => "ALERT",
            Self::Emergency => "EMERGENCY",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEFAULT" => Ok(Self::Default),
            "DEBUG" | "TRACE" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "NOTICE" => Ok(Self::Notice),
            "WARNING" | "WARN" => Ok(Self::Warning),
            "ERROR" => Ok(Self::Error),
            "CRITICAL" => Ok(Self::Critical),
            "ALERT" => Ok(Self::Alert),
            "EMERGENCY" => Ok(Self::Emergency),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// Trace/span pair a log record is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceCorrelation {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub sampled: bool,
}

impl TraceCorrelation {
    /// The all-zero pair used when no span is active
    pub const NONE: Self = Self {
        trace_id: TraceId::INVALID,
        span_id: SpanId::INVALID,
        sampled: false,
    };

    pub fn from_span_context(span_context: &SpanContext) -> Self {
        Self {
            trace_id: span_context.trace_id(),
            span_id: span_context.span_id(),
            sampled: span_context.is_sampled(),
        }
    }

    /// Capture the OpenTelemetry context of the current `tracing` span.
    ///
    /// Yields [`TraceCorrelation::NONE`] outside any exported span.
    pub fn current() -> Self {
        let context = tracing::Span::current().context();
        Self::from_span_context(context.span().span_context())
    }
}

impl Default for TraceCorrelation {
    fn default() -> Self {
        Self::NONE
    }
}

/// Resource name Cloud Logging uses to link a log entry to a trace
pub fn trace_resource_name(project_id: &str, trace_id: TraceId) -> String {
    format!("projects/{project_id}/traces/{trace_id}")
}

/// A single log record with caller-supplied structured fields
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub severity: Severity,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub fields: Map<String, Value>,
}

impl LogRecord {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            timestamp: Utc::now(),
            fields: Map::new(),
        }
    }

    /// Attach a structured field.
    ///
    /// Fails when the value cannot be represented as JSON.
    pub fn field<T>(mut self, key: impl Into<String>, value: &T) -> Result<Self, LogError>
    where
        T: Serialize + ?Sized,
    {
        self.fields.insert(key.into(), serde_json::to_value(value)?);
        Ok(self)
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Render a record as a single line of Cloud Logging JSON.
///
/// Reserved keys win over caller fields of the same name.
pub fn format_record(
    record: &LogRecord,
    trace: &TraceCorrelation,
    project_id: &str,
) -> Result<String, LogError> {
    let mut entry = Map::new();
    entry.insert("severity".to_string(), Value::from(record.severity.as_str()));
    entry.insert("message".to_string(), Value::from(record.message.as_str()));
    entry.insert("timestamp".to_string(), serde_json::to_value(record.timestamp)?);
    entry.insert(
        TRACE_KEY.to_string(),
        Value::from(trace_resource_name(project_id, trace.trace_id)),
    );
    entry.insert(SPAN_ID_KEY.to_string(), Value::from(trace.span_id.to_string()));
    entry.insert(TRACE_SAMPLED_KEY.to_string(), Value::from(trace.sampled));

    for (key, value) in &record.fields {
        entry.entry(key.clone()).or_insert_with(|| value.clone());
    }

    Ok(serde_json::to_string(&Value::Object(entry))?)
}

struct LoggerInner {
    project_id: String,
    min_severity: Severity,
    sink: Mutex<Box<dyn Write + Send>>,
}

/// Writes Cloud Logging JSON lines to a shared sink (stdout in production)
#[derive(Clone)]
pub struct StructuredLogger {
    inner: Arc<LoggerInner>,
}

impl StructuredLogger {
    pub fn stdout(project_id: impl Into<String>, min_severity: Severity) -> Self {
        Self::with_writer(project_id, min_severity, io::stdout())
    }

    pub fn with_writer<W>(project_id: impl Into<String>, min_severity: Severity, writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        Self {
            inner: Arc::new(LoggerInner {
                project_id: project_id.into(),
                min_severity,
                sink: Mutex::new(Box::new(writer)),
            }),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.inner.project_id
    }

    pub fn enabled(&self, severity: Severity) -> bool {
        severity >= self.inner.min_severity
    }

    /// Bind a trace context for subsequent log calls
    pub fn with_trace(&self, trace: TraceCorrelation) -> ContextLogger<'_> {
        ContextLogger { logger: self, trace }
    }

    /// Write one record as one line.
    ///
    /// The write happens synchronously on the calling thread while holding the
    /// sink lock, so concurrent callers never interleave partial lines.
    pub fn emit(&self, record: &LogRecord, trace: &TraceCorrelation) -> Result<(), LogError> {
        if !self.enabled(record.severity) {
            return Ok(());
        }

        let line = format_record(record, trace, &self.inner.project_id)?;

        let mut sink = self.inner.sink.lock().unwrap_or_else(PoisonError::into_inner);
        sink.write_all(line.as_bytes())?;
        sink.write_all(b"\n")?;
        sink.flush()?;
        Ok(())
    }
}

impl fmt::Debug for StructuredLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructuredLogger")
            .field("project_id", &self.inner.project_id)
            .field("min_severity", &self.inner.min_severity)
            .finish()
    }
}

/// Logger bound to one request's trace context
#[derive(Debug, Clone, Copy)]
pub struct ContextLogger<'a> {
    logger: &'a StructuredLogger,
    trace: TraceCorrelation,
}

impl ContextLogger<'_> {
    pub fn trace(&self) -> &TraceCorrelation {
        &self.trace
    }

    pub fn log(&self, record: &LogRecord) -> Result<(), LogError> {
        self.logger.emit(record, &self.trace)
    }
}

/// In-memory sink shared between a logger and a test
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let buffer = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buffer).into_owned()
    }

    /// Parsed JSON lines written so far
    pub fn lines(&self) -> Vec<Value> {
        self.contents()
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
