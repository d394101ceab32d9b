// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Telemetry sink interface and built-in sinks.
//!
//! The correlation layer hands every finished record to a [`TelemetrySink`] and
//! moves on; the sink API is infallible by contract, so a telemetry pipeline outage
//! can never fail an RPC call. Implementations that talk to a real backend should
//! buffer internally and swallow their own errors.
//!
//! Built-ins:
//!
//! - [`TracingSink`]: emits records as structured `tracing` events (the default).
//! - [`MemorySink`]: captures records in memory, for tests and diagnostics.

use std::error::Error;
use std::sync::{Arc, Mutex};
use tracing::{error, info};

use super::records::{DependencyTelemetry, RequestTelemetry};

/// Receiver of finished request/dependency records.
///
/// All methods are fire-and-forget from the caller's perspective.
pub trait TelemetrySink: Send + Sync {
    /// Record a completed inbound call.
    fn record_request(&self, record: RequestTelemetry);

    /// Record a completed outbound call.
    fn record_dependency(&self, record: DependencyTelemetry);

    /// Record an error raised by a tracked call.
    fn record_exception(&self, error: &(dyn Error + 'static));
}

/// Shared sink reference for wrapper composition.
pub type SharedSink = Arc<dyn TelemetrySink>;

/// Default sink: structured `tracing` events, one per record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TracingSink {
    /// Create a tracing-backed sink.
    pub fn new() -> Self {
        Self
    }
}

impl TelemetrySink for TracingSink {
    fn record_request(&self, record: RequestTelemetry) {
        info!(
            target: "tracewire::request",
            id = %record.id,
            operation_id = %record.operation_id,
            parent_id = %record.parent_id,
            name = %record.name,
            duration_ms = record.duration.as_secs_f64() * 1000.0,
            success = record.success,
            "request completed"
        );
    }

    fn record_dependency(&self, record: DependencyTelemetry) {
        info!(
            target: "tracewire::dependency",
            id = %record.id,
            dep_target = %record.target,
            name = %record.name,
            duration_ms = record.duration.as_secs_f64() * 1000.0,
            result_code = %record.result_code,
            success = record.success,
            "dependency completed"
        );
    }

    fn record_exception(&self, err: &(dyn Error + 'static)) {
        error!(target: "tracewire::exception", error = %err, "tracked call raised");
    }
}

/// In-memory capture sink.
///
/// Stores everything it receives behind mutexes; accessors return clones so
/// assertions never hold a lock across an await.
#[derive(Debug, Default)]
pub struct MemorySink {
    requests: Mutex<Vec<RequestTelemetry>>,
    dependencies: Mutex<Vec<DependencyTelemetry>>,
    exceptions: Mutex<Vec<String>>,
}

impl MemorySink {
    /// Create an empty capture sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured request records, in arrival order.
    pub fn requests(&self) -> Vec<RequestTelemetry> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// All captured dependency records, in arrival order.
    pub fn dependencies(&self) -> Vec<DependencyTelemetry> {
        self.dependencies
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }

    /// Display strings of all captured exceptions, in arrival order.
    pub fn exceptions(&self) -> Vec<String> {
        self.exceptions
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }
}

impl TelemetrySink for MemorySink {
    fn record_request(&self, record: RequestTelemetry) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(record);
        }
    }

    fn record_dependency(&self, record: DependencyTelemetry) {
        if let Ok(mut dependencies) = self.dependencies.lock() {
            dependencies.push(record);
        }
    }

    fn record_exception(&self, err: &(dyn Error + 'static)) {
        if let Ok(mut exceptions) = self.exceptions.lock() {
            exceptions.push(err.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    fn sample_request() -> RequestTelemetry {
        RequestTelemetry {
            id: "t.1".to_string(),
            operation_id: "t".to_string(),
            parent_id: String::new(),
            name: "Unknown".to_string(),
            start_time: Utc::now(),
            duration: Duration::from_millis(1),
            success: true,
        }
    }

    #[test]
    fn test_memory_sink_captures_in_order() {
        let sink = MemorySink::new();
        let mut first = sample_request();
        first.name = "first".to_string();
        let mut second = sample_request();
        second.name = "second".to_string();

        sink.record_request(first);
        sink.record_request(second);

        let names: Vec<_> = sink.requests().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_memory_sink_captures_exceptions() {
        let sink = MemorySink::new();
        let err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        sink.record_exception(&err);
        assert_eq!(sink.exceptions(), vec!["boom".to_string()]);
    }

    #[test]
    fn test_tracing_sink_is_infallible() {
        // No subscriber installed: events go nowhere, and nothing panics.
        let sink = TracingSink::new();
        sink.record_request(sample_request());
        sink.record_exception(&std::io::Error::new(std::io::ErrorKind::Other, "x"));
    }
}
