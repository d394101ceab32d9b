// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Telemetry records, spans, and sinks.
//!
//! This module holds everything the correlation layer produces:
//!
//! - **Records**: one [`RequestTelemetry`] per inbound call, one
//!   [`DependencyTelemetry`] per outbound call, emitted exactly once per call.
//! - **Spans**: [`CallSpan`], the timed start/stop bracket around one call.
//! - **Sinks**: the [`TelemetrySink`] interface the records are handed to, with a
//!   `tracing`-backed default and an in-memory capture sink for tests.
//! - **Init**: `tracing-subscriber` setup for hosting processes.
//!
//! Sink delivery is best-effort by contract: nothing in this module can fail an
//! RPC call.

mod init;
mod records;
mod sink;
mod span;

pub use init::{init_telemetry, TelemetryConfig, TelemetryGuard};
pub use records::{DependencyTelemetry, RequestTelemetry};
pub use sink::{MemorySink, SharedSink, TelemetrySink, TracingSink};
pub use span::{CallSpan, SpanKind};
