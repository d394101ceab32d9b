// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Outbound correlating client.
//!
//! Wraps a raw [`RpcTransport`](crate::transport::RpcTransport) and correlates
//! every call it sends:
//!
//! 1. Capture the ambient trace context (the enclosing inbound call's, if the call
//!    happens inside a tracked dispatch; a fresh root otherwise).
//! 2. Start a dependency [`CallSpan`]; its id is propagated so the callee parents
//!    itself to this exact call.
//! 3. Inject `Request-Id` and, when baggage exists, `Correlation-Context`.
//! 4. Perform the transport call.
//! 5. Emit exactly one [`DependencyTelemetry`] - on success, on transport error,
//!    and on cancellation alike.
//!
//! Request-response errors are re-raised after telemetry so the caller can react.
//! One-way sends are detached ([`spawn_detached`]); their errors surface only as
//! telemetry exception records.

use bytes::Bytes;
use std::sync::Arc;
use tracing::debug;

use crate::context::{current_context, TraceContext};
use crate::error::TransportError;
use crate::remoting::spawn_detached;
use crate::telemetry::{CallSpan, DependencyTelemetry, SharedSink, SpanKind, TracingSink};
use crate::transport::{Headers, SharedTransport};

/// Label on dependency records for request-response calls.
const CALL_NAME: &str = "rpc.call";

/// Label on dependency records for one-way calls.
const ONE_WAY_NAME: &str = "rpc.one_way";

/// Correlating wrapper around a raw RPC transport client.
pub struct CorrelatingClient {
    inner: SharedTransport,
    target: String,
    sink: SharedSink,
}

impl CorrelatingClient {
    /// Wrap `inner`, reporting dependency telemetry against `target` through the
    /// default tracing-backed sink.
    pub fn new(inner: SharedTransport, target: impl Into<String>) -> Self {
        Self::with_sink(inner, target, Arc::new(TracingSink::new()))
    }

    /// Wrap `inner` with an explicit telemetry sink.
    pub fn with_sink(
        inner: SharedTransport,
        target: impl Into<String>,
        sink: SharedSink,
    ) -> Self {
        Self {
            inner,
            target: target.into(),
            sink,
        }
    }

    /// The callee identity this client reports against.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Send a request-response call through the wrapped transport.
    ///
    /// Propagation headers are injected into `headers` before the send. Transport
    /// errors are recorded as a failed dependency plus an exception record, then
    /// re-raised unchanged.
    pub async fn call(
        &self,
        headers: &mut Headers,
        body: Bytes,
    ) -> Result<Bytes, TransportError> {
        let guard = self.start_call(CALL_NAME, headers, body.len());

        match self.inner.send(headers, body).await {
            Ok(reply) => {
                guard.complete(true, "ok".to_string());
                Ok(reply)
            }
            Err(err) => {
                self.sink.record_exception(&err);
                guard.complete(false, err.result_code());
                Err(err)
            }
        }
    }

    /// Send a one-way call: fire-and-forget past the send step.
    ///
    /// Context capture and header injection happen before this returns; the send
    /// itself and its telemetry run as a detached task. The emitted dependency
    /// record reflects only the send outcome - remote processing is invisible to
    /// the sender, and a failed send is observable only through the telemetry
    /// exception record.
    ///
    /// Must be called from within a tokio runtime.
    pub fn call_one_way(&self, headers: &mut Headers, body: Bytes) {
        let guard = self.start_call(ONE_WAY_NAME, headers, body.len());

        let inner = self.inner.clone();
        let sink = self.sink.clone();
        let mut task_headers = headers.clone();
        spawn_detached(async move {
            match inner.send_one_way(&mut task_headers, body).await {
                Ok(()) => guard.complete(true, "ok".to_string()),
                Err(err) => {
                    sink.record_exception(&err);
                    guard.complete(false, err.result_code());
                }
            }
        });
    }

    /// Shared setup: capture context, start the dependency span, inject headers.
    fn start_call(
        &self,
        name: &'static str,
        headers: &mut Headers,
        body_len: usize,
    ) -> DependencyGuard {
        let context = current_context().unwrap_or_else(TraceContext::root);
        let span = CallSpan::start(SpanKind::Outbound, &context);
        context.to_outbound_headers(span.id(), headers);

        debug!(
            callee = %self.target,
            span_id = %span.id(),
            name,
            "outbound call starting"
        );

        DependencyGuard {
            span: Some(span),
            sink: self.sink.clone(),
            target: self.target.clone(),
            name,
            data: format!("{} byte request", body_len),
        }
    }
}

impl std::fmt::Debug for CorrelatingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrelatingClient")
            .field("target", &self.target)
            .finish()
    }
}

/// Guarantees exactly one dependency record per call, whatever the exit path.
///
/// Dropping the guard without completing it means the call future was cancelled
/// mid-flight; the record is still emitted, marked unsuccessful.
struct DependencyGuard {
    span: Option<CallSpan>,
    sink: SharedSink,
    target: String,
    name: &'static str,
    data: String,
}

impl DependencyGuard {
    fn complete(mut self, success: bool, result_code: String) {
        self.emit(success, result_code);
    }

    fn emit(&mut self, success: bool, result_code: String) {
        let Some(span) = self.span.take() else {
            return;
        };
        let id = span.id().to_string();
        let start_time = span.start_time();
        let duration = span.finish(success);
        self.sink.record_dependency(DependencyTelemetry {
            id,
            target: self.target.clone(),
            name: self.name.to_string(),
            data: std::mem::take(&mut self.data),
            start_time,
            duration,
            result_code,
            success,
        });
    }
}

impl Drop for DependencyGuard {
    fn drop(&mut self) {
        self.emit(false, "cancelled".to_string());
    }
}
