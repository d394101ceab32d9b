// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Inbound correlating handler.
//!
//! Wraps the application's [`RpcHandler`](crate::transport::RpcHandler) and tracks
//! every dispatched call:
//!
//! 1. Extract the trace context from the inbound headers; an undecodable baggage
//!    header degrades to empty baggage, it never rejects the call.
//! 2. Start an inbound [`CallSpan`] parented to the extracted context.
//! 3. Allocate an operation key and bind it - together with a derived context
//!    whose parent id is the new server span - as the ambient [`CallScope`] for
//!    the whole dispatch, nested async continuations included.
//! 4. Dispatch to the wrapped handler.
//! 5. Resolve the final operation name from the registry, stop the span, and emit
//!    exactly one [`RequestTelemetry`]; dispatch errors additionally produce an
//!    exception record and are re-raised to the transport layer.
//!
//! One-way dispatches run the same tracked sequence as a detached task
//! ([`spawn_detached`]): the transport gets control back immediately and dispatch
//! errors are observable only through the telemetry sink.
//!
//! Application code anywhere inside the dispatch can label the request it is
//! serving via [`set_current_operation_name`], without holding any reference to
//! the call.

use bytes::Bytes;
use std::sync::Arc;
use tracing::debug;

use crate::context::{current_operation, CallScope, TraceContext};
use crate::error::TransportError;
use crate::registry::{OperationRegistry, GLOBAL_REGISTRY};
use crate::remoting::spawn_detached;
use crate::telemetry::{CallSpan, RequestTelemetry, SharedSink, SpanKind, TracingSink};
use crate::transport::{Headers, SharedHandler};

/// Label the request currently being dispatched on this logical task.
///
/// Resolves the ambient operation key and updates its registry entry; the name
/// becomes `RequestTelemetry.name` when the call completes. Calling this outside a
/// tracked dispatch is a no-op, as is calling it after the call completed (naming
/// may race completion; the late update is simply dropped).
pub fn set_current_operation_name(name: impl Into<String>) {
    if let Some((key, registry)) = current_operation() {
        registry.set_name(key, name);
    }
}

/// Correlating wrapper around the application's RPC dispatcher.
pub struct CorrelatingHandler {
    inner: SharedHandler,
    sink: SharedSink,
    registry: Arc<OperationRegistry>,
}

impl CorrelatingHandler {
    /// Wrap `inner` with the default tracing sink and the process-wide registry.
    pub fn new(inner: SharedHandler) -> Self {
        Self::with_parts(inner, Arc::new(TracingSink::new()), GLOBAL_REGISTRY.clone())
    }

    /// Wrap `inner` with an explicit sink and registry.
    pub fn with_parts(
        inner: SharedHandler,
        sink: SharedSink,
        registry: Arc<OperationRegistry>,
    ) -> Self {
        Self {
            inner,
            sink,
            registry,
        }
    }

    /// Dispatch a request-response call through the wrapped handler.
    ///
    /// Application errors are recorded (failed request + exception record), the
    /// operation key is released, and the error is re-raised unchanged.
    pub async fn handle(
        &self,
        headers: &Headers,
        body: Bytes,
    ) -> Result<Bytes, TransportError> {
        let (scope, guard) = self.start_request(headers);
        let inner = self.inner.clone();
        let headers = headers.clone();

        let result = scope.enter(async move { inner.dispatch(&headers, body).await }).await;

        match result {
            Ok(reply) => {
                guard.complete(true);
                Ok(reply)
            }
            Err(err) => {
                self.sink.record_exception(&err);
                guard.complete(false);
                Err(err)
            }
        }
    }

    /// Dispatch a one-way call: the tracked sequence runs detached.
    ///
    /// Returns as soon as the work is scheduled. The span, operation key, and
    /// request record still complete internally; a dispatch error can only surface
    /// through the telemetry exception record, never to the RPC caller.
    ///
    /// Must be called from within a tokio runtime.
    pub fn handle_one_way(&self, headers: &Headers, body: Bytes) {
        let (scope, guard) = self.start_request(headers);
        let inner = self.inner.clone();
        let sink = self.sink.clone();
        let headers = headers.clone();

        spawn_detached(async move {
            let result = scope
                .enter(async move { inner.dispatch_one_way(&headers, body).await })
                .await;

            match result {
                Ok(()) => guard.complete(true),
                Err(err) => {
                    sink.record_exception(&err);
                    guard.complete(false);
                }
            }
        });
    }

    /// Shared setup: extract context, start the server span, allocate the key,
    /// build the ambient scope for the dispatch.
    fn start_request(&self, headers: &Headers) -> (CallScope, RequestGuard) {
        let inbound = TraceContext::from_inbound_headers(headers);
        let span = CallSpan::start(SpanKind::Inbound, &inbound);
        let key = self.registry.allocate();

        debug!(
            trace_id = %inbound.trace_id,
            span_id = %span.id(),
            operation_key = key,
            "inbound call starting"
        );

        // Nested outbound calls must parent to this server span, so the ambient
        // context advances the parent id while trace id and baggage carry over.
        let dispatch_context = TraceContext {
            trace_id: inbound.trace_id.clone(),
            parent_id: span.id().to_string(),
            baggage: inbound.baggage.clone(),
        };
        let scope = CallScope::with_operation(dispatch_context, key, self.registry.clone());

        let guard = RequestGuard {
            span: Some(span),
            sink: self.sink.clone(),
            registry: self.registry.clone(),
            key,
            operation_id: inbound.trace_id,
            parent_id: inbound.parent_id,
        };
        (scope, guard)
    }
}

impl std::fmt::Debug for CorrelatingHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrelatingHandler")
            .field("registry", &self.registry)
            .finish()
    }
}

/// Guarantees exactly one request record and exactly one key release per call.
///
/// Dropping the guard without completing it means the dispatch future was
/// cancelled; the key is still released and the record emitted, unsuccessful.
struct RequestGuard {
    span: Option<CallSpan>,
    sink: SharedSink,
    registry: Arc<OperationRegistry>,
    key: u64,
    operation_id: String,
    parent_id: String,
}

impl RequestGuard {
    fn complete(mut self, success: bool) {
        self.emit(success);
    }

    fn emit(&mut self, success: bool) {
        let Some(span) = self.span.take() else {
            return;
        };
        let name = self.registry.resolve_and_remove(self.key);
        let id = span.id().to_string();
        let start_time = span.start_time();
        let duration = span.finish(success);
        self.sink.record_request(RequestTelemetry {
            id,
            operation_id: std::mem::take(&mut self.operation_id),
            parent_id: std::mem::take(&mut self.parent_id),
            name,
            start_time,
            duration,
            success,
        });
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.emit(false);
    }
}
