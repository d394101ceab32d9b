// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Trace context and its ambient, continuation-scoped propagation.
//!
//! A [`TraceContext`] is the (trace id, parent id, baggage) tuple that ties a causal
//! chain of calls together. It is immutable for the duration of one call: nested
//! outbound calls inherit the trace id and baggage unchanged and only the parent id
//! advances (to the span id of the enclosing call).
//!
//! # Ambient propagation
//!
//! The context follows the *logical* call, not the worker thread that happens to run
//! a given segment. It lives in a `tokio::task_local!`, entered around the dispatch
//! future by [`CallScope::enter`], so it survives suspension points and resumption
//! on a different worker. It is deliberately not a raw thread-local, which would
//! leak between unrelated calls under a work-stealing scheduler.
//!
//! Code deep inside a dispatch reads the ambient state without holding any
//! reference to the call:
//!
//! ```rust,ignore
//! if let Some(ctx) = tracewire::context::current_context() {
//!     tracing::debug!(trace_id = %ctx.trace_id, "inside a tracked call");
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::codec::{self, CORRELATION_CONTEXT_HEADER, REQUEST_ID_HEADER};
use crate::registry::OperationRegistry;
use crate::transport::Headers;

tokio::task_local! {
    /// Ambient scope of the call currently executing on this logical task.
    static CALL_SCOPE: CallScope;
}

/// Trace context propagated across a causal chain of calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
    /// Root correlation id, stable across the entire chain.
    pub trace_id: String,

    /// Id of the immediately enclosing span; empty for a root call.
    pub parent_id: String,

    /// Key/value pairs propagated unchanged to all descendants, in sender order.
    pub baggage: Vec<(String, String)>,
}

impl TraceContext {
    /// Create a fresh root context with a new trace id and no parent.
    pub fn root() -> Self {
        Self {
            trace_id: Uuid::new_v4().simple().to_string(),
            parent_id: String::new(),
            baggage: Vec::new(),
        }
    }

    /// Attach a baggage pair, returning the modified context.
    pub fn with_baggage(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.baggage.push((key.into(), value.into()));
        self
    }

    /// Read the context out of inbound message headers.
    ///
    /// No `Request-Id` header means this is a root call: a new trace id is
    /// generated and the parent id stays empty. A present header becomes the parent
    /// id, and the trace id is its root segment (the part before the first `.`; a
    /// value without `.` is both). A baggage header that fails to decode is logged
    /// and treated as absent - a corrupt side-channel must not break the call.
    pub fn from_inbound_headers(headers: &Headers) -> Self {
        let (trace_id, parent_id) = match headers.get_str(REQUEST_ID_HEADER) {
            Some(request_id) if !request_id.is_empty() => {
                let root = request_id.split('.').next().unwrap_or(request_id);
                (root.to_string(), request_id.to_string())
            }
            _ => return Self::root().with_inbound_baggage(headers),
        };

        Self {
            trace_id,
            parent_id,
            baggage: Vec::new(),
        }
        .with_inbound_baggage(headers)
    }

    fn with_inbound_baggage(mut self, headers: &Headers) -> Self {
        if let Some(bytes) = headers.get(CORRELATION_CONTEXT_HEADER) {
            match codec::decode_baggage(bytes) {
                Ok(pairs) => self.baggage = pairs,
                Err(err) => {
                    warn!(error = %err, "discarding undecodable correlation-context header");
                }
            }
        }
        self
    }

    /// Write the propagation headers for an outbound call.
    ///
    /// `span_id` is the outbound call's own span id; it becomes the callee's parent.
    /// The baggage header is only written when there is baggage to carry.
    pub fn to_outbound_headers(&self, span_id: &str, headers: &mut Headers) {
        headers.set_str(REQUEST_ID_HEADER, span_id);
        if !self.baggage.is_empty() {
            headers.set(CORRELATION_CONTEXT_HEADER, codec::encode_baggage(&self.baggage));
        }
    }

    /// Mint a span id for a call running under this context.
    ///
    /// Ids are hierarchical: a fresh suffix is appended to the parent id (or to
    /// the trace id for a root call), so `"<trace_id>.<a>.<b>"` is visibly a child
    /// of `"<trace_id>.<a>"` and the receiving side recovers the trace id from the
    /// single `Request-Id` header.
    pub fn new_span_id(&self) -> String {
        let base = if self.parent_id.is_empty() {
            &self.trace_id
        } else {
            &self.parent_id
        };
        let suffix = &Uuid::new_v4().simple().to_string()[..8];
        format!("{}.{}", base, suffix)
    }
}

/// Ambient state bound to one tracked call's logical flow.
///
/// Holds the call's [`TraceContext`], and for inbound calls the operation key plus
/// the registry it was allocated from, so
/// [`set_current_operation_name`](crate::remoting::set_current_operation_name)
/// reaches the right entry without any global coordination.
#[derive(Clone)]
pub struct CallScope {
    context: TraceContext,
    operation: Option<(u64, Arc<OperationRegistry>)>,
}

impl CallScope {
    /// Scope carrying only a trace context (outbound-only flows).
    pub fn new(context: TraceContext) -> Self {
        Self {
            context,
            operation: None,
        }
    }

    /// Scope for an inbound call with its live operation key.
    pub fn with_operation(
        context: TraceContext,
        key: u64,
        registry: Arc<OperationRegistry>,
    ) -> Self {
        Self {
            context,
            operation: Some((key, registry)),
        }
    }

    /// The trace context this scope carries.
    pub fn context(&self) -> &TraceContext {
        &self.context
    }

    /// Run a future with this scope as the ambient call state.
    ///
    /// Everything awaited inside `fut`, across any number of suspension points,
    /// observes this scope via [`current_context`] and [`current_operation`].
    pub async fn enter<F>(self, fut: F) -> F::Output
    where
        F: std::future::Future,
    {
        CALL_SCOPE.scope(self, fut).await
    }
}

impl std::fmt::Debug for CallScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallScope")
            .field("trace_id", &self.context.trace_id)
            .field("operation_key", &self.operation.as_ref().map(|(k, _)| *k))
            .finish()
    }
}

/// The trace context of the call currently executing, if any.
pub fn current_context() -> Option<TraceContext> {
    CALL_SCOPE.try_with(|scope| scope.context.clone()).ok()
}

/// The ambient operation key and its registry, if an inbound call is executing.
pub fn current_operation() -> Option<(u64, Arc<OperationRegistry>)> {
    CALL_SCOPE
        .try_with(|scope| scope.operation.clone())
        .ok()
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_root_context() {
        let ctx = TraceContext::root();
        assert_eq!(ctx.trace_id.len(), 32);
        assert!(ctx.parent_id.is_empty());
        assert!(ctx.baggage.is_empty());
    }

    #[test]
    fn test_root_contexts_are_distinct() {
        assert_ne!(TraceContext::root().trace_id, TraceContext::root().trace_id);
    }

    #[test]
    fn test_from_headers_without_request_id_is_root() {
        let ctx = TraceContext::from_inbound_headers(&Headers::new());
        assert!(!ctx.trace_id.is_empty());
        assert!(ctx.parent_id.is_empty());
    }

    #[test]
    fn test_from_headers_extracts_trace_root() {
        let mut headers = Headers::new();
        headers.set_str(REQUEST_ID_HEADER, "deadbeef.1a2b3c4d");
        let ctx = TraceContext::from_inbound_headers(&headers);
        assert_eq!(ctx.trace_id, "deadbeef");
        assert_eq!(ctx.parent_id, "deadbeef.1a2b3c4d");
    }

    #[test]
    fn test_from_headers_flat_request_id() {
        let mut headers = Headers::new();
        headers.set_str(REQUEST_ID_HEADER, "deadbeef");
        let ctx = TraceContext::from_inbound_headers(&headers);
        assert_eq!(ctx.trace_id, "deadbeef");
        assert_eq!(ctx.parent_id, "deadbeef");
    }

    #[test]
    fn test_from_headers_decodes_baggage() {
        let baggage = vec![("tenant".to_string(), "contoso".to_string())];
        let mut headers = Headers::new();
        headers.set_str(REQUEST_ID_HEADER, "abc.123");
        headers.set(CORRELATION_CONTEXT_HEADER, codec::encode_baggage(&baggage));
        let ctx = TraceContext::from_inbound_headers(&headers);
        assert_eq!(ctx.baggage, baggage);
    }

    #[test]
    fn test_corrupt_baggage_degrades_to_empty() {
        let mut headers = Headers::new();
        headers.set_str(REQUEST_ID_HEADER, "abc.123");
        headers.set(CORRELATION_CONTEXT_HEADER, Bytes::from_static(&[0x00, 0x09, 0xFF]));
        let ctx = TraceContext::from_inbound_headers(&headers);
        assert_eq!(ctx.trace_id, "abc");
        assert!(ctx.baggage.is_empty());
    }

    #[test]
    fn test_outbound_headers_skip_empty_baggage() {
        let ctx = TraceContext::root();
        let mut headers = Headers::new();
        ctx.to_outbound_headers("abc.123", &mut headers);
        assert_eq!(headers.get_str(REQUEST_ID_HEADER), Some("abc.123"));
        assert!(!headers.contains(CORRELATION_CONTEXT_HEADER));
    }

    #[test]
    fn test_outbound_headers_carry_baggage() {
        let ctx = TraceContext::root().with_baggage("flight", "beta");
        let mut headers = Headers::new();
        ctx.to_outbound_headers(&ctx.new_span_id(), &mut headers);
        let bytes = headers.get(CORRELATION_CONTEXT_HEADER).unwrap();
        assert_eq!(
            codec::decode_baggage(bytes).unwrap(),
            vec![("flight".to_string(), "beta".to_string())]
        );
    }

    #[test]
    fn test_span_id_prefix() {
        let ctx = TraceContext::root();
        let span_id = ctx.new_span_id();
        assert!(span_id.starts_with(&format!("{}.", ctx.trace_id)));
        assert_ne!(span_id, ctx.new_span_id());
    }

    #[test]
    fn test_span_ids_nest_under_parent() {
        let mut headers = Headers::new();
        headers.set_str(REQUEST_ID_HEADER, "deadbeef.aaaa");
        let ctx = TraceContext::from_inbound_headers(&headers);
        let span_id = ctx.new_span_id();
        assert!(span_id.starts_with("deadbeef.aaaa."));
    }

    #[tokio::test]
    async fn test_ambient_scope_crosses_await_points() {
        let ctx = TraceContext::root().with_baggage("k", "v");
        let trace_id = ctx.trace_id.clone();

        let observed = CallScope::new(ctx)
            .enter(async move {
                tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                current_context().expect("context should be ambient after an await")
            })
            .await;

        assert_eq!(observed.trace_id, trace_id);
        assert_eq!(observed.baggage, vec![("k".to_string(), "v".to_string())]);
    }

    #[tokio::test]
    async fn test_no_ambient_scope_outside_enter() {
        assert!(current_context().is_none());
        assert!(current_operation().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_scopes_do_not_leak() {
        let a = TraceContext::root();
        let b = TraceContext::root();
        let (id_a, id_b) = (a.trace_id.clone(), b.trace_id.clone());

        let task_a = tokio::spawn(CallScope::new(a).enter(async {
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
            current_context().unwrap().trace_id
        }));
        let task_b = tokio::spawn(CallScope::new(b).enter(async {
            current_context().unwrap().trace_id
        }));

        assert_eq!(task_a.await.unwrap(), id_a);
        assert_eq!(task_b.await.unwrap(), id_b);
    }
}
