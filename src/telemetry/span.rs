// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! One-shot timed spans for tracked calls.
//!
//! A [`CallSpan`] is created when a tracked call starts and closed exactly once
//! when it ends, success or failure. Closing consumes the span, so a second stop
//! does not typecheck.

use chrono::{DateTime, Utc};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{info_span, Span};

use crate::context::TraceContext;

/// Which side of the RPC hop the span covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    /// Server span: a call being dispatched by this process.
    Inbound,
    /// Dependency span: a call this process issues to another service.
    Outbound,
}

impl fmt::Display for SpanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inbound => write!(f, "inbound"),
            Self::Outbound => write!(f, "outbound"),
        }
    }
}

/// A timed record of one call's execution.
///
/// The span id is minted under the call's trace (`"<trace_id>.<suffix>"`) and is
/// what descendants of this call see as their parent id.
pub struct CallSpan {
    id: String,
    kind: SpanKind,
    started: Instant,
    start_time: DateTime<Utc>,
    span: Span,
}

impl CallSpan {
    /// Start a span for a call running under `context`.
    pub fn start(kind: SpanKind, context: &TraceContext) -> Self {
        let id = context.new_span_id();
        let span = info_span!(
            "rpc_call",
            kind = %kind,
            trace_id = %context.trace_id,
            span_id = %id,
            duration_ms = tracing::field::Empty,
            success = tracing::field::Empty,
        );

        Self {
            id,
            kind,
            started: Instant::now(),
            start_time: Utc::now(),
            span,
        }
    }

    /// The span's id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The span's kind.
    pub fn kind(&self) -> SpanKind {
        self.kind
    }

    /// Wall-clock start of the span.
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// The underlying tracing span.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Stop the span, recording outcome and returning the measured duration.
    pub fn finish(self, success: bool) -> Duration {
        let duration = self.started.elapsed();
        self.span
            .record("duration_ms", duration.as_secs_f64() * 1000.0);
        self.span.record("success", success);

        tracing::debug!(
            parent: &self.span,
            kind = %self.kind,
            "call span closed"
        );
        duration
    }
}
