// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Finished-call telemetry records.
//!
//! One [`RequestTelemetry`] is produced per inbound call and one
//! [`DependencyTelemetry`] per outbound call, in every case exactly once regardless
//! of outcome. Records are plain serde-serializable data; a
//! [`TelemetrySink`](super::TelemetrySink) decides where they go.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Telemetry for one completed inbound call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestTelemetry {
    /// Span id of the inbound call; descendants use it as their parent id.
    pub id: String,

    /// Trace id of the whole causal chain.
    pub operation_id: String,

    /// Span id of the caller, empty for a root call.
    pub parent_id: String,

    /// Human-readable operation label, resolved from the operation registry when
    /// the call completes.
    pub name: String,

    /// Wall-clock start of the call.
    pub start_time: DateTime<Utc>,

    /// Total call duration.
    pub duration: Duration,

    /// Whether the dispatch completed without error.
    pub success: bool,
}

/// Telemetry for one completed outbound call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyTelemetry {
    /// Span id of the outbound call, propagated to the callee as its parent.
    pub id: String,

    /// Identity of the callee, e.g. `"fabric:/App/Svc"`.
    pub target: String,

    /// Label for the dependency call.
    pub name: String,

    /// Free-form payload description (command, method, body size).
    pub data: String,

    /// Wall-clock start of the call.
    pub start_time: DateTime<Utc>,

    /// Time until the transport resolved (reply received, or send accepted for
    /// one-way calls).
    pub duration: Duration,

    /// Transport result code: `"ok"` on success, or the error's code.
    pub result_code: String,

    /// Whether the transport call succeeded.
    pub success: bool,
}
