// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Correlating wrappers around the raw RPC transport.
//!
//! - [`CorrelatingClient`] wraps an [`RpcTransport`](crate::transport::RpcTransport):
//!   it captures the ambient trace context, starts a dependency span, injects the
//!   propagation headers, performs the call, and emits one
//!   [`DependencyTelemetry`](crate::telemetry::DependencyTelemetry) per call.
//! - [`CorrelatingHandler`] wraps an [`RpcHandler`](crate::transport::RpcHandler):
//!   it extracts the inbound context, starts a server span, allocates an operation
//!   key, dispatches inside the ambient [`CallScope`](crate::context::CallScope),
//!   and emits one [`RequestTelemetry`](crate::telemetry::RequestTelemetry).
//!
//! A nested outbound call issued during dispatch is parented to the inbound server
//! span purely through ambient context propagation; no ids are passed by hand.

mod client;
mod handler;

pub use client::CorrelatingClient;
pub use handler::{set_current_operation_name, CorrelatingHandler};

use std::future::Future;

/// Spawn a detached unit of tracked work: initiated, never joined.
///
/// This is the one deliberate fire-and-forget construct in the crate, used for
/// one-way calls. The spawned future owns its full telemetry lifecycle, so spans
/// and records complete even though nobody awaits the result - which also means an
/// error inside is observable *only* through the telemetry sink, never by the
/// initiating code.
///
/// Must be called from within a tokio runtime.
pub fn spawn_detached<F>(fut: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    // The JoinHandle is dropped on purpose; detaching is the point.
    tokio::spawn(fut);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_spawn_detached_runs_to_completion() {
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        spawn_detached(async move {
            flag.store(true, Ordering::SeqCst);
        });

        for _ in 0..50 {
            if done.load(Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("detached task never ran");
    }
}
