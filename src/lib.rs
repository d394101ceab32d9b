// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tracewire - transparent trace correlation for RPC remoting.
//!
//! Tracewire sits between application RPC code and a raw request/response
//! transport. It propagates a distributed trace context (trace id, parent id,
//! baggage) across process boundaries and emits one telemetry record per call, so
//! operators can reconstruct end-to-end causal chains - client call, server
//! dispatch, nested client calls - across independently deployed services. The
//! application does nothing beyond optionally naming the operation it is handling.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`codec`] - Binary baggage envelope and the stable wire header names
//! - [`context`] - [`TraceContext`] plus its ambient, continuation-scoped propagation
//! - [`registry`] - Ephemeral per-call operation-name registry with collision-free keys
//! - [`transport`] - Collaborator seams: [`RpcTransport`], [`RpcHandler`], [`Headers`]
//! - [`telemetry`] - Request/dependency records, call spans, and the sink interface
//! - [`remoting`] - The correlating wrappers: [`CorrelatingClient`], [`CorrelatingHandler`]
//! - [`error`] - Error types and result alias
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tracewire::{CorrelatingClient, CorrelatingHandler};
//! use tracewire::remoting::set_current_operation_name;
//!
//! // Server side: wrap the application dispatcher.
//! let handler = CorrelatingHandler::new(Arc::new(my_dispatcher));
//! let reply = handler.handle(&headers, body).await?;
//!
//! // Anywhere inside the dispatch, label the request being served:
//! set_current_operation_name("GetCount");
//!
//! // Client side: wrap the raw transport. A call issued during a tracked
//! // dispatch is automatically parented to the server span.
//! let client = CorrelatingClient::new(Arc::new(my_transport), "fabric:/App/Svc");
//! let response = client.call(&mut headers, body).await?;
//! ```
//!
//! # One-way calls
//!
//! One-way variants ([`CorrelatingClient::call_one_way`],
//! [`CorrelatingHandler::handle_one_way`]) run their tracked sequence as a
//! detached task: telemetry completes internally, but errors are observable only
//! through the telemetry sink. This asymmetry is intentional and inherent to
//! fire-and-forget RPC.

pub mod codec;
pub mod context;
pub mod error;
pub mod registry;
pub mod remoting;
pub mod telemetry;
pub mod transport;

// Re-export commonly used types at crate root
pub use context::{current_context, CallScope, TraceContext};
pub use error::{CodecError, Result, TransportError};
pub use registry::{OperationRegistry, DEFAULT_OPERATION_NAME};
pub use remoting::{set_current_operation_name, CorrelatingClient, CorrelatingHandler};
pub use telemetry::{
    DependencyTelemetry, MemorySink, RequestTelemetry, SharedSink, TelemetrySink, TracingSink,
};
pub use transport::{Headers, RpcHandler, RpcTransport, SharedHandler, SharedTransport};

/// Tracewire version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_public_exports() {
        // Verify key types are accessible from the crate root
        let _ctx = TraceContext::root();
        let _headers = Headers::new();
        let _registry = OperationRegistry::new();
    }
}
