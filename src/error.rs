// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for the tracewire correlation layer.
//!
//! This module provides strongly-typed errors for the different parts of the crate,
//! using `thiserror` for ergonomic error definitions and `anyhow` for flexible
//! propagation at the edges.
//!
//! The error taxonomy mirrors how failures are handled:
//!
//! - [`TransportError`] comes out of the wrapped RPC layer and is always recorded as
//!   a failed telemetry record, then re-raised on request-response paths.
//! - [`CodecError`] means a malformed baggage header; it is recovered locally (the
//!   call proceeds with empty baggage) and never fails the primary RPC.
//! - A registry miss (naming or resolving an operation key that no longer exists) is
//!   benign and not modeled as an error at all.

use thiserror::Error;

/// Errors produced while decoding the binary baggage envelope.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Baggage envelope truncated: needed {needed} more bytes")]
    Truncated { needed: usize },

    #[error("Baggage envelope declared {declared} pairs but ended after {read}")]
    CountMismatch { declared: usize, read: usize },

    #[error("Baggage entry is not valid UTF-8: {0}")]
    InvalidUtf8(String),

    #[error("Baggage envelope has {0} trailing bytes")]
    TrailingBytes(usize),
}

/// Errors raised by a wrapped RPC transport or dispatcher.
///
/// The correlation layer never constructs these on its own behalf; it forwards them
/// from the inner transport after recording telemetry. Implementors of
/// [`RpcTransport`](crate::transport::RpcTransport) and
/// [`RpcHandler`](crate::transport::RpcHandler) map their native failures into this
/// type.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Remote endpoint returned an error: {message}")]
    Remote { message: String, code: Option<i32> },

    #[error("Application error during dispatch: {0}")]
    Application(String),

    #[error("Call cancelled: {0}")]
    Cancelled(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(String),
}

impl TransportError {
    /// Create a remote error with a result code.
    pub fn remote(message: impl Into<String>, code: i32) -> Self {
        Self::Remote {
            message: message.into(),
            code: Some(code),
        }
    }

    /// Create a remote error without a result code.
    pub fn remote_message(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
            code: None,
        }
    }

    /// The result code to put on a dependency telemetry record for this error.
    pub fn result_code(&self) -> String {
        match self {
            Self::Remote { code: Some(c), .. } => c.to_string(),
            Self::Timeout(_) => "timeout".to_string(),
            Self::Cancelled(_) => "cancelled".to_string(),
            _ => "error".to_string(),
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut => Self::Timeout(0),
            std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::ConnectionReset => {
                Self::ConnectionFailed(err.to_string())
            }
            _ => Self::Io(err.to_string()),
        }
    }
}

/// Result type alias using anyhow for flexible error handling.
pub type Result<T> = anyhow::Result<T>;
