// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Collaborator seams for the wrapped RPC layer.
//!
//! The correlation layer is transport-agnostic: it wraps anything that can send a
//! headers-plus-body message and anything that can dispatch one. Both seams come in
//! a request-response and a one-way ("fire-and-forget") flavor.
//!
//! Wrappers take the inner transport as an explicit constructor argument - there is
//! no factory event wiring; composition is plain dependency injection:
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tracewire::remoting::CorrelatingClient;
//!
//! let client = CorrelatingClient::new(Arc::new(my_transport), "fabric:/App/Svc");
//! let reply = client.call(&mut headers, body).await?;
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

use crate::error::TransportError;

/// Message headers carried alongside every RPC body.
///
/// A small ordered collection of name/value entries. Values are binary because the
/// correlation-context header is a binary envelope; string convenience accessors
/// cover the common case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, Bytes)>,
}

impl Headers {
    /// Create an empty header collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a binary header, replacing any existing entry with the same name.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Bytes>) {
        let name = name.into();
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    /// Set a string header.
    pub fn set_str(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.set(name, Bytes::from(value.into().into_bytes()));
    }

    /// Get a header value by name.
    pub fn get(&self, name: &str) -> Option<&Bytes> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Get a header value as a UTF-8 string, if present and valid.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| std::str::from_utf8(v).ok())
    }

    /// Whether a header with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Number of headers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over header entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Bytes)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }
}

/// Client side of the wrapped RPC transport.
///
/// `send` is request-response; `send_one_way` resolves as soon as the message is
/// accepted for sending, with no reply and no visibility into remote processing.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Send a request and await the reply body.
    async fn send(&self, headers: &mut Headers, body: Bytes) -> Result<Bytes, TransportError>;

    /// Send a message without waiting for a reply.
    async fn send_one_way(&self, headers: &mut Headers, body: Bytes)
        -> Result<(), TransportError>;
}

/// Server side of the wrapped RPC layer: the application dispatcher.
#[async_trait]
pub trait RpcHandler: Send + Sync {
    /// Dispatch a request and produce a reply body.
    async fn dispatch(&self, headers: &Headers, body: Bytes) -> Result<Bytes, TransportError>;

    /// Dispatch a message that expects no reply.
    async fn dispatch_one_way(&self, headers: &Headers, body: Bytes)
        -> Result<(), TransportError>;
}

/// Shared transport reference for wrapper composition.
pub type SharedTransport = Arc<dyn RpcTransport>;

/// Shared handler reference for wrapper composition.
pub type SharedHandler = Arc<dyn RpcHandler>;
