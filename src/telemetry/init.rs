// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Telemetry initialization for processes embedding the correlation layer.
//!
//! The library itself only emits through `tracing`; the hosting process decides
//! how those events are rendered. [`init_telemetry`] installs a sensible
//! `tracing-subscriber` stack for hosts that do not bring their own.

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::error::Result;

/// Configuration for telemetry initialization.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Default log level if RUST_LOG is not set.
    pub default_level: Level,

    /// Whether to include span enter/close events (shows call span lifecycles).
    pub include_span_events: bool,

    /// Whether to use ANSI colors in output.
    pub ansi_colors: bool,

    /// Custom filter directive (overrides default_level and RUST_LOG).
    pub filter_directive: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            default_level: Level::INFO,
            include_span_events: false,
            ansi_colors: true,
            filter_directive: None,
        }
    }
}

impl TelemetryConfig {
    /// Verbose config for development: call span lifecycles included.
    pub fn development() -> Self {
        Self {
            default_level: Level::DEBUG,
            include_span_events: true,
            ansi_colors: true,
            filter_directive: None,
        }
    }

    /// Quiet config for production: warnings and telemetry records only.
    pub fn production() -> Self {
        Self {
            default_level: Level::WARN,
            include_span_events: false,
            ansi_colors: false,
            filter_directive: Some("warn,tracewire::request=info,tracewire::dependency=info".to_string()),
        }
    }

    /// Trace-everything config for tests: span lifecycles shown, no colors.
    pub fn testing() -> Self {
        Self {
            default_level: Level::TRACE,
            include_span_events: true,
            ansi_colors: false,
            filter_directive: Some("tracewire=trace".to_string()),
        }
    }

    /// Set the default log level.
    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    /// Set a custom filter directive.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter_directive = Some(filter.into());
        self
    }
}

/// Guard that flushes telemetry on drop.
///
/// Keep this guard alive for the duration of your program.
pub struct TelemetryGuard {
    _private: (),
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        // Reserved for sink flushing once a buffering sink exists.
    }
}

/// Install the default subscriber stack. Call once at process startup.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard> {
    // RUST_LOG takes precedence unless an explicit directive is configured.
    let filter = match &config.filter_directive {
        Some(directive) => EnvFilter::try_new(directive)
            .unwrap_or_else(|_| EnvFilter::new(config.default_level.to_string())),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.default_level.to_string())),
    };

    let span_events = if config.include_span_events {
        FmtSpan::ENTER | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_ansi(config.ansi_colors)
                .with_span_events(span_events)
                .compact(),
        )
        .try_init()?;

    Ok(TelemetryGuard { _private: () })
}
