//! Observability infrastructure for Tabula.
//!
//! Structured logging with consistent spans. This module provides
//! initialization helpers and span constructors used across all components.

use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `tabula_registry=debug`)
///
/// # Example
///
/// ```rust
/// use tabula_core::observability::{init_logging, LogFormat};
///
/// init_logging(LogFormat::Pretty);
/// ```
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Creates a span for submission-side registry operations.
///
/// # Example
///
/// ```rust
/// use tabula_core::observability::registry_span;
///
/// let span = registry_span("create_artifact", "acme-corp");
/// let _guard = span.enter();
/// // ... submit the command
/// ```
#[must_use]
pub fn registry_span(operation: &str, tenant: &str) -> Span {
    tracing::info_span!(
        "registry",
        op = operation,
        tenant = tenant,
    )
}

/// Creates a span for the per-partition apply loop.
#[must_use]
pub fn applier_span(partition: u32, offset: u64) -> Span {
    tracing::info_span!(
        "applier",
        partition = partition,
        offset = offset,
    )
}
