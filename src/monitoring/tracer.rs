/*!
 * Structured Tracing
 * Logging setup and per-case spans using the tracing crate
 */

use std::time::Instant;
use tracing::{debug, info, span, warn, Level};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - MEMTRACE_TRACE_JSON: Enable JSON output (default: false)
///
/// Returns false if a global subscriber was already installed.
pub fn init_tracing() -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("MEMTRACE_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .is_ok()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        info!(json = use_json, "Structured tracing initialized");
    }
    installed
}

/// Span covering one benchmark case from session open to stop
pub struct CaseSpan {
    span: tracing::Span,
    start: Instant,
    case: String,
}

impl CaseSpan {
    pub fn new(case: &str, session: &str) -> Self {
        let span = span!(
            Level::INFO,
            "benchmark_case",
            case = case,
            session = session,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        {
            let _entered = span.enter();
            debug!(case = case, session = session, "case tracing started");
        }

        Self {
            span,
            start: Instant::now(),
            case: case.to_string(),
        }
    }

    /// Record the case outcome ("available", "unavailable", ...)
    pub fn record_outcome(&self, outcome: &str) {
        self.span.record("outcome", outcome);
    }

    /// Enter the span context
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for CaseSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let _entered = self.span.enter();
        self.span.record("duration_ms", duration.as_millis() as u64);

        if duration.as_secs() > 60 {
            warn!(case = %self.case, duration_ms = duration.as_millis() as u64, "long-running case");
        } else {
            debug!(case = %self.case, duration_ms = duration.as_millis() as u64, "case tracing finished");
        }
    }
}

impl std::fmt::Debug for CaseSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaseSpan").field("case", &self.case).finish()
    }
}

/// Create a case span
pub fn span_case(case: &str, session: &str) -> CaseSpan {
    CaseSpan::new(case, session)
}
