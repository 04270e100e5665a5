//! Observability for the cluster layer
//!
//! - Structured logging (JSON lines)
//! - Check outcome counters
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on resolution
//! 3. No async or background threads
//! 4. Deterministic output
//!
//! # Usage
//!
//! ```ignore
//! use pfscluster::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::FocusMismatch, &[("slot", "2")]);
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity, Stream};
pub use metrics::{ClusterMetrics, MetricsSnapshot};

/// Stream that library events are written to.
///
/// Stdout is reserved for command output, so `pfscluster check | jq`
/// sees only the verdict.
pub const EVENT_STREAM: Stream = Stream::Stderr;

/// Log an event at its own severity
pub fn log_event(event: Event) {
    log_event_with_fields(event, &[]);
}

/// Log an event with fields at its own severity, on `EVENT_STREAM`
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log_to(EVENT_STREAM, event.severity(), event.as_str(), fields);
}
