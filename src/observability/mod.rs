//! Observability for bootctl
//!
//! Structured JSON logging of typed lifecycle and transition events.
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on slot state
//! 3. No background threads
//! 4. Deterministic output
//!
//! # Usage
//!
//! ```ignore
//! use bootctl::observability::{log_event, log_event_with_fields, Event};
//!
//! log_event(Event::StoreUninitialized);
//! log_event_with_fields(Event::SlotActivated, &[("slot", "1")]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};

/// Log a lifecycle event at its own severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event() {
        log_event(Event::ServiceOpen);
        log_event(Event::StoreLoaded);
    }

    #[test]
    fn test_log_event_with_fields() {
        log_event_with_fields(Event::SlotActivated, &[("slot", "1"), ("suffix", "_b")]);
    }
}
