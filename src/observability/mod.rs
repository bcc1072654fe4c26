//! Observability for the ledger front end
//!
//! Structured single-line JSON logs on stderr, one line per event.
//!
//! ```ignore
//! use ledgerdb::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::StoreOpened, &[("db_path", "./ledger.db")]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};

/// Log a lifecycle event with fields at the event's severity
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event_does_not_panic() {
        log_event_with_fields(Event::StoreOpened, &[]);
        log_event_with_fields(Event::CommandFailed, &[("code", "LEDGER_NOT_OPEN")]);
    }
}
